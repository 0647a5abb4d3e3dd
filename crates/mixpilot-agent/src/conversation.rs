//! Conversation history and pruning
//!
//! The history stores raw message text only; session context is injected
//! into the outgoing copy at send time so stale snapshots never accumulate
//! in the transcript. Pruning keeps the estimated input size under budget
//! by dropping the oldest messages first.

use mixpilot_ai::{ChatMessage, Role};

/// Crude but serviceable size estimate
const CHARS_PER_TOKEN: usize = 4;

/// Budget knobs for [`Conversation::prune`]
#[derive(Debug, Clone)]
pub struct PruneConfig {
    /// Prune only once the estimate exceeds this
    pub max_input_tokens: usize,
    /// Prune down to this
    pub prune_target_tokens: usize,
    /// Never drop below this many user/assistant pairs
    pub min_keep_pairs: usize,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: 100_000,
            prune_target_tokens: 80_000,
            min_keep_pairs: 2,
        }
    }
}

pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Estimated input tokens for the next request: history plus everything
    /// injected at send time (system prompt, snapshot, catalog).
    fn estimate_total(&self, context: &[&str]) -> usize {
        let mut total: usize = context.iter().map(|c| estimate_tokens(c)).sum();
        for msg in &self.messages {
            total += estimate_tokens(msg.role.as_str()) + estimate_tokens(&msg.content);
        }
        total
    }

    /// Drop oldest messages until the estimate is back under target. Keeps
    /// at least `min_keep_pairs` pairs, and re-trims so the oldest remaining
    /// message is a user one (the API rejects assistant-first transcripts).
    pub fn prune(&mut self, config: &PruneConfig, context: &[&str]) {
        if self.estimate_total(context) <= config.max_input_tokens {
            return;
        }

        let min_keep = config.min_keep_pairs * 2;
        while self.messages.len() > min_keep
            && self.estimate_total(context) > config.prune_target_tokens
        {
            self.messages.remove(0);
        }

        while self
            .messages
            .first()
            .is_some_and(|m| m.role != Role::User)
        {
            self.messages.remove(0);
        }

        tracing::debug!(kept = self.messages.len(), "pruned conversation");
    }

    /// Outgoing copy of the history, with the session snapshot and action
    /// catalog folded into the last user message
    pub fn api_messages(&self, snapshot: &str, catalog: &str) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.messages.len());
        for (i, msg) in self.messages.iter().enumerate() {
            if msg.role == Role::User && i == self.messages.len() - 1 {
                let enriched = format!(
                    "Current session state:\n{snapshot}\n\n{catalog}\nUser request: {content}",
                    content = msg.content
                );
                out.push(ChatMessage::user(enriched));
            } else {
                out.push(msg.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(pairs: usize, content_len: usize) -> Conversation {
        let mut conv = Conversation::new();
        for i in 0..pairs {
            conv.push_user(format!("u{i}{}", "x".repeat(content_len)));
            conv.push_assistant(format!("a{i}{}", "y".repeat(content_len)));
        }
        conv
    }

    #[test]
    fn test_prune_noop_under_budget() {
        let mut conv = filled(3, 10);
        conv.prune(&PruneConfig::default(), &["system"]);
        assert_eq!(conv.len(), 6);
    }

    #[test]
    fn test_prune_drops_oldest_first() {
        let mut conv = filled(10, 400);
        let config = PruneConfig {
            max_input_tokens: 500,
            prune_target_tokens: 400,
            min_keep_pairs: 1,
        };
        conv.prune(&config, &[]);
        assert!(conv.len() < 20);
        // survivors are the newest messages
        let last = conv.messages().last().unwrap();
        assert!(last.content.starts_with("a9"));
    }

    #[test]
    fn test_prune_keeps_minimum_pairs() {
        let mut conv = filled(4, 100_000);
        let config = PruneConfig {
            max_input_tokens: 10,
            prune_target_tokens: 5,
            min_keep_pairs: 2,
        };
        conv.prune(&config, &[]);
        assert_eq!(conv.len(), 4);
    }

    #[test]
    fn test_prune_leaves_user_message_first() {
        let mut conv = Conversation::new();
        conv.push_user("a".repeat(4000));
        conv.push_assistant("b".repeat(4000));
        conv.push_user("c");
        conv.push_assistant("d");
        conv.push_user("e");
        let config = PruneConfig {
            max_input_tokens: 100,
            prune_target_tokens: 900,
            min_keep_pairs: 1,
        };
        conv.prune(&config, &[]);
        assert_eq!(conv.messages()[0].role, Role::User);
    }

    #[test]
    fn test_prune_counts_injected_context() {
        let mut conv = filled(4, 100);
        let big_context = "z".repeat(40_000);
        let config = PruneConfig {
            max_input_tokens: 10_000,
            prune_target_tokens: 10_050,
            min_keep_pairs: 1,
        };
        conv.prune(&config, &[&big_context]);
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_api_messages_enrich_last_user_only() {
        let mut conv = Conversation::new();
        conv.push_user("first");
        conv.push_assistant("reply");
        conv.push_user("second");

        let out = conv.api_messages("SNAP", "CATALOG");
        assert_eq!(out[0].content, "first");
        assert_eq!(out[1].content, "reply");
        assert!(out[2].content.contains("SNAP"));
        assert!(out[2].content.contains("CATALOG"));
        assert!(out[2].content.ends_with("User request: second"));
    }

    #[test]
    fn test_api_messages_no_enrichment_when_last_is_assistant() {
        let mut conv = Conversation::new();
        conv.push_user("ask");
        conv.push_assistant("answer");
        let out = conv.api_messages("SNAP", "CAT");
        assert_eq!(out[1].content, "answer");
        assert_eq!(out[0].content, "ask");
    }
}
