//! Wire types for the Anthropic Messages API

use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn in a conversation, in the shape the API expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-request configuration for the channel
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// API endpoint
    pub endpoint: String,
    /// Model identifier sent in the request body
    pub model: String,
    /// Response token cap
    pub max_tokens: u32,
    /// Request server-sent-event streaming instead of a buffered body
    pub stream: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 2048,
            stream: true,
        }
    }
}

/// Request body: `{model, max_tokens, system, messages, stream?}`
#[derive(Debug, Serialize)]
pub struct ApiRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

/// Buffered response body: `{ "content": [ { "type": "text", "text": "..." } ] }`
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseBlock {
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub text: String,
}

impl ApiResponse {
    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Error response body: `{ "error": { "message": "..." } }`
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
}

/// Best-effort extraction of a server error message from a raw body
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_slice(body).ok()?;
    if parsed.error.message.is_empty() {
        None
    } else {
        Some(parsed.error.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_stream_flag_only_when_set() {
        let req = ApiRequest {
            model: "m".into(),
            max_tokens: 16,
            system: "s".into(),
            messages: vec![ChatMessage::user("hi")],
            stream: false,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("\"stream\""));

        let req = ApiRequest { stream: true, ..req };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"stream\":true"));
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let msg = ChatMessage::assistant("ok");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let body = r#"{"content":[{"type":"text","text":"Hello "},{"type":"text","text":"there"}]}"#;
        let resp: ApiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.text(), "Hello there");
    }

    #[test]
    fn test_response_text_skips_non_text_blocks() {
        let body = r#"{"content":[{"type":"tool_use"},{"type":"text","text":"x"}]}"#;
        let resp: ApiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.text(), "x");
    }

    #[test]
    fn test_extract_error_message() {
        let body = br#"{"type":"error","error":{"type":"invalid_request_error","message":"bad key"}}"#;
        assert_eq!(extract_error_message(body).as_deref(), Some("bad key"));
        assert_eq!(extract_error_message(b"not json"), None);
        assert_eq!(extract_error_message(br#"{"error":{"message":""}}"#), None);
    }
}
