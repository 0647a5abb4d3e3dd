//! Workflow orchestrator
//!
//! `Copilot` sequences the request/execute/continue loop: send the
//! conversation, pull the explanation and script out of the response, run
//! the script inside the transaction guard, then decide whether to continue
//! with a synthetic follow-up, retry after a failure, or stop. All of it
//! runs on the caller's thread; the channel is drained with [`Copilot::tick`]
//! on a short cadence and every user-visible effect comes out as a
//! [`CopilotEvent`].

use mixpilot_ai::{ChannelEvent, RequestChannel, RequestConfig};

use crate::conversation::{Conversation, PruneConfig};
use crate::error::{Error, Result};
use crate::events::{CopilotEvent, WorkflowOutcome};
use crate::executor;
use crate::host::HostSession;
use crate::prompt;
use crate::undo::UndoRecord;

/// Orchestrator tunables
#[derive(Debug, Clone)]
pub struct CopilotConfig {
    pub request: RequestConfig,
    pub prune: PruneConfig,
    /// Cap on request/execute cycles per user request
    pub max_steps: u32,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            request: RequestConfig::default(),
            prune: PruneConfig::default(),
            max_steps: 10,
        }
    }
}

#[derive(Debug, Default)]
struct Workflow {
    active: bool,
    step: u32,
    retry_count: u32,
    cancelled: bool,
}

pub struct Copilot<H: HostSession> {
    channel: RequestChannel,
    config: CopilotConfig,
    conversation: Conversation,
    host: Option<H>,
    undo: UndoRecord,
    last_user_message: String,
    workflow: Workflow,
    /// Whether any delta of the current response has been delivered
    streamed: bool,
}

impl<H: HostSession> Copilot<H> {
    /// Orchestrator over the real transport, credentials from the environment
    pub fn new(config: CopilotConfig) -> Self {
        let channel = RequestChannel::new(config.request.clone());
        Self::with_channel(config, channel)
    }

    /// Orchestrator over a caller-supplied channel (test seam)
    pub fn with_channel(config: CopilotConfig, channel: RequestChannel) -> Self {
        Self {
            channel,
            config,
            conversation: Conversation::new(),
            host: None,
            undo: UndoRecord::new(),
            last_user_message: String::new(),
            workflow: Workflow::default(),
            streamed: false,
        }
    }

    pub fn attach_host(&mut self, host: H) {
        self.host = Some(host);
    }

    /// Drop the host, clearing everything that referred to it
    pub fn detach_host(&mut self) -> Option<H> {
        self.conversation.clear();
        self.workflow = Workflow::default();
        self.undo.clear();
        self.streamed = false;
        self.host.take()
    }

    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    pub fn host_mut(&mut self) -> Option<&mut H> {
        self.host.as_mut()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether a rollback snapshot from the last workflow is available
    pub fn undo_available(&self) -> bool {
        self.undo.valid()
    }

    /// No workflow running and no request in flight
    pub fn idle(&self) -> bool {
        !self.workflow.active && !self.channel.busy()
    }

    /// Start a workflow for one user request.
    ///
    /// Fails synchronously when a request is already in flight or no host is
    /// attached. Plain-language undo requests are handled locally and never
    /// reach the model.
    pub fn begin(&mut self, text: &str) -> Result<Vec<CopilotEvent>> {
        if self.channel.busy() {
            return Err(mixpilot_ai::Error::Busy.into());
        }

        if prompt::is_undo_request(text) {
            return Ok(self.undo_last());
        }

        if self.host.is_none() {
            return Err(Error::NoSession);
        }

        if !self.channel.has_api_key() {
            return Ok(vec![CopilotEvent::Note(
                "No API key configured. Set ANTHROPIC_API_KEY or create the key file."
                    .to_string(),
            )]);
        }

        self.last_user_message = text.to_string();
        self.conversation.push_user(text);
        self.workflow = Workflow {
            active: true,
            step: 1,
            retry_count: 0,
            cancelled: false,
        };

        if let Err(e) = self.send_current() {
            self.workflow = Workflow::default();
            return Err(e);
        }

        tracing::info!(request = text, "workflow started");
        Ok(vec![CopilotEvent::Status("Step 1: Thinking...".to_string())])
    }

    /// Drain the channel and advance the workflow. Call on a short cadence
    /// from the owning thread. Events left over from a cancelled workflow
    /// are absorbed silently.
    pub fn tick(&mut self) -> Vec<CopilotEvent> {
        let mut events = Vec::new();
        for event in self.channel.poll() {
            match event {
                ChannelEvent::Delta(text) => {
                    if !self.workflow.active || self.workflow.cancelled {
                        continue;
                    }
                    if !self.streamed {
                        self.streamed = true;
                        events.push(CopilotEvent::Status("Responding...".to_string()));
                    }
                    events.push(CopilotEvent::AssistantDelta(text));
                }
                ChannelEvent::Completed(text) => self.handle_response(text, &mut events),
                ChannelEvent::Failed(e) => self.handle_error(e, &mut events),
            }
        }
        events
    }

    /// Cancel the running workflow. The in-flight request is told to stop;
    /// its eventual terminal event is absorbed by a later `tick`.
    pub fn cancel(&mut self) -> Vec<CopilotEvent> {
        let mut events = Vec::new();
        if !self.workflow.active {
            return events;
        }
        self.workflow.cancelled = true;
        self.channel.cancel();
        self.finish(
            WorkflowOutcome::Cancelled,
            "Cancelled by user.",
            &mut events,
        );
        events
    }

    /// Roll back the last workflow's changes
    pub fn undo_last(&mut self) -> Vec<CopilotEvent> {
        let mut events = Vec::new();

        if !self.undo.valid() {
            events.push(CopilotEvent::Note("Nothing to undo.".to_string()));
            return events;
        }
        let Some(host) = self.host.as_mut() else {
            events.push(CopilotEvent::Note("No session loaded.".to_string()));
            return events;
        };

        let description = self.undo.description.clone();
        if self.undo.restore(host) {
            events.push(CopilotEvent::Note(if description.is_empty() {
                "Undone.".to_string()
            } else {
                format!("Undone: {description}")
            }));
        } else {
            events.push(CopilotEvent::Note("Undo failed.".to_string()));
        }
        events.push(CopilotEvent::UndoAvailable(self.undo.valid()));
        events
    }

    /// Re-align the rollback snapshot after the host's undo history changed
    /// behind our back (the user pressed undo in the host itself)
    pub fn reconcile_undo(&mut self) {
        if let Some(host) = &self.host {
            self.undo.reconcile(host);
        }
    }

    fn send_current(&mut self) -> Result<()> {
        let (snapshot, catalog) = match &self.host {
            Some(host) => (host.snapshot_text(), host.action_catalog()),
            None => (String::new(), String::new()),
        };
        self.conversation
            .prune(&self.config.prune, &[prompt::SYSTEM_PROMPT, &snapshot, &catalog]);
        let messages = self.conversation.api_messages(&snapshot, &catalog);
        self.streamed = false;
        self.channel.send(prompt::SYSTEM_PROMPT, messages)?;
        Ok(())
    }

    fn resend(&mut self, events: &mut Vec<CopilotEvent>) {
        if let Err(e) = self.send_current() {
            events.push(CopilotEvent::Note(format!("Error: {e}")));
            self.finish(
                WorkflowOutcome::Aborted,
                "Workflow aborted due to error.",
                events,
            );
        }
    }

    fn handle_response(&mut self, response: String, events: &mut Vec<CopilotEvent>) {
        if !self.workflow.active || self.workflow.cancelled {
            return;
        }

        let was_streamed = self.streamed;
        self.conversation.push_assistant(&response);

        let mut explanation = executor::extract_explanation(&response);
        let script = executor::extract_script(&response);
        let done = executor::has_end_marker(&response);
        if done && !explanation.is_empty() {
            explanation = executor::strip_end_marker(&explanation);
        }

        if !was_streamed && !explanation.is_empty() {
            events.push(CopilotEvent::Assistant(explanation.clone()));
        }

        if script.is_empty() {
            // Text-only response means the model considers the work done.
            if explanation.is_empty() {
                events.push(CopilotEvent::Assistant(response));
            }
            self.finish(WorkflowOutcome::Informational, "Done.", events);
            return;
        }

        let step = self.workflow.step;
        events.push(CopilotEvent::Status(format!("Step {step}: Executing...")));
        events.push(CopilotEvent::Note(format!("Step {step}: executing script:")));
        events.push(CopilotEvent::Note(script.clone()));

        self.undo.description = self.last_user_message.clone();
        let mut output_lines: Vec<String> = Vec::new();
        let result = match self.host.as_mut() {
            Some(host) => executor::execute_with_undo(
                host,
                &script,
                &mut |line| output_lines.push(line.to_string()),
                &mut self.undo,
            ),
            None => Err(Error::NoSession),
        };
        for line in &output_lines {
            events.push(CopilotEvent::ScriptOutput(line.clone()));
        }

        match result {
            Ok(()) => {
                events.push(CopilotEvent::UndoAvailable(true));
                if done {
                    self.finish(
                        WorkflowOutcome::Completed,
                        "All steps completed. (type 'undo' to revert)",
                        events,
                    );
                } else if self.workflow.step >= self.config.max_steps {
                    events.push(CopilotEvent::Note(format!(
                        "Step limit ({}) reached. Stopping workflow.",
                        self.config.max_steps
                    )));
                    self.finish(
                        WorkflowOutcome::StepLimit,
                        "Step limit reached. Partial work retained. (type 'undo' to revert)",
                        events,
                    );
                } else {
                    self.workflow.step += 1;
                    self.workflow.retry_count = 0;
                    self.conversation
                        .push_user(prompt::continue_message(&output_lines.join("\n")));
                    events.push(CopilotEvent::Status(format!(
                        "Step {}: Thinking...",
                        self.workflow.step
                    )));
                    self.resend(events);
                }
            }
            Err(e) => {
                events.push(CopilotEvent::Note(format!("Execution error: {e}")));
                if self.workflow.retry_count < 1 {
                    self.workflow.retry_count += 1;
                    self.conversation.push_user(prompt::retry_message(&e.to_string()));
                    events.push(CopilotEvent::Status("Retrying...".to_string()));
                    self.resend(events);
                } else {
                    self.undo.clear();
                    events.push(CopilotEvent::UndoAvailable(false));
                    self.finish(
                        WorkflowOutcome::Aborted,
                        "Workflow aborted due to execution error.",
                        events,
                    );
                }
            }
        }
    }

    fn handle_error(&mut self, error: mixpilot_ai::Error, events: &mut Vec<CopilotEvent>) {
        if !self.workflow.active || self.workflow.cancelled {
            return;
        }

        events.push(CopilotEvent::Note(format!("Error: {error}")));
        match &error {
            mixpilot_ai::Error::Status { status: 401, .. } => {
                events.push(CopilotEvent::Note(
                    "Your API key may be invalid. Please check your configuration.".to_string(),
                ));
            }
            mixpilot_ai::Error::Status { status: 429, .. } => {
                events.push(CopilotEvent::Note(
                    "Rate limited. Please wait a moment and try again.".to_string(),
                ));
            }
            mixpilot_ai::Error::Cancelled => {
                events.push(CopilotEvent::Note("Request was cancelled.".to_string()));
            }
            _ => {}
        }

        let outcome = if error.is_cancelled() {
            WorkflowOutcome::Cancelled
        } else {
            WorkflowOutcome::Aborted
        };
        self.finish(outcome, "Workflow aborted due to error.", events);
    }

    fn finish(&mut self, outcome: WorkflowOutcome, reason: &str, events: &mut Vec<CopilotEvent>) {
        if !self.workflow.active {
            return;
        }
        tracing::info!(?outcome, reason, step = self.workflow.step, "workflow finished");
        self.workflow = Workflow::default();
        events.push(CopilotEvent::Status("Idle".to_string()));
        events.push(CopilotEvent::Finished {
            outcome,
            reason: reason.to_string(),
        });
    }
}
