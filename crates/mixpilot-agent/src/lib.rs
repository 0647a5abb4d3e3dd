//! mixpilot-agent: workflow orchestration over a host session
//!
//! This crate turns one natural-language request into a sequence of
//! generated scripts executed against the audio host, each step wrapped in
//! a rollback snapshot so the whole thing stays atomic from the user's
//! point of view.

pub mod conversation;
pub mod copilot;
pub mod error;
pub mod events;
pub mod executor;
pub mod host;
pub mod prompt;
pub mod undo;

pub use conversation::{Conversation, PruneConfig};
pub use copilot::{Copilot, CopilotConfig};
pub use error::{Error, Result};
pub use events::{CopilotEvent, WorkflowOutcome};
pub use host::{ControlId, HostSession, RouteId};
pub use undo::UndoRecord;
