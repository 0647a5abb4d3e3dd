//! Error types for mixpilot-agent

use thiserror::Error;

/// Result type alias using mixpilot-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while orchestrating a workflow
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the API layer
    #[error(transparent)]
    Ai(#[from] mixpilot_ai::Error),

    /// A script ran and failed inside the host
    #[error("script execution failed: {0}")]
    Script(String),

    /// Asked to execute with nothing to run
    #[error("no script to execute")]
    EmptyScript,

    /// An operation that needs a host session was called without one
    #[error("no session loaded")]
    NoSession,
}

impl Error {
    /// Whether this failure is a user-requested cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Ai(e) if e.is_cancelled())
    }

    /// Whether this failure is a busy-channel rejection
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Ai(e) if e.is_busy())
    }
}
