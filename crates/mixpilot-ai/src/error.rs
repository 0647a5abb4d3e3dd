//! Error types for mixpilot-ai

use thiserror::Error;

/// Result type alias using mixpilot-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the request channel and transport
#[derive(Error, Debug)]
pub enum Error {
    /// A request is already in flight on this channel
    #[error("a request is already in progress")]
    Busy,

    /// No API key could be resolved from the environment or config file
    #[error("no API key configured")]
    NotConfigured,

    /// Transport-level failure (DNS, TLS, connect, timeout, mid-stream I/O)
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status, with the server error message when extractable
    #[error("API error (HTTP {status}){}", status_suffix(.message))]
    Status { status: u16, message: Option<String> },

    /// Response body was empty or not in the expected shape
    #[error("failed to parse API response: {0}")]
    Parse(String),

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    /// True for user cancellation, so callers can suppress alarm-level messaging
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True for the synchronous "already in progress" rejection
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy)
    }
}

fn status_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {m}"),
        None => String::new(),
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}
