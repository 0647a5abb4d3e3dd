//! mixpilot-ai: Anthropic Messages API client
//!
//! This crate owns the network half of mixpilot: a single-in-flight request
//! channel that runs each request on a dedicated worker thread, decodes the
//! streamed response incrementally, and hands results back to the caller's
//! thread through a non-blocking poll.

pub mod backend;
pub mod channel;
pub mod credentials;
pub mod error;
pub mod sse;
pub mod types;

pub use backend::{Backend, HttpBackend, RequestJob};
pub use channel::{ChannelEvent, RequestChannel, StreamSink};
pub use error::{Error, Result};
pub use types::{ApiRequest, ApiResponse, ChatMessage, RequestConfig, Role};
