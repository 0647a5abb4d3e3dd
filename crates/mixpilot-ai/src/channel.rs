//! Poll-based request channel
//!
//! One request at a time. The network call runs on a dedicated worker thread;
//! the caller drains results with [`RequestChannel::poll`] from its own
//! thread on a short cadence (tens of milliseconds). All deltas for a request
//! are delivered, in append order, strictly before its single terminal event.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::backend::{Backend, HttpBackend, RequestJob};
use crate::credentials;
use crate::error::{Error, Result};
use crate::types::{ApiRequest, ChatMessage, RequestConfig};

/// Caller-visible results drained by `poll`
#[derive(Debug)]
pub enum ChannelEvent {
    /// Incremental text, streaming mode only
    Delta(String),
    /// Full response text; terminal
    Completed(String),
    /// Terminal failure (including cancellation)
    Failed(Error),
}

#[derive(Default)]
struct StreamState {
    /// Decoded text not yet drained by the caller
    pending: String,
    /// Full decoded text so far
    accumulated: String,
    /// Raw body bytes, kept for error-message extraction
    raw: Vec<u8>,
    /// Set exactly once per request, by the worker, after its last delta
    outcome: Option<Result<String>>,
}

/// The one piece of state touched by both threads. Buffer access goes
/// through the mutex; the cancel flag is a lone atomic.
#[derive(Default)]
pub(crate) struct StreamShared {
    state: Mutex<StreamState>,
    cancel: AtomicBool,
}

impl StreamShared {
    fn reset(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.accumulated.clear();
        state.raw.clear();
        state.outcome = None;
        self.cancel.store(false, Ordering::Release);
    }

    fn drain(&self) -> (String, Option<Result<String>>) {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.pending);
        let outcome = state.outcome.take();
        (pending, outcome)
    }
}

/// Worker-side handle onto the shared stream buffers
#[derive(Clone)]
pub struct StreamSink {
    shared: Arc<StreamShared>,
}

impl StreamSink {
    pub(crate) fn new(shared: Arc<StreamShared>) -> Self {
        Self { shared }
    }

    /// Append one incremental text fragment
    pub fn push_text(&self, text: &str) {
        let mut state = self.shared.state.lock();
        state.pending.push_str(text);
        state.accumulated.push_str(text);
    }

    /// Append raw body bytes
    pub fn push_raw(&self, bytes: &[u8]) {
        self.shared.state.lock().raw.extend_from_slice(bytes);
    }

    /// Full decoded text so far
    pub fn accumulated(&self) -> String {
        self.shared.state.lock().accumulated.clone()
    }

    /// Whether the caller has requested cancellation
    pub fn cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::Acquire)
    }
}

/// Single-in-flight request façade
pub struct RequestChannel {
    backend: Arc<dyn Backend>,
    config: RequestConfig,
    api_key: Option<String>,
    shared: Arc<StreamShared>,
    worker: Option<JoinHandle<()>>,
    in_flight: bool,
}

impl RequestChannel {
    /// Channel over the real HTTP transport, resolving credentials from the
    /// environment or the per-user key file
    pub fn new(config: RequestConfig) -> Self {
        let api_key = credentials::resolve_api_key();
        Self::with_backend(config, api_key, Arc::new(HttpBackend))
    }

    /// Channel over an arbitrary transport (test seam)
    pub fn with_backend(
        config: RequestConfig,
        api_key: Option<String>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            backend,
            config,
            api_key,
            shared: Arc::new(StreamShared::default()),
            worker: None,
            in_flight: false,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Whether a request has been sent and not yet terminally delivered
    pub fn busy(&self) -> bool {
        self.in_flight
    }

    /// Start one request. Fails synchronously, without starting any work,
    /// when a request is already in flight or no key is configured.
    pub fn send(&mut self, system_prompt: &str, messages: Vec<ChatMessage>) -> Result<()> {
        if self.in_flight {
            return Err(Error::Busy);
        }
        let api_key = self.api_key.clone().ok_or(Error::NotConfigured)?;

        // A finished worker may not have been joined yet; never run two.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        self.shared.reset();

        let job = RequestJob {
            api_key,
            config: self.config.clone(),
            request: ApiRequest {
                model: self.config.model.clone(),
                max_tokens: self.config.max_tokens,
                system: system_prompt.to_string(),
                messages,
                stream: self.config.stream,
            },
        };

        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("mixpilot-request".into())
            .spawn(move || {
                let sink = StreamSink::new(Arc::clone(&shared));
                let result = backend.perform(job, &sink);
                if let Err(ref e) = result {
                    tracing::debug!(error = %e, "request finished with error");
                }
                shared.state.lock().outcome = Some(result);
            })
            .map_err(|e| Error::Network(format!("failed to spawn worker thread: {e}")))?;

        self.worker = Some(handle);
        self.in_flight = true;
        Ok(())
    }

    /// Request cancellation of the in-flight request. Idempotent and
    /// non-blocking; the worker still finishes through the normal path and
    /// `poll` will deliver a `Failed(Cancelled)` terminal event.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    /// Drain pending results. Call from the owning thread on a short
    /// cadence. Deltas come out in append order; the terminal event for a
    /// request comes last and exactly once, after which the channel is free.
    pub fn poll(&mut self) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        if !self.in_flight {
            return events;
        }

        // One lock: the worker writes its outcome after its final delta, so
        // draining both together preserves the deltas-before-terminal order.
        let (pending, outcome) = self.shared.drain();
        if !pending.is_empty() {
            events.push(ChannelEvent::Delta(pending));
        }

        if let Some(outcome) = outcome {
            if let Some(handle) = self.worker.take() {
                let _ = handle.join();
            }
            self.in_flight = false;
            events.push(match outcome {
                Ok(text) => ChannelEvent::Completed(text),
                Err(e) => ChannelEvent::Failed(e),
            });
        }

        events
    }
}

impl Drop for RequestChannel {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
