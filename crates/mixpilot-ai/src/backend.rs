//! HTTP transport for the Messages API
//!
//! One `perform` call is one POST. The worker thread drives this with a
//! thread-local current-thread runtime; nothing here ever runs on the
//! caller's thread.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::channel::StreamSink;
use crate::error::{Error, Result};
use crate::sse::{self, SseDecoder, SseFrame};
use crate::types::{ApiRequest, ApiResponse, RequestConfig, extract_error_message};

/// Connection establishment cap, both modes
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Whole-request wall-clock cap, buffered mode only
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Max gap between stream chunks; streaming has no total cap, but a stalled
/// transfer must still be caught
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the worker needs for one request. Built by the channel and
/// moved onto the worker thread; nothing in it aliases caller state.
pub struct RequestJob {
    pub api_key: String,
    pub config: RequestConfig,
    pub request: ApiRequest,
}

/// Transport seam. The channel talks to the network through this so tests
/// can substitute a scripted implementation.
pub trait Backend: Send + Sync + 'static {
    /// Perform exactly one request, feeding incremental text into `sink`
    /// and honoring its cancellation flag. Returns the full response text.
    fn perform(&self, job: RequestJob, sink: &StreamSink) -> Result<String>;
}

/// Real transport over reqwest
#[derive(Debug, Default)]
pub struct HttpBackend;

impl Backend for HttpBackend {
    fn perform(&self, job: RequestJob, sink: &StreamSink) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Network(format!("failed to start I/O runtime: {e}")))?;
        runtime.block_on(request(job, sink))
    }
}

fn build_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut key = HeaderValue::from_str(api_key)
        .map_err(|_| Error::Network("API key contains invalid header characters".into()))?;
    key.set_sensitive(true);
    headers.insert("x-api-key", key);
    headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    Ok(headers)
}

async fn request(job: RequestJob, sink: &StreamSink) -> Result<String> {
    if sink.cancelled() {
        return Err(Error::Cancelled);
    }

    let streaming = job.config.stream;
    let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);
    if !streaming {
        builder = builder.timeout(REQUEST_TIMEOUT);
    }
    let client = builder.build()?;

    tracing::debug!(endpoint = %job.config.endpoint, streaming, "sending request");

    let response = client
        .post(&job.config.endpoint)
        .headers(build_headers(&job.api_key)?)
        .json(&job.request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        sink.push_raw(&body);
        return Err(Error::Status {
            status: status.as_u16(),
            message: extract_error_message(&body),
        });
    }

    if streaming {
        stream_body(response, sink).await
    } else {
        buffered_body(response, sink).await
    }
}

async fn buffered_body(response: reqwest::Response, sink: &StreamSink) -> Result<String> {
    let body = response.bytes().await?;
    sink.push_raw(&body);

    if sink.cancelled() {
        return Err(Error::Cancelled);
    }

    parse_buffered(&body)
}

/// Parse a complete (non-streamed) response body into its text. Garbled or
/// empty payloads are parse failures, not transport errors.
fn parse_buffered(body: &[u8]) -> Result<String> {
    let parsed: ApiResponse =
        serde_json::from_slice(body).map_err(|e| Error::Parse(e.to_string()))?;
    let text = parsed.text();
    if text.is_empty() {
        return Err(Error::Parse("response contained no text".into()));
    }
    Ok(text)
}

async fn stream_body(response: reqwest::Response, sink: &StreamSink) -> Result<String> {
    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();

    'outer: loop {
        if sink.cancelled() {
            return Err(Error::Cancelled);
        }

        let next = tokio::time::timeout(IDLE_TIMEOUT, stream.next()).await;
        let chunk = match next {
            Err(_) => return Err(Error::Network("event stream stalled".into())),
            Ok(None) => break,
            Ok(Some(Err(e))) => return Err(Error::Network(e.to_string())),
            Ok(Some(Ok(chunk))) => chunk,
        };

        sink.push_raw(&chunk);
        for frame in decoder.push(&chunk) {
            match frame {
                SseFrame::Data(payload) => {
                    if let Some(delta) = sse::text_delta(&payload) {
                        sink.push_text(&delta);
                    }
                }
                SseFrame::Done => break 'outer,
            }
        }
    }

    let text = sink.accumulated();
    if text.is_empty() {
        return Err(Error::Parse("event stream contained no text".into()));
    }
    Ok(text)
}
