//! Incremental server-sent-event decoding
//!
//! The Messages API streams newline-delimited events; payload lines look like
//! `data: <json>` and the stream ends with a literal `data: [DONE]`. Network
//! chunk boundaries carry no meaning, so the decoder buffers bytes and only
//! acts on complete lines.

use serde::Deserialize;

const DATA_PREFIX: &[u8] = b"data: ";
const DONE_PAYLOAD: &str = "[DONE]";

/// A decoded frame from the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Payload of one `data:` line
    Data(String),
    /// The end-of-stream sentinel
    Done,
}

/// Push-based line decoder. Feed it byte chunks as they arrive; partial lines
/// (including partial UTF-8 sequences) are retained until the terminating
/// newline shows up.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line_buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode whatever complete lines this chunk closes out
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        self.line_buf.extend_from_slice(chunk);

        while let Some(nl) = self.line_buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.line_buf.drain(..=nl).collect();
            line.pop(); // trailing '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if let Some(frame) = classify_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Bytes of an unterminated trailing line, if any
    pub fn pending(&self) -> &[u8] {
        &self.line_buf
    }
}

fn classify_line(line: &[u8]) -> Option<SseFrame> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = String::from_utf8_lossy(payload).into_owned();
    if payload == DONE_PAYLOAD {
        Some(SseFrame::Done)
    } else {
        Some(SseFrame::Data(payload))
    }
}

#[derive(Debug, Deserialize)]
struct DeltaEvent {
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(rename = "type", default)]
    delta_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Pull the incremental text out of one `data:` payload, if it carries any.
/// Only `content_block_delta` events with a `text_delta` are relevant;
/// everything else (message_start, ping, content_block_stop, ...) is skipped.
pub fn text_delta(payload: &str) -> Option<String> {
    let event: DeltaEvent = serde_json::from_str(payload).ok()?;
    if event.event_type != "content_block_delta" {
        return None;
    }
    let delta = event.delta?;
    if delta.delta_type != "text_delta" {
        return None;
    }
    delta.text
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{}}\n",
        "\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" w\\u00f6rld\"}}\n",
        "data: {\"type\":\"content_block_stop\",\"index\":0}\n",
        "data: [DONE]\n",
    );

    fn decode_all(chunks: &[&[u8]]) -> (String, bool) {
        let mut decoder = SseDecoder::new();
        let mut text = String::new();
        let mut done = false;
        for chunk in chunks {
            for frame in decoder.push(chunk) {
                match frame {
                    SseFrame::Data(payload) => {
                        if let Some(t) = text_delta(&payload) {
                            text.push_str(&t);
                        }
                    }
                    SseFrame::Done => done = true,
                }
            }
        }
        (text, done)
    }

    #[test]
    fn test_single_chunk() {
        let (text, done) = decode_all(&[STREAM.as_bytes()]);
        assert_eq!(text, "Hello wörld");
        assert!(done);
    }

    #[test]
    fn test_chunking_invariance() {
        let bytes = STREAM.as_bytes();
        let (reference, _) = decode_all(&[bytes]);

        // every split size, including ones that cut lines and the two-byte
        // UTF-8 sequence in half
        for size in 1..=17 {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            let (text, done) = decode_all(&chunks);
            assert_eq!(text, reference, "chunk size {}", size);
            assert!(done, "chunk size {}", size);
        }
    }

    #[test]
    fn test_partial_line_retained() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":").is_empty());
        assert!(!decoder.pending().is_empty());
        let frames = decoder.push(b"\"ping\"}\n");
        assert_eq!(frames.len(), 1);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: ping\n: comment\n\ndata: {}\n");
        assert_eq!(frames, vec![SseFrame::Data("{}".into())]);
    }

    #[test]
    fn test_crlf_lines() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: [DONE]\r\n");
        assert_eq!(frames, vec![SseFrame::Done]);
    }

    #[test]
    fn test_text_delta_ignores_other_events() {
        assert_eq!(text_delta(r#"{"type":"message_start"}"#), None);
        assert_eq!(
            text_delta(r#"{"type":"content_block_delta","delta":{"type":"input_json_delta","partial_json":"{"}}"#),
            None
        );
        assert_eq!(text_delta("not json"), None);
        assert_eq!(
            text_delta(r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"ok"}}"#),
            Some("ok".to_string())
        );
    }
}
