// Server-sent events transport for the stream subscriber.
//
// Opens `GET {base}/api/notifications/stream?token=..` and turns the streamed
// body into frames. The token rides in the query string because browser
// EventSource can't set headers, and the server accepts it the same way here.

use crate::core::notifications::{ChannelTransport, Frame, FrameStream, StreamError};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Upper bound for one event (and so for one line) held in memory.
const MAX_EVENT_BYTES: usize = 64 * 1024;

/// Incremental `text/event-stream` parser. Bytes go in, complete event
/// `data` payloads come out. Events larger than `MAX_EVENT_BYTES` are dropped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    data_len: usize,
    // Rest of an oversized line still to be thrown away
    skip_line: bool,
    // Current event went over the limit; drop it at its blank line
    oversized: bool,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            if self.skip_line {
                self.skip_line = false;
                continue;
            }
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() && !self.oversized {
                    events.push(self.data.join("\n"));
                }
                self.reset_event();
                continue;
            }
            // Comment lines (keep-alives) start with a colon
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" && !self.oversized {
                self.data_len += value.len();
                if self.data_len > MAX_EVENT_BYTES {
                    self.drop_event();
                } else {
                    self.data.push(value.to_string());
                }
            }
        }

        if self.buffer.len() > MAX_EVENT_BYTES {
            self.buffer.clear();
            self.skip_line = true;
            self.drop_event();
        }

        events
    }

    fn drop_event(&mut self) {
        tracing::warn!(limit = MAX_EVENT_BYTES, "Dropping oversized server-sent event");
        self.data.clear();
        self.oversized = true;
    }

    fn reset_event(&mut self) {
        self.data.clear();
        self.data_len = 0;
        self.oversized = false;
    }
}

pub struct SseTransport {
    client: Client,
    base_url: String,
}

impl SseTransport {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> anyhow::Result<Self> {
        // No overall timeout: the response body is meant to stay open
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChannelTransport for SseTransport {
    async fn connect(&self, token: &str) -> Result<FrameStream, StreamError> {
        let response = self
            .client
            .get(format!("{}/api/notifications/stream", self.base_url))
            .query(&[("token", token)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                return Err(StreamError::Auth(body));
            }
            status if !status.is_success() => {
                return Err(StreamError::Transport(format!("HTTP {status}")));
            }
            _ => {}
        }

        let mut decoder = SseDecoder::default();
        let frames = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .map(|data| {
                        Frame::decode(&data).map_err(|e| StreamError::Decode(e.to_string()))
                    })
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(StreamError::Transport(e.to_string()))],
            })
            .flat_map(stream::iter);

        Ok(frames.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"type\":\"hea").is_empty());
        assert!(decoder.push(b"rtbeat\"}\n").is_empty());
        let events = decoder.push(b"\n");
        assert_eq!(events, vec![r#"{"type":"heartbeat"}"#.to_string()]);
    }

    #[test]
    fn test_decoder_skips_comments_and_other_fields() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\n\nevent: frame\nid: 4\ndata:a\r\ndata: b\r\n\r\n");
        assert_eq!(events, vec!["a\nb".to_string()]);
    }

    #[test]
    fn test_decoder_emits_several_events_per_chunk() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: 1\n\ndata: 2\n\ndata: 3");
        assert_eq!(events, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(decoder.push(b"\n\n"), vec!["3".to_string()]);
    }

    #[test]
    fn test_decoded_payload_becomes_frame() {
        let mut decoder = SseDecoder::default();
        let data = decoder.push(b"data: {\"type\":\"heartbeat\"}\n\n");
        assert_eq!(Frame::decode(&data[0]).unwrap(), Frame::Heartbeat);
    }

    #[test]
    fn test_decoder_drops_oversized_line() {
        let mut decoder = SseDecoder::default();
        let flood = vec![b'a'; MAX_EVENT_BYTES + 10];
        assert!(decoder.push(b"data: ").is_empty());
        assert!(decoder.push(&flood).is_empty());
        assert!(decoder.buffer.len() <= MAX_EVENT_BYTES);
        assert!(decoder.push(&flood).is_empty());
        assert!(decoder.buffer.len() <= MAX_EVENT_BYTES);

        let events = decoder.push(b"tail\n\ndata: ok\n\n");
        assert_eq!(events, vec!["ok".to_string()]);
    }

    #[test]
    fn test_decoder_drops_event_with_too_many_lines() {
        let mut decoder = SseDecoder::default();
        let line = format!("data: {}\n", "b".repeat(1024));
        for _ in 0..(MAX_EVENT_BYTES / 1024 + 1) {
            assert!(decoder.push(line.as_bytes()).is_empty());
        }
        assert!(decoder.data.is_empty());

        let events = decoder.push(b"\ndata: next\n\n");
        assert_eq!(events, vec!["next".to_string()]);
    }
}
