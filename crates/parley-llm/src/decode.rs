//! Format-agnostic decoding of vendor stream bodies
//!
//! One decoder handles SSE (`data:` lines dispatched at blank lines), NDJSON
//! and Gemini's JSON-array framing without knowing in advance which one the
//! vendor speaks. The first SSE field line settles the question for good.

use std::collections::VecDeque;

use futures_util::{Stream, StreamExt, stream};
use parley_core::{ApiInterface, Stage};
use serde::de::IgnoredAny;

use crate::convert;
use crate::error::LlmError;
use crate::provider::EventStream;
use crate::types::StreamEvent;

/// Sentinel payload closing an OpenAI-style stream
const DONE_SENTINEL: &str = "[DONE]";

/// Unit produced by [`StreamDecoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// One complete JSON payload
    Payload(String),
    /// End of stream, emitted at most once
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
    #[error("stream ended inside a payload: {0}")]
    Truncated(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Emitting,
    Finished,
}

/// Pull-based decoder over arbitrarily split chunks
#[derive(Debug)]
pub struct StreamDecoder {
    max_line_bytes: usize,
    /// Bytes after the last newline; UTF-8 is only decoded per complete line
    buffer: Vec<u8>,
    sse: bool,
    data_lines: Vec<String>,
    /// NDJSON text that did not parse yet
    fragment: String,
    queue: VecDeque<Result<WireEvent, DecodeError>>,
    phase: Phase,
}

impl StreamDecoder {
    pub const fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            buffer: Vec::new(),
            sse: false,
            data_lines: Vec::new(),
            fragment: String::new(),
            queue: VecDeque::new(),
            phase: Phase::Idle,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        if self.phase == Phase::Finished {
            return;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.process_line(&line[..newline]);
            if self.phase == Phase::Finished {
                return;
            }
        }

        if self.buffer.len() > self.max_line_bytes {
            self.fail(DecodeError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }
    }

    /// Signal end of input
    ///
    /// Flushes the last line and any pending SSE event. Leaves exactly one
    /// terminal item in the queue: [`WireEvent::Done`] or an error.
    pub fn finish(&mut self) {
        if self.phase == Phase::Finished {
            return;
        }

        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.process_line(&rest);
        }
        if self.phase == Phase::Finished {
            return;
        }

        self.dispatch_sse();
        if self.phase == Phase::Finished {
            return;
        }

        let fragment = std::mem::take(&mut self.fragment);
        if fragment.trim().is_empty() {
            self.done();
        } else {
            self.fail(DecodeError::Truncated(parley_core::snippet(fragment.trim(), 200)));
        }
    }

    pub fn next_event(&mut self) -> Option<Result<WireEvent, DecodeError>> {
        self.queue.pop_front()
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    fn process_line(&mut self, raw: &[u8]) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.len() > self.max_line_bytes {
            self.fail(DecodeError::LineTooLong {
                limit: self.max_line_bytes,
            });
            return;
        }

        let line = String::from_utf8_lossy(raw);
        if line.trim().is_empty() {
            self.dispatch_sse();
            return;
        }

        if let Some(data) = sse_field(&line) {
            if !self.sse {
                self.sse = true;
                self.fragment.clear();
            }
            if let Some(value) = data {
                self.data_lines.push(value.to_owned());
            }
            return;
        }

        if self.sse {
            tracing::trace!(line = %parley_core::snippet(&line, 80), "ignoring non-field line in event stream");
        } else {
            self.try_json(&line);
        }
    }

    fn dispatch_sse(&mut self) {
        if self.data_lines.is_empty() {
            return;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();

        let data = data.trim();
        if data == DONE_SENTINEL {
            self.done();
        } else if !data.is_empty() {
            self.emit(data.to_owned());
        }
    }

    fn try_json(&mut self, line: &str) {
        let candidate = if self.fragment.is_empty() {
            line.trim().to_owned()
        } else {
            format!("{}\n{}", self.fragment, line.trim())
        };

        if candidate == DONE_SENTINEL {
            self.fragment.clear();
            self.done();
            return;
        }

        let body = strip_array_framing(&candidate);
        if body.is_empty() {
            self.fragment.clear();
        } else if serde_json::from_str::<IgnoredAny>(body).is_ok() {
            let payload = body.to_owned();
            self.fragment.clear();
            self.emit(payload);
        } else if candidate.len() > self.max_line_bytes {
            self.fail(DecodeError::LineTooLong {
                limit: self.max_line_bytes,
            });
        } else {
            self.fragment = candidate;
        }
    }

    fn emit(&mut self, payload: String) {
        self.phase = Phase::Emitting;
        self.queue.push_back(Ok(WireEvent::Payload(payload)));
    }

    fn done(&mut self) {
        if self.phase != Phase::Finished {
            self.queue.push_back(Ok(WireEvent::Done));
            self.terminate();
        }
    }

    fn fail(&mut self, error: DecodeError) {
        if self.phase != Phase::Finished {
            self.queue.push_back(Err(error));
            self.terminate();
        }
    }

    fn terminate(&mut self) {
        self.phase = Phase::Finished;
        self.buffer.clear();
        self.data_lines.clear();
        self.fragment.clear();
    }
}

/// SSE field line: `Some(Some(value))` for `data`, `Some(None)` for the
/// other fields and comments, `None` for anything else
fn sse_field(line: &str) -> Option<Option<&str>> {
    if line.starts_with(':') {
        return Some(None);
    }
    let (name, value) = line.split_once(':')?;
    match name {
        "data" => Some(Some(value.strip_prefix(' ').unwrap_or(value))),
        "event" | "id" | "retry" => Some(None),
        _ => None,
    }
}

/// Strip one leading `[`/`,` and one trailing `,`/`]` around an object
fn strip_array_framing(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix('[')
        .or_else(|| text.strip_prefix(','))
        .unwrap_or(text)
        .trim_start();
    text.strip_suffix(',')
        .or_else(|| text.strip_suffix(']'))
        .unwrap_or(text)
        .trim_end()
}

/// Decode a vendor byte stream into canonical events
///
/// The returned stream ends after [`StreamEvent::Done`] or the first error.
pub fn decode_vendor_stream<S, B>(bytes: S, interface: ApiInterface, max_line_bytes: usize) -> EventStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    struct State<S> {
        bytes: std::pin::Pin<Box<S>>,
        decoder: StreamDecoder,
        pending: VecDeque<Result<StreamEvent, LlmError>>,
        ended: bool,
    }

    let state = State {
        bytes: Box::pin(bytes),
        decoder: StreamDecoder::new(max_line_bytes),
        pending: VecDeque::new(),
        ended: false,
    };

    let events = stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.ended {
                return None;
            }

            match state.decoder.next_event() {
                Some(Ok(WireEvent::Payload(payload))) => match convert::parse_stream_payload(interface, &payload) {
                    Ok(events) => state.pending.extend(events.into_iter().map(Ok)),
                    Err(error) => {
                        state.pending.push_back(Err(error));
                        state.ended = true;
                    }
                },
                Some(Ok(WireEvent::Done)) => {
                    state.pending.push_back(Ok(StreamEvent::Done));
                    state.ended = true;
                }
                Some(Err(error)) => {
                    state.pending.push_back(Err(error.into()));
                    state.ended = true;
                }
                None => match state.bytes.next().await {
                    Some(Ok(chunk)) => state.decoder.feed(chunk.as_ref()),
                    Some(Err(error)) => {
                        state.pending.push_back(Err(LlmError::from_reqwest(&error, Stage::Stream)));
                        state.ended = true;
                    }
                    None => state.decoder.finish(),
                },
            }
        }
    });

    Box::pin(events)
}

/// Byte stream of a `reqwest` response
pub fn response_events(response: reqwest::Response, interface: ApiInterface, max_line_bytes: usize) -> EventStream {
    decode_vendor_stream(response.bytes_stream(), interface, max_line_bytes)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::executor::block_on;

    use super::*;
    use crate::types::FinishReason;

    fn decode_all(chunks: &[&[u8]], limit: usize) -> Vec<Result<WireEvent, DecodeError>> {
        let mut decoder = StreamDecoder::new(limit);
        let mut out = Vec::new();
        for chunk in chunks {
            decoder.feed(chunk);
            while let Some(event) = decoder.next_event() {
                out.push(event);
            }
        }
        decoder.finish();
        while let Some(event) = decoder.next_event() {
            out.push(event);
        }
        out
    }

    fn payload(text: &str) -> Result<WireEvent, DecodeError> {
        Ok(WireEvent::Payload(text.to_owned()))
    }

    #[test]
    fn sse_with_split_utf8() {
        let body = "data: {\"t\":\"你好\"}\n\ndata: [DONE]\n\n".as_bytes();
        // Cut inside the first multi-byte character
        let cut = body.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let events = decode_all(&[&body[..cut], &body[cut..]], 1024);

        assert_eq!(events, vec![payload("{\"t\":\"你好\"}"), Ok(WireEvent::Done)]);
    }

    #[test]
    fn sse_fields_and_comments_are_not_json() {
        let events = decode_all(&[b": keep-alive\nevent: message\nid: 7\nretry: 10\ndata: {\"a\":1}\r\n\r\n{\"b\":2}\n".as_slice()],
            1024,
        );
        // The bare JSON line after SSE was recognised is ignored
        assert_eq!(events, vec![payload("{\"a\":1}"), Ok(WireEvent::Done)]);
    }

    #[test]
    fn multi_line_data_is_joined() {
        let events = decode_all(&[b"data: {\"a\":\ndata: 1}\n\n".as_slice()], 1024);
        assert_eq!(events, vec![payload("{\"a\":\n1}"), Ok(WireEvent::Done)]);
    }

    #[test]
    fn ndjson_split_across_chunks() {
        let events = decode_all(&[b"{\"message\":{\"content\":\"H".as_slice(), b"\"}}\n{\"message\":{\"content\":\"i\"}}\n"], 1024);
        assert_eq!(
            events,
            vec![
                payload("{\"message\":{\"content\":\"H\"}}"),
                payload("{\"message\":{\"content\":\"i\"}}"),
                Ok(WireEvent::Done)
            ]
        );
    }

    #[test]
    fn pretty_printed_json_array() {
        let body = "[{\n  \"a\": 1\n}\n,\r\n{\n  \"b\": [2]\n}\n]";
        let events = decode_all(&[body.as_bytes()], 1024);
        assert_eq!(events, vec![payload("{\n\"a\": 1\n}"), payload("{\n\"b\": [2]\n}"), Ok(WireEvent::Done)]);
    }

    #[test]
    fn final_line_without_newline_is_flushed() {
        let events = decode_all(&[b"{\"done\":true}".as_slice()], 1024);
        assert_eq!(events, vec![payload("{\"done\":true}"), Ok(WireEvent::Done)]);
    }

    #[test]
    fn unparseable_remainder_is_truncated() {
        let events = decode_all(&[b"{\"message\":{\"content\":\"Hi".as_slice()], 1024);
        assert!(matches!(events.as_slice(), [Err(DecodeError::Truncated(_))]));
    }

    #[test]
    fn done_is_emitted_once() {
        let mut decoder = StreamDecoder::new(1024);
        decoder.feed(b"data: [DONE]\n\ndata: {\"late\":1}\n\n");
        decoder.finish();
        decoder.finish();

        assert_eq!(decoder.next_event(), Some(Ok(WireEvent::Done)));
        assert_eq!(decoder.next_event(), None);
        assert!(decoder.is_finished());
    }

    #[test]
    fn overlong_pending_line_fails() {
        let events = decode_all(&[[b'x'; 64].as_slice()], 16);
        assert_eq!(events, vec![Err(DecodeError::LineTooLong { limit: 16 })]);
    }

    #[test]
    fn overlong_fragment_fails() {
        let events = decode_all(&[b"{\"a\":\n\"bbbbbbbb\n\"cccccccc\n".as_slice()], 20);
        assert_eq!(events, vec![Err(DecodeError::LineTooLong { limit: 20 })]);
    }

    #[test]
    fn vendor_stream_to_events() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\nda")),
            Ok(Bytes::from_static(
                b"ta: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\ndata: [DONE]\n\n",
            )),
        ];
        let events: Vec<_> = block_on(
            decode_vendor_stream(stream::iter(chunks), ApiInterface::OpenaiCompatible, 1024).collect::<Vec<_>>(),
        );
        let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hel".to_owned()),
                StreamEvent::Delta("lo".to_owned()),
                StreamEvent::Finish(FinishReason::Stop),
                StreamEvent::Done
            ]
        );
    }

    #[test]
    fn gemini_line_split_across_chunks() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"{\"candidates\":[{\"content\"")),
            Ok(Bytes::from_static(b":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n")),
        ];
        let events: Vec<_> = block_on(
            decode_vendor_stream(stream::iter(chunks), ApiInterface::GeminiNative, 1024).collect::<Vec<_>>(),
        );

        let text: String = events
            .into_iter()
            .map(Result::unwrap)
            .filter_map(|event| match event {
                StreamEvent::Delta(text) => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hi");
    }

    #[test]
    fn malformed_payload_ends_stream_with_error() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![Ok(Bytes::from_static(b"data: {\"oops\": \n\n"))];
        let events: Vec<_> = block_on(
            decode_vendor_stream(stream::iter(chunks), ApiInterface::OpenaiCompatible, 1024).collect::<Vec<_>>(),
        );
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(LlmError::Decode { .. })));
    }
}
