//! Server-Sent Events (SSE) processing for chat responses.
//!
//! Chat replies arrive in one of two framings:
//!
//! - A buffered body: the whole event stream, already terminated, as one string.  It is
//!   scanned line by line by [`Frames`]: `data: ` lines carry chunks, `event: done` ends the
//!   reply and `event: error` aborts it.
//! - A live `text/event-stream` connection, processed by [`process_sse`].  Bytes are framed
//!   into lines without assuming that network fragments line up with lines or characters, then
//!   folded into named `message`, `done` and `error` events.
//!
//! Both produce the same [`StreamEvent`] sequence, and both decode chunk payloads with
//! [`decode_chunk`].

use std::io;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde_json::{Number, Value};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::error::{Error, Result};
use crate::types::{ChunkText, StreamEvent};

/// Prefix of a line carrying a chunk payload.
pub const DATA_PREFIX: &str = "data: ";

/// Prefix of the line that completes a reply.
pub const DONE_MARKER: &str = "event: done";

/// Prefix of the line that aborts a reply.
pub const ERROR_MARKER: &str = "event: error";

/// Longest line accepted from a live event stream.
pub const MAX_LINE_LENGTH: usize = 1 << 20;

/// Decodes one chunk payload.
///
/// A payload that is a JSON string yields the unescaped string, and a JSON number or boolean
/// yields its text.  Integral numbers print without a fractional part, so `1e3` is `1000`.
/// Anything else (plain text, objects, malformed JSON) is used verbatim.  The decision is made
/// per payload, so one reply may mix both encodings.
pub fn decode_chunk(payload: &str) -> ChunkText {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::String(text)) => ChunkText::Decoded(text),
        Ok(Value::Number(number)) => ChunkText::Decoded(number_text(&number)),
        Ok(Value::Bool(flag)) => ChunkText::Decoded(flag.to_string()),
        _ => ChunkText::Verbatim(payload.to_string()),
    }
}

fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(value) if number.is_f64() && value.fract() == 0.0 && value.abs() < 1e21 => {
            format!("{value:.0}")
        }
        _ => number.to_string(),
    }
}

/// Extracts the detail of an error event from its payload.
///
/// A string `error` field wins, then a string `message` field, so `{"error": true, "message":
/// "..."}` yields the message.  Other objects are kept verbatim.  A bare string or plain text is
/// accepted as well.  An empty payload, `{}` and `null` carry no detail.
pub fn error_detail(payload: &str) -> Option<String> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => map
            .get("error")
            .and_then(Value::as_str)
            .or_else(|| map.get("message").and_then(Value::as_str))
            .map(String::from)
            .or_else(|| (!map.is_empty()).then(|| payload.trim().to_string())),
        Ok(Value::Null) => None,
        _ => {
            let text = decode_chunk(payload).into_string();
            (!text.is_empty()).then_some(text)
        }
    }
}

enum Line<'a> {
    Data(&'a str),
    Done,
    Error,
    Ignored,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        Line::Data(payload)
    } else if line.starts_with(DONE_MARKER) {
        Line::Done
    } else if line.starts_with(ERROR_MARKER) {
        Line::Error
    } else {
        Line::Ignored
    }
}

/// Lazily parses a complete, buffered event-stream body.
///
/// Yields chunks in order and then exactly one terminal event.  Lines after the first
/// `event: done` or `event: error` are never looked at.  A body that ends without a marker is
/// complete by construction, so the end of the body counts as `Done`.
#[derive(Debug, Clone)]
pub struct Frames {
    body: String,
    pos: usize,
    finished: bool,
}

impl Frames {
    /// Creates a parser over `body`.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            pos: 0,
            finished: false,
        }
    }

    /// Returns the byte range of the next line, without its terminator.
    fn next_line(&mut self) -> Option<(usize, usize)> {
        if self.pos >= self.body.len() {
            return None;
        }
        let start = self.pos;
        let mut end = match self.body[start..].find('\n') {
            Some(offset) => {
                self.pos = start + offset + 1;
                start + offset
            }
            None => {
                self.pos = self.body.len();
                self.body.len()
            }
        };
        if end > start && self.body.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        Some((start, end))
    }
}

impl Iterator for Frames {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        loop {
            let Some((start, end)) = self.next_line() else {
                self.finished = true;
                return Some(StreamEvent::Done);
            };
            match classify(&self.body[start..end]) {
                Line::Data(payload) => return Some(decode_chunk(payload).into()),
                Line::Done => {
                    self.finished = true;
                    return Some(StreamEvent::Done);
                }
                Line::Error => {
                    self.finished = true;
                    let detail = self.next_line().and_then(|(start, end)| {
                        self.body[start..end]
                            .strip_prefix(DATA_PREFIX)
                            .and_then(error_detail)
                    });
                    return Some(StreamEvent::Error { detail });
                }
                Line::Ignored => {}
            }
        }
    }
}

impl std::iter::FusedIterator for Frames {}

/// Parses a complete, buffered event-stream body.
pub fn parse_body(body: impl Into<String>) -> Frames {
    Frames::new(body)
}

/// Accumulates the fields of one live SSE event until the blank line that dispatches it.
#[derive(Debug, Default)]
struct EventBuilder {
    name: Option<String>,
    data: Vec<String>,
}

impl EventBuilder {
    fn feed(&mut self, line: &str) -> Option<StreamEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.name = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        let name = self.name.take();
        let data = std::mem::take(&mut self.data);
        let has_data = !data.is_empty();
        let payload = data.join("\n");
        match name.as_deref().unwrap_or("message") {
            "message" if has_data => Some(decode_chunk(&payload).into()),
            "done" => Some(StreamEvent::Done),
            "error" => Some(StreamEvent::Error {
                detail: error_detail(&payload),
            }),
            _ => None,
        }
    }
}

struct LiveState<S> {
    lines: FramedRead<StreamReader<S, Bytes>, LinesCodec>,
    builder: EventBuilder,
    finished: bool,
}

/// Process a live byte stream into a stream of chat events.
///
/// The returned stream ends right after the first terminal event.  If the connection closes
/// before `done` or `error` arrives, the last item is a connection error: closing the
/// connection does not complete a reply.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = io::Result<Bytes>> + Send + Unpin + 'static,
{
    let state = LiveState {
        lines: FramedRead::new(
            StreamReader::new(byte_stream),
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        ),
        builder: EventBuilder::default(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        loop {
            match state.lines.next().await {
                Some(Ok(line)) => {
                    if let Some(event) = state.builder.feed(&line) {
                        state.finished = event.is_terminal();
                        return Some((Ok(event), state));
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(codec_error(e)), state));
                }
                None => {
                    state.finished = true;
                    return Some((
                        Err(Error::connection(
                            "event stream closed before the done event",
                            None,
                        )),
                        state,
                    ));
                }
            }
        }
    })
}

fn codec_error(err: LinesCodecError) -> Error {
    match err {
        LinesCodecError::Io(e) if e.kind() == io::ErrorKind::InvalidData => {
            Error::encoding(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e)))
        }
        LinesCodecError::Io(e) => {
            Error::connection(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
        }
        other => Error::encoding(
            format!("Malformed event stream: {other}"),
            Some(Box::new(other)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(events: &[StreamEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Chunk { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn fragments(parts: &[&[u8]]) -> impl Stream<Item = io::Result<Bytes>> + Send + Unpin + use<> {
        let parts: Vec<io::Result<Bytes>> = parts
            .iter()
            .map(|part| Ok(Bytes::copy_from_slice(part)))
            .collect();
        stream::iter(parts)
    }

    async fn collect_live(parts: &[&[u8]]) -> Vec<Result<StreamEvent>> {
        process_sse(fragments(parts)).collect().await
    }

    #[test]
    fn decode_json_string() {
        assert_eq!(
            decode_chunk(r#""He said \"hi\"\n""#),
            ChunkText::Decoded("He said \"hi\"\n".to_string())
        );
    }

    #[test]
    fn decode_scalars() {
        assert_eq!(decode_chunk("42"), ChunkText::Decoded("42".to_string()));
        assert_eq!(decode_chunk("true"), ChunkText::Decoded("true".to_string()));
        assert_eq!(decode_chunk("1e3"), ChunkText::Decoded("1000".to_string()));
        assert_eq!(decode_chunk("1.0"), ChunkText::Decoded("1".to_string()));
        assert_eq!(decode_chunk("-2.5"), ChunkText::Decoded("-2.5".to_string()));
    }

    #[test]
    fn decode_falls_back_to_verbatim() {
        assert_eq!(
            decode_chunk("plain words"),
            ChunkText::Verbatim("plain words".to_string())
        );
        assert_eq!(
            decode_chunk(r#""unterminated"#),
            ChunkText::Verbatim(r#""unterminated"#.to_string())
        );
        assert_eq!(decode_chunk("{}"), ChunkText::Verbatim("{}".to_string()));
        assert_eq!(decode_chunk("null"), ChunkText::Verbatim("null".to_string()));
    }

    #[test]
    fn error_details() {
        assert_eq!(
            error_detail(r#"{"error": "model overloaded"}"#),
            Some("model overloaded".to_string())
        );
        assert_eq!(error_detail(r#"{"message": "nope"}"#), Some("nope".to_string()));
        assert_eq!(error_detail(r#""Error: boom""#), Some("Error: boom".to_string()));
        assert_eq!(
            error_detail(r#"{"error": true, "message": "Session not found"}"#),
            Some("Session not found".to_string())
        );
        assert_eq!(
            error_detail(r#"{"error": true, "code": 7}"#),
            Some(r#"{"error": true, "code": 7}"#.to_string())
        );
        assert_eq!(error_detail("{}"), None);
        assert_eq!(error_detail(""), None);
    }

    #[test]
    fn parse_hello() {
        let body = "data: \"He\"\n\ndata: \"llo\"\n\nevent: done\ndata: {}\n\n";
        let events: Vec<_> = parse_body(body).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::chunk("He"),
                StreamEvent::chunk("llo"),
                StreamEvent::Done
            ]
        );
    }

    #[test]
    fn decode_is_per_line() {
        let body = "data: \"quoted \"\ndata: raw text\ndata: \" again\"\nevent: done\n";
        let events: Vec<_> = parse_body(body).collect();
        assert_eq!(chunks(&events), vec!["quoted ", "raw text", " again"]);
    }

    #[test]
    fn lines_after_done_are_not_processed() {
        let body = "data: \"a\"\nevent: done\ndata: \"b\"\nevent: error\n";
        let events: Vec<_> = parse_body(body).collect();
        assert_eq!(events, vec![StreamEvent::chunk("a"), StreamEvent::Done]);
    }

    #[test]
    fn error_terminates_with_detail() {
        let body = "data: \"partial\"\n\nevent: error\ndata: {\"error\": \"boom\"}\n\ndata: \"late\"\n";
        let events: Vec<_> = parse_body(body).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::chunk("partial"),
                StreamEvent::Error {
                    detail: Some("boom".to_string())
                }
            ]
        );
    }

    #[test]
    fn error_with_flag_and_message() {
        let body = "event: error\ndata: {\"error\": true, \"message\": \"Session not found\"}\n";
        let events: Vec<_> = parse_body(body).collect();
        assert_eq!(
            events,
            vec![StreamEvent::Error {
                detail: Some("Session not found".to_string())
            }]
        );
    }

    #[test]
    fn error_without_detail() {
        let events: Vec<_> = parse_body("event: error\n").collect();
        assert_eq!(events, vec![StreamEvent::Error { detail: None }]);
    }

    #[test]
    fn unrelated_lines_are_ignored() {
        let body = ": keepalive\nid: 7\nretry: 100\n\ndata:\"no space\"\ndata: \"kept\"\n";
        let events: Vec<_> = parse_body(body).collect();
        assert_eq!(events, vec![StreamEvent::chunk("kept"), StreamEvent::Done]);
    }

    #[test]
    fn crlf_lines() {
        let body = "data: \"a\"\r\n\r\nevent: done\r\n";
        let events: Vec<_> = parse_body(body).collect();
        assert_eq!(events, vec![StreamEvent::chunk("a"), StreamEvent::Done]);
    }

    #[test]
    fn body_without_marker_is_complete() {
        let events: Vec<_> = parse_body("data: \"only\"").collect();
        assert_eq!(events, vec![StreamEvent::chunk("only"), StreamEvent::Done]);
        let events: Vec<_> = parse_body("").collect();
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn frames_are_fused() {
        let mut frames = parse_body("event: done\n");
        assert_eq!(frames.next(), Some(StreamEvent::Done));
        assert_eq!(frames.next(), None);
        assert_eq!(frames.next(), None);
    }

    #[tokio::test]
    async fn live_named_events() {
        let events = collect_live(&[
            b"data: \"He\"\n\n",
            b"event: message\ndata: \"llo\"\n\n",
            b"event: done\ndata: {}\n\n",
        ])
        .await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::chunk("He"),
                StreamEvent::chunk("llo"),
                StreamEvent::Done
            ]
        );
    }

    #[tokio::test]
    async fn live_fragments_split_mid_line() {
        let events = collect_live(&[b"da", b"ta: \"Hel", b"lo\"\n", b"\nevent: do", b"ne\n\n"]).await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events, vec![StreamEvent::chunk("Hello"), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn live_fragments_split_mid_character() {
        let text = "data: \"caf\u{e9}\"\n\nevent: done\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let events = collect_live(&[&text[..split], &text[split..]]).await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events, vec![StreamEvent::chunk("caf\u{e9}"), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn live_multiline_data_is_joined() {
        let events = collect_live(&[b"data: first\ndata: second\n\nevent: done\n\n"]).await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![StreamEvent::chunk("first\nsecond"), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn live_error_event() {
        let events = collect_live(&[
            b"data: \"partial\"\n\n",
            b"event: error\ndata: {\"error\": \"boom\"}\n\n",
            b"data: \"never\"\n\n",
        ])
        .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            Ok(StreamEvent::Error { detail: Some(detail) }) if detail == "boom"
        ));
    }

    #[tokio::test]
    async fn live_close_before_done_is_an_error() {
        let events = collect_live(&[b"data: \"partial\"\n\n", b"data: \"cut"]).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Ok(StreamEvent::Chunk { text }) if text == "partial"));
        let err = events[1].as_ref().unwrap_err();
        assert!(err.is_transport_failure());
    }

    #[tokio::test]
    async fn live_comments_and_unknown_events_are_ignored() {
        let events = collect_live(&[b": ping\n\nevent: progress\ndata: 50\n\nevent: done\n\n"]).await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[tokio::test]
    async fn live_overlong_line_is_an_error() {
        let line = vec![b'x'; MAX_LINE_LENGTH + 1];
        let events = collect_live(&[b"data: \"a\"\n\n", b"data: ", &line[..]]).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Ok(StreamEvent::Chunk { text }) if text == "a"));
        assert!(matches!(events[1], Err(Error::Encoding { .. })));
    }

    #[tokio::test]
    async fn live_transport_error() {
        let parts: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: \"a\"\n\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let events: Vec<_> = process_sse(stream::iter(parts)).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].as_ref().unwrap_err().is_transport_failure());
    }
}
