//! Incremental `text/event-stream` decoder.

use crate::error::StreamError;

/// Event type dispatched when the server does not name one.
pub const DEFAULT_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
    /// Reconnection time in milliseconds requested by the server.
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event: DEFAULT_EVENT.to_string(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }

    pub fn is_message(&self) -> bool {
        self.event == DEFAULT_EVENT
    }
}

/// Longest incomplete line buffered before the stream is rejected.
pub const DEFAULT_MAX_LINE: usize = 1024 * 1024;

/// Turns arbitrary byte chunks into complete events.
///
/// Lines end in LF, CRLF or a lone CR. A chunk may split a line, a CRLF pair
/// or a UTF-8 sequence; the remainder is buffered until the next chunk.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event_type: String,
    data: String,
    last_event_id: Option<String>,
    retry: Option<u64>,
    bom_checked: bool,
    /// The previous chunk ended in CR; a leading LF belongs to it.
    skip_lf: bool,
    max_line: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            event_type: String::new(),
            data: String::new(),
            last_event_id: None,
            retry: None,
            bom_checked: false,
            skip_lf: false,
            max_line: DEFAULT_MAX_LINE,
        }
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    /// Feed one chunk and collect every event it completes.
    ///
    /// Fails once an unterminated line grows past the line limit.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, StreamError> {
        self.buffer.extend_from_slice(chunk);
        if !self.bom_checked {
            if self.buffer.len() < 3 && b"\xEF\xBB\xBF".starts_with(&self.buffer) {
                return Ok(Vec::new());
            }
            if self.buffer.starts_with(b"\xEF\xBB\xBF") {
                self.buffer.drain(..3);
            }
            self.bom_checked = true;
        }

        let mut events = Vec::new();
        let mut consumed = 0;
        loop {
            let rest = &self.buffer[consumed..];
            if self.skip_lf {
                let Some(first) = rest.first() else {
                    break;
                };
                self.skip_lf = false;
                if *first == b'\n' {
                    consumed += 1;
                    continue;
                }
            }
            let Some(pos) = rest.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                break;
            };
            let terminator = if rest[pos] == b'\r' {
                match rest.get(pos + 1) {
                    Some(b'\n') => 2,
                    Some(_) => 1,
                    None => {
                        self.skip_lf = true;
                        1
                    }
                }
            } else {
                1
            };
            let line = String::from_utf8_lossy(&rest[..pos]).into_owned();
            consumed += pos + terminator;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > self.max_line {
            return Err(StreamError::Transport(format!(
                "event stream line exceeds {} bytes",
                self.max_line
            )));
        }
        Ok(events)
    }

    /// Last `id` field seen, sent back as `Last-Event-ID` on reconnect.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry = value.parse().ok();
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        Some(SseEvent {
            event: if event_type.is_empty() {
                DEFAULT_EVENT.to_string()
            } else {
                event_type
            },
            data,
            id: self.last_event_id.clone(),
            retry: self.retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::new();
        chunks
            .iter()
            .flat_map(|c| decoder.feed(c).unwrap())
            .collect()
    }

    #[test]
    fn single_data_event() {
        let events = decode_all(&[b"data: {\"spend\":100}\n\n"]);
        assert_eq!(events, vec![SseEvent::message("{\"spend\":100}")]);
    }

    #[test]
    fn multiline_data_is_joined_with_newline() {
        let events = decode_all(&[b"data: first\ndata: second\n\n"]);
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn comments_and_unknown_fields_are_ignored() {
        let events = decode_all(&[b": keep-alive\nfoo: bar\ndata: x\n\n"]);
        assert_eq!(events, vec![SseEvent::message("x")]);
    }

    #[test]
    fn heartbeat_without_data_dispatches_nothing() {
        assert!(decode_all(&[b": ping\n\n", b"event: tick\n\n"]).is_empty());
    }

    #[test]
    fn named_event_and_id_are_reported() {
        let events = decode_all(&[b"event: status\nid: 42\nretry: 1500\ndata: up\n\n"]);
        assert_eq!(
            events,
            vec![SseEvent {
                event: "status".to_string(),
                data: "up".to_string(),
                id: Some("42".to_string()),
                retry: Some(1500),
            }]
        );
        assert!(!events[0].is_message());
    }

    #[test]
    fn event_type_resets_after_dispatch() {
        let events = decode_all(&[b"event: status\ndata: a\n\ndata: b\n\n"]);
        assert_eq!(events[1].event, DEFAULT_EVENT);
    }

    #[test]
    fn id_persists_across_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"id: 7\ndata: a\n\ndata: b\n\n").unwrap();
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert_eq!(decoder.last_event_id(), Some("7"));
    }

    #[test]
    fn invalid_retry_is_ignored() {
        let events = decode_all(&[b"retry: soon\ndata: a\n\n"]);
        assert_eq!(events[0].retry, None);
    }

    #[test]
    fn chunk_boundaries_inside_lines() {
        let events = decode_all(&[b"da", b"ta: hel", b"lo\n", b"\n"]);
        assert_eq!(events, vec![SseEvent::message("hello")]);
    }

    #[test]
    fn crlf_split_across_chunks_is_one_terminator() {
        let events = decode_all(&[b"data: a\r", b"\n\r\n"]);
        assert_eq!(events, vec![SseEvent::message("a")]);
    }

    #[test]
    fn lone_cr_terminates_lines() {
        let events = decode_all(&[b"data: a\r\rdata: b\r\r"]);
        assert_eq!(
            events,
            vec![SseEvent::message("a"), SseEvent::message("b")]
        );
    }

    #[test]
    fn event_ending_in_cr_dispatches_without_next_chunk() {
        let mut decoder = SseDecoder::new();
        assert_eq!(
            decoder.feed(b"data: a\r\r").unwrap(),
            vec![SseEvent::message("a")]
        );
        // The LF of a split CRLF is not read as a second blank line.
        assert!(decoder.feed(b"\ndata: b\r").unwrap().is_empty());
        assert_eq!(
            decoder.feed(b"\n\r\n").unwrap(),
            vec![SseEvent::message("b")]
        );
    }

    #[test]
    fn overlong_line_is_rejected() {
        let mut decoder = SseDecoder::new().with_max_line(16);
        assert!(decoder.feed(b"data: 0123456789").unwrap().is_empty());
        let err = decoder.feed(b"abcdef").unwrap_err();
        assert!(matches!(err, StreamError::Transport(_)));
    }

    #[test]
    fn long_terminated_lines_are_fine() {
        let mut decoder = SseDecoder::new().with_max_line(16);
        let line = format!("data: {}\n\n", "x".repeat(64));
        let events = decoder.feed(line.as_bytes()).unwrap();
        assert_eq!(events[0].data.len(), 64);
    }

    #[test]
    fn utf8_split_across_chunks() {
        let text = "data: caf\u{e9}\n\n".as_bytes();
        let split = text.len() - 3;
        let events = decode_all(&[&text[..split], &text[split..]]);
        assert_eq!(events[0].data, "caf\u{e9}");
    }

    #[test]
    fn leading_bom_is_stripped() {
        let events = decode_all(&[b"\xEF\xBB", b"\xBFdata: a\n\n"]);
        assert_eq!(events, vec![SseEvent::message("a")]);
    }

    #[test]
    fn field_without_colon_has_empty_value() {
        let events = decode_all(&[b"data\ndata\n\n"]);
        assert_eq!(events[0].data, "\n");
    }

    #[test]
    fn incomplete_event_is_not_dispatched() {
        assert!(decode_all(&[b"data: partial\n"]).is_empty());
    }
}
