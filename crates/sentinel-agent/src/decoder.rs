//! Line-level parsing of an event stream.

use sentinel_types::wire::{DATA_PREFIX, EVENT_PREFIX};

/// One dispatched event: its type and newline-joined data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    /// Value of the last `event:` line, empty for the default type.
    pub event_type: String,
    /// Data lines joined with `\n`.
    pub data: String,
}

/// Accumulates lines until a blank line closes an event.
///
/// `data:` lines are collected, `event:` sets the type and every other line
/// (comments, `id:`, `retry:`) is ignored. A blank line with no data
/// dispatches nothing and keeps the pending type.
#[derive(Debug, Default)]
pub struct FrameParser {
    event_type: String,
    data: Vec<String>,
}

impl FrameParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line without its terminator.
    pub fn push_line(&mut self, line: &str) -> Option<RawEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let event = RawEvent {
                event_type: std::mem::take(&mut self.event_type),
                data: self.data.join("\n"),
            };
            self.data.clear();
            return Some(event);
        }

        if let Some(data) = line.strip_prefix(DATA_PREFIX) {
            self.data.push(data.to_string());
        } else if let Some(kind) = line.strip_prefix(EVENT_PREFIX) {
            self.event_type = kind.to_string();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut FrameParser, text: &str) -> Vec<RawEvent> {
        text.split('\n').filter_map(|l| parser.push_line(l)).collect()
    }

    #[test]
    fn test_single_event() {
        let mut parser = FrameParser::new();
        let events = feed(&mut parser, "data: abc\n\n");
        assert_eq!(
            events,
            vec![RawEvent {
                event_type: String::new(),
                data: "abc".into()
            }]
        );
    }

    #[test]
    fn test_multiline_data_is_joined() {
        let mut parser = FrameParser::new();
        let events = feed(&mut parser, "data: first\ndata: second\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "first\nsecond");
        assert_eq!(events[0].event_type, "");
    }

    #[test]
    fn test_event_type_resets_after_dispatch() {
        let mut parser = FrameParser::new();
        let events = feed(&mut parser, "event: changed\ndata: a\n\ndata: b\n\n");
        assert_eq!(events[0].event_type, "changed");
        assert_eq!(events[1].event_type, "");
    }

    #[test]
    fn test_other_lines_are_ignored() {
        let mut parser = FrameParser::new();
        let events = feed(
            &mut parser,
            ": keepalive\n\nid: 7\nretry: 1000\ndata: x\n\n",
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_blank_line_without_data_keeps_type() {
        let mut parser = FrameParser::new();
        assert!(parser.push_line("event: changed").is_none());
        assert!(parser.push_line("").is_none());
        assert!(parser.push_line("data: x").is_none());
        assert_eq!(parser.push_line("").unwrap().event_type, "changed");
    }

    #[test]
    fn test_crlf_lines() {
        let mut parser = FrameParser::new();
        assert!(parser.push_line("data: x\r").is_none());
        assert_eq!(parser.push_line("\r").unwrap().data, "x");
    }
}
