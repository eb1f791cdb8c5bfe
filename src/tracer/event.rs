//! Execution events delivered by an event source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Line number within a source file (1-based)
pub type LineNo = u32;

/// Opaque identity of one frame activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of execution event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Call,
    Line,
    Return,
    Exception,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Call => "call",
            EventKind::Line => "line",
            EventKind::Return => "return",
            EventKind::Exception => "exception",
        };
        f.write_str(name)
    }
}

/// A single execution event
///
/// Events for one logical stack must arrive in an order consistent with
/// real call/return nesting, and timestamps must be monotonic.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub kind: EventKind,

    /// Frame the event happened in
    pub frame: FrameId,

    /// Current line of `frame`
    pub line: LineNo,

    /// Calling frame, if any
    pub caller: Option<FrameId>,

    /// Current line of the calling frame (the origin line for calls)
    pub caller_line: Option<LineNo>,

    /// Monotonic timestamp in seconds
    pub timestamp: f64,
}

impl TraceEvent {
    pub fn call(
        frame: FrameId,
        line: LineNo,
        caller: FrameId,
        caller_line: LineNo,
        timestamp: f64,
    ) -> Self {
        Self {
            kind: EventKind::Call,
            frame,
            line,
            caller: Some(caller),
            caller_line: Some(caller_line),
            timestamp,
        }
    }

    pub fn line(frame: FrameId, line: LineNo, timestamp: f64) -> Self {
        Self::simple(EventKind::Line, frame, line, timestamp)
    }

    pub fn ret(frame: FrameId, line: LineNo, timestamp: f64) -> Self {
        Self::simple(EventKind::Return, frame, line, timestamp)
    }

    pub fn exception(
        frame: FrameId,
        line: LineNo,
        caller: Option<FrameId>,
        timestamp: f64,
    ) -> Self {
        Self {
            kind: EventKind::Exception,
            frame,
            line,
            caller,
            caller_line: None,
            timestamp,
        }
    }

    fn simple(kind: EventKind, frame: FrameId, line: LineNo, timestamp: f64) -> Self {
        Self {
            kind,
            frame,
            line,
            caller: None,
            caller_line: None,
            timestamp,
        }
    }
}
