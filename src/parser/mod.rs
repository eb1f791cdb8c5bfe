//! Event log parsing, replay and schema definitions.
//!
//! This module handles:
//! - Parsing recorded event logs
//! - Replaying them through the trace processor
//! - Defining output schema

pub mod event_log;
pub mod replay;
pub mod schema;

// Re-export main types
pub use event_log::{parse_event_log, validate_log_format, CodeEntry, EventLog, RecordedSources};
pub use replay::{trace_event_log, ReplaySource};
pub use schema::{to_profile, CallNode, HotLine, HotPath, LineNode, NodeEvent, Profile, SourceHint};
