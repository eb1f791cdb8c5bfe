//! Call tree tracing.
//!
//! This module handles:
//! - Execution event types delivered by an event source
//! - Per-frame recorders forming the call tree
//! - The processor state machine that turns events into a tree
//! - The hook and source lookup seams to the host runtime

pub mod event;
pub mod hook;
pub mod processor;
pub mod recorder;

// Re-export main types
pub use event::{EventKind, FrameId, LineNo, TraceEvent};
pub use hook::{EventSource, HookToken, SourceLocator};
pub use processor::{TraceOutcome, TraceProcessor, TraceStats};
pub use recorder::{CallSignature, FrameDescriptor, FrameRecorder, LineRecord};
