//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use crate::tracer::event::{EventKind, FrameId};
use thiserror::Error;

/// Errors that can occur while tracing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    #[error("Source unavailable for frame {frame}: {reason}")]
    SourceUnavailable { frame: FrameId, reason: String },

    #[error("Stack underflow on {event} event in frame {frame}: call tree is no longer trustworthy")]
    StackUnderflow { event: EventKind, frame: FrameId },

    #[error("Tracer was not started")]
    NotStarted,

    #[error("Tracer is already running")]
    AlreadyStarted,
}

/// Errors that can occur during event log parsing
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid event log format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported event log version: {0}")]
    UnsupportedVersion(String),

    #[error("Unknown code key: {0}")]
    UnknownCode(String),
}

/// Errors that can occur during flamegraph generation
#[derive(Error, Debug)]
pub enum FlamegraphError {
    #[error("Empty stack data")]
    EmptyStacks,
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
