//! Trace Tree
//!
//! Line-level call tree profiling built from the execution events a host
//! runtime's instrumentation hook emits (call, line, return, exception).
//!
//! The core is [`tracer::TraceProcessor`], which turns an ordered event
//! stream into a tree of [`tracer::FrameRecorder`] nodes annotated with
//! invocation counts, per-line execution counts and inclusive wall-clock
//! time. The hook and source lookup are injected through the
//! [`tracer::EventSource`] and [`tracer::SourceLocator`] traits.
//!
//! ## Getting Started
//!
//! ```bash
//! trace-tree replay --input events.json --output profile.json --flamegraph profile.svg
//! ```

pub mod aggregator;
pub mod commands;
pub mod flamegraph;
pub mod output;
pub mod parser;
pub mod tracer;
pub mod utils;
