//! Flamegraph generation.
//!
//! This module converts collapsed stacks into SVG flamegraphs and
//! terminal summaries. Flamegraphs show where wall-clock time is spent.

pub mod generator;

// Re-export main types
pub use generator::{escape_xml, generate_flamegraph, generate_text_summary, FlamegraphConfig};
