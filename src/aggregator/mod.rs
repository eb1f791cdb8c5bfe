//! Aggregation of the call tree into collapsed stacks and metrics.
//!
//! This module transforms a finished call tree into:
//! - Collapsed stack format (for flamegraph generation)
//! - Hot path analysis (top self-time stacks)
//! - Hot line analysis (top source lines)
//! - Time distribution statistics

pub mod metrics;
pub mod stack_builder;

// Re-export main types and functions
pub use metrics::{
    calculate_hot_lines, calculate_hot_paths, calculate_time_distribution, create_hot_path,
    TimeDistribution,
};
pub use stack_builder::{build_collapsed_stacks, merge_small_stacks, CollapsedStack};
