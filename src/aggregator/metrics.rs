//! Calculate performance metrics and hot paths from a call tree.
//!
//! Hot paths are the call stacks that spend the most self time, hot lines
//! are the individual source lines with the most accumulated time. These
//! are the primary targets for optimization.

use super::stack_builder::{total_weight, CollapsedStack};
use crate::parser::schema::{HotLine, HotPath};
use crate::tracer::recorder::FrameRecorder;
use log::debug;

/// Calculate hot paths from collapsed stacks
///
/// **Public** - main entry point for metrics calculation
///
/// # Arguments
/// * `stacks` - Collapsed stacks from stack_builder
/// * `total_us` - Total self time across the tree in microseconds
/// * `top_n` - Number of top paths to return (e.g., 10)
///
/// # Returns
/// Vector of hot paths, sorted by self time (descending)
pub fn calculate_hot_paths(stacks: &[CollapsedStack], total_us: u64, top_n: usize) -> Vec<HotPath> {
    debug!("Calculating top {} hot paths from {} stacks", top_n, stacks.len());

    // Stacks are already sorted by weight from stack_builder
    stacks
        .iter()
        .take(top_n)
        .map(|stack| create_hot_path(stack, total_us))
        .collect()
}

/// Create a HotPath from a CollapsedStack
pub fn create_hot_path(stack: &CollapsedStack, total_us: u64) -> HotPath {
    let percentage = if total_us > 0 {
        (stack.weight as f64 / total_us as f64) * 100.0
    } else {
        0.0
    };

    HotPath {
        stack: stack.stack.clone(),
        time_us: stack.weight,
        percentage,
        source_hint: stack.leaf.clone(),
    }
}

/// Collect the most expensive executed lines across the whole tree
///
/// **Public** - line-level report
///
/// Lines that never executed are skipped. Ties are broken by execution count.
pub fn calculate_hot_lines(root: &FrameRecorder, top_n: usize) -> Vec<HotLine> {
    let mut lines = Vec::new();
    collect_lines(root, &mut lines);

    lines.sort_by(|a, b| {
        b.time_spent
            .total_cmp(&a.time_spent)
            .then_with(|| b.execution_count.cmp(&a.execution_count))
    });
    lines.truncate(top_n);

    debug!("Selected {} hot lines", lines.len());
    lines
}

fn collect_lines(node: &FrameRecorder, out: &mut Vec<HotLine>) {
    out.extend(
        node.lines()
            .iter()
            .filter(|(_, record)| record.execution_count > 0)
            .map(|(number, record)| HotLine {
                file: node.file_path().to_string(),
                function: node.function_name().to_string(),
                line: *number,
                source_text: record.source_text.clone(),
                execution_count: record.execution_count,
                time_spent: record.time_spent,
            }),
    );

    for (_, child) in node.iter_children() {
        collect_lines(child, out);
    }
}

/// Calculate self time distribution statistics
///
/// **Public** - provides summary statistics
pub fn calculate_time_distribution(stacks: &[CollapsedStack]) -> TimeDistribution {
    if stacks.is_empty() {
        return TimeDistribution::default();
    }

    let total = total_weight(stacks.iter());
    let count = stacks.len();
    let mean = total / count.max(1) as u64;

    let mut weights: Vec<u64> = stacks.iter().map(|s| s.weight).collect();
    weights.sort_unstable();
    let median = weights[weights.len() / 2];

    // Top 10% of stacks (stacks arrive sorted, heaviest first)
    let top_10_percent_count = (count as f64 * 0.1).ceil() as usize;
    let top_10_percent_us = total_weight(stacks.iter().take(top_10_percent_count));

    TimeDistribution {
        total_us: total,
        stack_count: count,
        mean_us_per_stack: mean,
        median_us_per_stack: median,
        top_10_percent_us,
        top_10_percent_percentage: if total > 0 {
            (top_10_percent_us as f64 / total as f64) * 100.0
        } else {
            0.0
        },
    }
}

/// Self time distribution statistics
///
/// **Public** - returned from calculate_time_distribution
#[derive(Debug, Clone, Default)]
pub struct TimeDistribution {
    /// Total self time across all stacks
    pub total_us: u64,

    /// Number of unique stacks
    pub stack_count: usize,

    pub mean_us_per_stack: u64,
    pub median_us_per_stack: u64,

    /// Self time of the top 10% of stacks
    pub top_10_percent_us: u64,

    /// Percentage of total self time in the top 10%
    pub top_10_percent_percentage: f64,
}

impl TimeDistribution {
    /// Returns true if the top 10% of stacks account for more than 80% of the time
    pub fn is_highly_concentrated(&self) -> bool {
        self.top_10_percent_percentage > 80.0
    }

    /// Get human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Total: {}µs | Stacks: {} | Mean: {}µs | Median: {}µs | Top 10%: {:.1}%",
            self.total_us,
            self.stack_count,
            self.mean_us_per_stack,
            self.median_us_per_stack,
            self.top_10_percent_percentage
        )
    }
}
