//! Output JSON schema definitions for profile data.
//!
//! This module defines the structure of JSON files we write to disk.
//! Schema is versioned to allow future evolution. Event tags (`origin`,
//! `call`, `line`) are attached here and are not part of the tracer state.

use crate::tracer::event::LineNo;
use crate::tracer::processor::{TraceOutcome, TraceStats};
use crate::tracer::recorder::FrameRecorder;
use crate::utils::config::SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level profile structure written to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Schema version for compatibility checking
    pub version: String,

    /// Name of the traced input (event log path or label)
    pub source: String,

    /// Inclusive time of the origin frame
    pub total_time: f64,

    /// How the event stream was handled
    pub stats: TraceStats,

    /// The hook was replaced during the trace; numbers may be incomplete
    #[serde(default)]
    pub hook_displaced: bool,

    /// Top hot paths (ranked by self time)
    pub hot_paths: Vec<HotPath>,

    /// Most expensive source lines
    #[serde(default)]
    pub hot_lines: Vec<HotLine>,

    /// The call tree
    pub tree: CallNode,

    /// Timestamp when profile was generated
    pub generated_at: String,
}

/// Kind tag attached to serialized nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeEvent {
    Origin,
    Call,
    Line,
}

/// Serialized frame recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallNode {
    pub event: NodeEvent,
    pub identity: String,
    pub file_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,

    pub function_name: String,
    pub start_line: LineNo,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_line: Option<LineNo>,

    pub invocation_count: u64,
    pub time_spent: f64,
    pub lines: BTreeMap<LineNo, LineNode>,

    /// origin line -> callee signature -> child
    #[serde(default)]
    pub children: BTreeMap<LineNo, BTreeMap<String, CallNode>>,
}

/// Serialized per-line counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineNode {
    pub event: NodeEvent,
    pub source_text: String,
    pub execution_count: u64,
    pub time_spent: f64,
}

impl CallNode {
    /// Convert a recorder subtree
    pub fn from_recorder(recorder: &FrameRecorder, event: NodeEvent) -> Self {
        let lines = recorder
            .lines()
            .iter()
            .map(|(number, line)| {
                (
                    *number,
                    LineNode {
                        event: NodeEvent::Line,
                        source_text: line.source_text.clone(),
                        execution_count: line.execution_count,
                        time_spent: line.time_spent,
                    },
                )
            })
            .collect();

        let children = recorder
            .children()
            .iter()
            .map(|(origin_line, by_sig)| {
                let nodes = by_sig
                    .iter()
                    .map(|(sig, child)| {
                        (sig.to_string(), CallNode::from_recorder(child, NodeEvent::Call))
                    })
                    .collect();
                (*origin_line, nodes)
            })
            .collect();

        Self {
            event,
            identity: recorder.identity().to_string(),
            file_path: recorder.file_path().to_string(),
            module_name: recorder.module_name().map(str::to_string),
            function_name: recorder.function_name().to_string(),
            start_line: recorder.start_line(),
            caller_line: recorder.caller_line(),
            invocation_count: recorder.invocation_count(),
            time_spent: recorder.time_spent(),
            lines,
            children,
        }
    }

    /// Count every node in this subtree, including self
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .values()
            .flat_map(|by_sig| by_sig.values())
            .map(CallNode::node_count)
            .sum::<usize>()
    }
}

/// A hot path in the execution (stack trace with self time)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotPath {
    /// Collapsed stack representation (e.g., "main;handle;parse")
    pub stack: String,

    /// Self time of the leaf frame in microseconds
    pub time_us: u64,

    /// Percentage of total self time
    pub percentage: f64,

    /// Location of the leaf frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_hint: Option<SourceHint>,
}

/// Source code location hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHint {
    pub file: String,
    pub line: Option<u32>,
    pub function: Option<String>,
}

/// A single source line ranked by accumulated time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotLine {
    pub file: String,
    pub function: String,
    pub line: LineNo,
    pub source_text: String,
    pub execution_count: u64,
    pub time_spent: f64,
}

/// Convert a finished trace to the output profile format
///
/// **Public** - used by commands to create final output
pub fn to_profile(
    source: &str,
    outcome: &TraceOutcome,
    hot_paths: Vec<HotPath>,
    hot_lines: Vec<HotLine>,
) -> Profile {
    use chrono::Utc;

    Profile {
        version: SCHEMA_VERSION.to_string(),
        source: source.to_string(),
        total_time: outcome.root.time_spent(),
        stats: outcome.stats,
        hook_displaced: outcome.hook_displaced,
        hot_paths,
        hot_lines,
        tree: CallNode::from_recorder(&outcome.root, NodeEvent::Origin),
        generated_at: Utc::now().to_rfc3339(),
    }
}
