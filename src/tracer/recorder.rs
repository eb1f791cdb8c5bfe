//! Per-frame call tree nodes.
//!
//! A `FrameRecorder` is created the first time a function is entered from a
//! given call site. It owns its per-line counters and its children, so the
//! finished tree is a strict hierarchy rooted at the origin frame.

use super::event::LineNo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a callee: `"<file>:<function>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallSignature(String);

impl CallSignature {
    pub fn new(file_path: &str, function_name: &str) -> Self {
        Self(format!("{}:{}", file_path, function_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static description of a function's source, supplied by a source locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub file_path: String,
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    /// Lines of the function body, in order, starting at `start_line`
    pub source_lines: Vec<String>,
    pub start_line: LineNo,
}

impl FrameDescriptor {
    pub fn signature(&self) -> CallSignature {
        CallSignature::new(&self.file_path, &self.function_name)
    }
}

/// Counters for one source line
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub execution_count: u64,
    pub time_spent: f64,
    pub source_text: String,
}

/// Children keyed by origin line, then by callee signature
pub type ChildMap = BTreeMap<LineNo, BTreeMap<CallSignature, FrameRecorder>>;

/// One node of the call tree
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecorder {
    identity: CallSignature,
    file_path: String,
    module_name: Option<String>,
    function_name: String,
    start_line: LineNo,
    invocation_count: u64,
    time_spent: f64,
    lines: BTreeMap<LineNo, LineRecord>,
    children: ChildMap,
    caller_line: Option<LineNo>,
}

impl FrameRecorder {
    /// Build a recorder with every line of the descriptor's span registered
    ///
    /// Lines start at zero so unexecuted lines still show up in reports.
    pub fn new(descriptor: FrameDescriptor, caller_line: Option<LineNo>) -> Self {
        let identity = descriptor.signature();

        let lines = descriptor
            .source_lines
            .into_iter()
            .enumerate()
            .map(|(offset, text)| {
                let number = descriptor.start_line + offset as LineNo;
                let source_text = text.trim_end_matches(['\n', '\r']).to_string();
                (
                    number,
                    LineRecord {
                        execution_count: 0,
                        time_spent: 0.0,
                        source_text,
                    },
                )
            })
            .collect();

        Self {
            identity,
            file_path: descriptor.file_path,
            module_name: descriptor.module_name,
            function_name: descriptor.function_name,
            start_line: descriptor.start_line,
            invocation_count: 0,
            time_spent: 0.0,
            lines,
            children: BTreeMap::new(),
            caller_line,
        }
    }

    pub fn identity(&self) -> &CallSignature {
        &self.identity
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn start_line(&self) -> LineNo {
        self.start_line
    }

    pub fn invocation_count(&self) -> u64 {
        self.invocation_count
    }

    /// Inclusive time, accumulated against the trace start
    pub fn time_spent(&self) -> f64 {
        self.time_spent
    }

    pub fn lines(&self) -> &BTreeMap<LineNo, LineRecord> {
        &self.lines
    }

    pub fn children(&self) -> &ChildMap {
        &self.children
    }

    pub fn caller_line(&self) -> Option<LineNo> {
        self.caller_line
    }

    pub fn has_line(&self, line: LineNo) -> bool {
        self.lines.contains_key(&line)
    }

    pub fn child(&self, origin_line: LineNo, signature: &CallSignature) -> Option<&FrameRecorder> {
        self.children.get(&origin_line)?.get(signature)
    }

    /// Iterate over all direct children with their origin line
    pub fn iter_children(&self) -> impl Iterator<Item = (LineNo, &FrameRecorder)> {
        self.children
            .iter()
            .flat_map(|(line, by_sig)| by_sig.values().map(move |child| (*line, child)))
    }

    pub fn child_count(&self) -> usize {
        self.children.values().map(|by_sig| by_sig.len()).sum()
    }

    /// Sum of the direct children's inclusive time
    pub fn children_time(&self) -> f64 {
        self.iter_children().map(|(_, child)| child.time_spent).sum()
    }

    pub(crate) fn record_invocation(&mut self) {
        self.invocation_count += 1;
    }

    pub(crate) fn add_time(&mut self, delta: f64) {
        self.time_spent += delta.max(0.0);
    }

    /// Count one execution of `line`; returns false if the line is outside the span
    pub(crate) fn record_line(&mut self, line: LineNo, delta: f64) -> bool {
        match self.lines.get_mut(&line) {
            Some(record) => {
                record.execution_count += 1;
                record.time_spent += delta.max(0.0);
                true
            }
            None => false,
        }
    }

    /// Detach a child so it can live on the active stack while it runs
    pub(crate) fn take_child(
        &mut self,
        origin_line: LineNo,
        signature: &CallSignature,
    ) -> Option<FrameRecorder> {
        let by_sig = self.children.get_mut(&origin_line)?;
        let child = by_sig.remove(signature);
        if by_sig.is_empty() {
            self.children.remove(&origin_line);
        }
        child
    }

    /// Reattach a child under its (origin line, signature) slot
    pub(crate) fn insert_child(
        &mut self,
        origin_line: LineNo,
        signature: CallSignature,
        child: FrameRecorder,
    ) {
        self.children
            .entry(origin_line)
            .or_default()
            .insert(signature, child);
    }
}
