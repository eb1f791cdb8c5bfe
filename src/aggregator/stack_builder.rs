//! Build collapsed stack format from a call tree.
//!
//! Collapsed stacks are the input format for flamegraph generation.
//! Format: "parent;child;grandchild weight"
//!
//! Example: "main;handle;parse 1000"
//! This means: main called handle which called parse, which spent 1000µs
//! outside of its own callees.

use crate::parser::schema::SourceHint;
use crate::tracer::recorder::FrameRecorder;
use crate::utils::config::{MICROS_PER_SECOND, ROOT_FRAME_LABEL};
use log::debug;
use std::collections::HashMap;

/// A single collapsed stack entry
///
/// **Public** - used by flamegraph generator
#[derive(Debug, Clone, PartialEq)]
pub struct CollapsedStack {
    /// Stack trace as semicolon-separated string
    pub stack: String,

    /// Weight (self time in microseconds)
    pub weight: u64,

    /// Location of the leaf frame
    pub leaf: Option<SourceHint>,
}

impl CollapsedStack {
    /// Create a new collapsed stack
    pub fn new(stack: String, weight: u64, leaf: Option<SourceHint>) -> Self {
        Self { stack, weight, leaf }
    }

    /// Render as a `stack weight` line
    pub fn to_line(&self) -> String {
        format!("{} {}", self.stack, self.weight)
    }
}

/// Label used for a frame inside a stack string
///
/// Semicolons and spaces would break the collapsed format, so they are replaced.
pub fn frame_label(recorder: &FrameRecorder) -> String {
    let name = match recorder.module_name() {
        Some(module) if !module.is_empty() => format!("{}.{}", module, recorder.function_name()),
        _ => recorder.function_name().to_string(),
    };

    if name.is_empty() || name == "." {
        return ROOT_FRAME_LABEL.to_string();
    }

    name.replace([';', ' '], "_")
}

/// Self time of a node in microseconds
///
/// Inclusive time minus the children's inclusive time, never negative.
pub fn self_time_us(recorder: &FrameRecorder) -> u64 {
    let self_time = (recorder.time_spent() - recorder.children_time()).max(0.0);
    (self_time * MICROS_PER_SECOND).round() as u64
}

/// Build collapsed stacks from a call tree
///
/// **Public** - main entry point for stack building
///
/// # Algorithm
/// 1. Walk the tree depth-first, keeping the path of frame labels
/// 2. Weight each node by its self time
/// 3. Aggregate by unique stack (sum weights)
/// 4. Sort by weight, heaviest first
pub fn build_collapsed_stacks(root: &FrameRecorder) -> Vec<CollapsedStack> {
    let mut stack_map: HashMap<String, CollapsedStack> = HashMap::new();
    let mut path: Vec<String> = Vec::new();

    collect_stacks(root, &mut path, &mut stack_map);

    let mut stacks: Vec<CollapsedStack> = stack_map.into_values().collect();
    stacks.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.stack.cmp(&b.stack)));

    debug!("Built {} unique collapsed stacks", stacks.len());

    stacks
}

fn collect_stacks(
    node: &FrameRecorder,
    path: &mut Vec<String>,
    stack_map: &mut HashMap<String, CollapsedStack>,
) {
    path.push(frame_label(node));

    let stack = path.join(";");
    let weight = self_time_us(node);
    stack_map
        .entry(stack.clone())
        .and_modify(|existing| existing.weight = existing.weight.saturating_add(weight))
        .or_insert_with(|| {
            CollapsedStack::new(
                stack,
                weight,
                Some(SourceHint {
                    file: node.file_path().to_string(),
                    line: Some(node.start_line()),
                    function: Some(node.function_name().to_string()),
                }),
            )
        });

    for (_, child) in node.iter_children() {
        collect_stacks(child, path, stack_map);
    }

    path.pop();
}

/// Sum of stack weights, saturating at `u64::MAX`
///
/// Self times near the clock's range already saturate individually, so a
/// plain sum of two of them would overflow.
pub fn total_weight<'a>(stacks: impl IntoIterator<Item = &'a CollapsedStack>) -> u64 {
    stacks
        .into_iter()
        .fold(0u64, |total, stack| total.saturating_add(stack.weight))
}

/// Merge stacks below a weight threshold into a single "other" entry
///
/// **Public** - keeps flamegraphs readable for very wide trees
pub fn merge_small_stacks(stacks: Vec<CollapsedStack>, threshold: u64) -> Vec<CollapsedStack> {
    let (mut kept, small): (Vec<_>, Vec<_>) =
        stacks.into_iter().partition(|s| s.weight >= threshold);

    let other_weight = total_weight(&small);
    if other_weight > 0 {
        kept.push(CollapsedStack::new("other".to_string(), other_weight, None));
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::recorder::FrameDescriptor;

    fn recorder(function: &str, module: Option<&str>) -> FrameRecorder {
        FrameRecorder::new(
            FrameDescriptor {
                file_path: "app.py".to_string(),
                function_name: function.to_string(),
                module_name: module.map(str::to_string),
                source_lines: vec!["pass".to_string()],
                start_line: 1,
            },
            None,
        )
    }

    #[test]
    fn test_collapsed_stack_to_line() {
        let stack = CollapsedStack::new("main;execute;parse".to_string(), 1000, None);
        assert_eq!(stack.to_line(), "main;execute;parse 1000");
    }

    #[test]
    fn test_frame_label() {
        assert_eq!(frame_label(&recorder("main", Some("app"))), "app.main");
        assert_eq!(frame_label(&recorder("main", None)), "main");
        assert_eq!(frame_label(&recorder("a b;c", None)), "a_b_c");
        assert_eq!(frame_label(&recorder("", None)), ROOT_FRAME_LABEL);
    }

    #[test]
    fn test_self_time_of_leaf() {
        let mut leaf = recorder("g", None);
        leaf.add_time(0.25);
        assert_eq!(self_time_us(&leaf), 250_000);
    }

    #[test]
    fn test_build_collapsed_stacks_single_node() {
        let mut root = recorder("main", None);
        root.add_time(1.0);

        let stacks = build_collapsed_stacks(&root);
        assert_eq!(stacks.len(), 1);
        assert_eq!(stacks[0].stack, "main");
        assert_eq!(stacks[0].weight, 1_000_000);
        assert_eq!(stacks[0].leaf.as_ref().unwrap().line, Some(1));
    }

    #[test]
    fn test_merge_small_stacks() {
        let stacks = vec![
            CollapsedStack::new("big_stack".to_string(), 1000, None),
            CollapsedStack::new("small_stack_1".to_string(), 10, None),
            CollapsedStack::new("small_stack_2".to_string(), 15, None),
            CollapsedStack::new("medium_stack".to_string(), 500, None),
        ];

        let merged = merge_small_stacks(stacks, 100);

        assert_eq!(merged.len(), 3);
        let other = merged.iter().find(|s| s.stack == "other").unwrap();
        assert_eq!(other.weight, 25);
    }
}
