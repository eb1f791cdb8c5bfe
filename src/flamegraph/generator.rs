//! SVG flamegraph generation from collapsed stacks.
//!
//! Hand-rolled SVG so that:
//! - Frames are colored by their share of total time (hotter = redder)
//! - Layout is inverted (Root at bottom)
//! - Tooltips carry microseconds and percentages

use crate::aggregator::stack_builder::CollapsedStack;
use crate::parser::schema::HotLine;
use crate::utils::error::FlamegraphError;
use log::info;
use std::collections::BTreeMap;

/// Flamegraph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    pub width: usize,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "Call Tree Profile".to_string(),
            width: 1200,
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

/// Frame in the merged stack tree; `total` includes every descendant
struct Node {
    name: String,
    total: u64,
    children: BTreeMap<String, Node>,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            total: 0,
            children: BTreeMap::new(),
        }
    }

    fn add_stack<'a>(&mut self, frames: impl IntoIterator<Item = &'a str>, weight: u64) {
        let mut node = self;
        node.total = node.total.saturating_add(weight);
        for frame in frames {
            node = node
                .children
                .entry(frame.to_string())
                .or_insert_with(|| Node::new(frame));
            node.total = node.total.saturating_add(weight);
        }
    }

    fn depth(&self) -> usize {
        self.children
            .values()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Generate SVG flamegraph from collapsed stacks
pub fn generate_flamegraph(
    stacks: &[CollapsedStack],
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    if stacks.is_empty() {
        return Err(FlamegraphError::EmptyStacks);
    }

    let config = config.cloned().unwrap_or_default();
    info!("Generating flamegraph with {} stacks", stacks.len());

    let mut root = Node::new("all");
    for stack in stacks {
        root.add_stack(stack.stack.split(';'), stack.weight);
    }

    let max_depth = root.depth();

    // 2. Render SVG
    let mut svg_content = String::new();
    let width = config.width;
    let height_per_level = 20;
    let graph_height = (max_depth + 1) * height_per_level;
    let legend_height = 80;
    let total_height = graph_height + legend_height;

    svg_content.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        width, total_height, width, total_height
    ));

    svg_content.push_str(
        r#"<style>.func { font: 12px sans-serif; } .func:hover { stroke: black; stroke-width: 1; cursor: pointer; opacity: 0.9; }</style>"#,
    );

    svg_content.push_str(&format!(
        r#"<text x="{}" y="20" font-size="16" text-anchor="middle" font-weight="bold">{}</text>"#,
        width / 2,
        escape_xml(&config.title)
    ));

    // Render Nodes (Inverted: Root at bottom)
    let layout = Layout {
        total: root.total.max(1),
        height_per_level,
        graph_height,
    };
    render_node(&root, 0, 0.0, width as f64, &mut svg_content, &layout);

    render_legend(&mut svg_content, graph_height);

    svg_content.push_str("</svg>");

    info!("Flamegraph generated successfully ({} bytes)", svg_content.len());
    Ok(svg_content)
}

struct Layout {
    total: u64,
    height_per_level: usize,
    graph_height: usize,
}

/// Escape text for inclusion in SVG markup
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

static HEAT_LEVELS: [(f64, &str, &str, &str); 4] = [
    (25.0, "Hot (>25%)", "rgb(220, 20, 60)", "\x1b[31;1m"),
    (10.0, "Warm (>10%)", "rgb(255, 140, 0)", "\x1b[33m"),
    (1.0, "Mild (>1%)", "rgb(255, 200, 60)", "\x1b[32m"),
    (0.0, "Cold", "rgb(169, 169, 169)", "\x1b[90m"),
];

fn heat_level(percentage: f64) -> &'static (f64, &'static str, &'static str, &'static str) {
    HEAT_LEVELS
        .iter()
        .find(|(threshold, ..)| percentage > *threshold)
        .unwrap_or(&HEAT_LEVELS[HEAT_LEVELS.len() - 1])
}

fn get_node_color(percentage: f64) -> &'static str {
    heat_level(percentage).2
}

fn get_ansi_color(percentage: f64) -> &'static str {
    heat_level(percentage).3
}

fn render_node(node: &Node, level: usize, x: f64, w: f64, out: &mut String, layout: &Layout) {
    if w < 0.5 {
        return;
    } // Don't render invisible blocks

    let h = layout.height_per_level;
    let percentage = (node.total as f64 / layout.total as f64) * 100.0;
    let color = if level == 0 {
        "rgb(100, 149, 237)"
    } else {
        get_node_color(percentage)
    };

    // Y position (Inverted: Graph Bottom - (Level * Height)), 30px title margin
    let y = layout.graph_height - ((level + 1) * h) + 30;
    let name = escape_xml(&node.name);

    out.push_str(&format!(
        r#"<rect x="{:.2}" y="{}" width="{:.2}" height="{}" fill="{}" class="func"><title>{} ({} µs, {:.2}%)</title></rect>"#,
        x, y, w, h, color, name, node.total, percentage
    ));

    if w > 35.0 {
        let char_width = 7.0;
        let max_chars = (w / char_width) as usize;
        let char_count = node.name.chars().count();
        let display_name = if char_count > max_chars && max_chars > 3 {
            let truncated: String = node.name.chars().take(max_chars - 3).collect();
            format!("{}...", truncated)
        } else {
            node.name.clone()
        };

        if !display_name.is_empty() {
            out.push_str(&format!(
                r#"<text x="{:.2}" y="{}" dx="4" dy="14" font-size="12" fill="white" pointer-events="none">{}</text>"#,
                x,
                y,
                escape_xml(&display_name)
            ));
        }
    }

    if node.total == 0 {
        return;
    }

    // Heaviest callee leftmost; BTreeMap order breaks ties by name
    let mut callees: Vec<&Node> = node.children.values().collect();
    callees.sort_by(|a, b| b.total.cmp(&a.total));

    let mut offset = x;
    for callee in callees {
        let callee_w = w * callee.total as f64 / node.total as f64;
        render_node(callee, level + 1, offset, callee_w, out, layout);
        offset += callee_w;
    }
}

fn render_legend(out: &mut String, graph_height: usize) {
    let legend_y = graph_height + 50;

    out.push_str(&format!(
        r#"<text x="10" y="{}" font-size="14" font-weight="bold">Legend:</text>"#,
        legend_y
    ));

    for (i, (_, label, color, _)) in HEAT_LEVELS.iter().enumerate() {
        let x = 80 + (i * 120);
        out.push_str(&format!(
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}" rx="2"/>"#,
            x,
            legend_y - 12,
            color
        ));
        out.push_str(&format!(
            r#"<text x="{}" y="{}" font-size="12">{}</text>"#,
            x + 20,
            legend_y,
            escape_xml(label)
        ));
    }
}

/// Create a text summary with percentages and table formatting
pub fn generate_text_summary(
    stacks: &[CollapsedStack],
    hot_lines: &[HotLine],
    max_lines: usize,
    total_us: u64,
) -> String {
    let mut lines = Vec::new();
    let total = total_us.max(1);
    let reset = "\x1b[0m";

    lines.push("  🚀 HOT CALL PATHS".to_string());
    lines.push("  ┏━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┳━━━━━━━━━━━━━━┳━━━━━━━━━┓".to_string());
    lines.push(format!(
        "  ┃ {:<42} ┃ {:^12} ┃ {:^7} ┃",
        "Call Stack (Hottest First)", "SELF µs", "%"
    ));
    lines.push("  ┣━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━╋━━━━━━━━━━━━━━╋━━━━━━━━━┫".to_string());

    for stack in stacks.iter().take(max_lines) {
        let percentage = (stack.weight as f64 / total as f64) * 100.0;
        let color = get_ansi_color(percentage);

        lines.push(format!(
            "  ┃ {}{:<42}{} ┃ {:>12} ┃ {:>6.1}% ┃",
            color,
            truncate_left(&stack.stack, 42),
            reset,
            stack.weight,
            percentage
        ));
    }

    lines.push("  ┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┻━━━━━━━━━━━━━━┻━━━━━━━━━┛".to_string());

    if stacks.len() > max_lines {
        lines.push(format!(
            "   (Showing top {} of {} unique paths)",
            max_lines,
            stacks.len()
        ));
    }

    let by_function = self_time_by_function(stacks);
    if !by_function.is_empty() {
        lines.push(String::new());
        lines.push("  ⏱  SELF TIME BY FUNCTION".to_string());
        for (label, weight) in by_function.iter().take(5) {
            let percentage = (*weight as f64 / total as f64) * 100.0;
            let color = get_ansi_color(percentage);
            lines.push(format!(
                "  {:<24} {}{:<50}{} {:>5.1}%",
                truncate_left(label, 24),
                color,
                "▇".repeat((percentage / 2.0).round() as usize),
                reset,
                percentage
            ));
        }
    }

    if !hot_lines.is_empty() {
        lines.push(String::new());
        lines.push("  📍 HOT LINES".to_string());
        for hot in hot_lines {
            lines.push(format!(
                "  {:>6}x {:>12.6}s  {}:{} ({})  {}",
                hot.execution_count,
                hot.time_spent,
                hot.file,
                hot.line,
                hot.function,
                hot.source_text.trim()
            ));
        }
    }

    lines.join("\n")
}

/// Sum stack weights by leaf frame, heaviest first
///
/// A function reached through several call paths shows up once here.
fn self_time_by_function(stacks: &[CollapsedStack]) -> Vec<(String, u64)> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for stack in stacks {
        let leaf = stack.stack.rsplit(';').next().unwrap_or(&stack.stack);
        let total = totals.entry(leaf).or_default();
        *total = total.saturating_add(stack.weight);
    }

    let mut sorted: Vec<(String, u64)> = totals
        .into_iter()
        .filter(|(_, weight)| *weight > 0)
        .map(|(label, weight)| (label.to_string(), weight))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
}

/// Keep the tail of a string, which is the most specific part of a stack
fn truncate_left(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - (max - 3)).collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacks() -> Vec<CollapsedStack> {
        vec![
            CollapsedStack::new("<origin>;app.handle;app.parse".to_string(), 6000, None),
            CollapsedStack::new("<origin>;app.handle".to_string(), 3000, None),
            CollapsedStack::new("<origin>".to_string(), 1000, None),
        ]
    }

    #[test]
    fn test_generate_flamegraph_empty() {
        assert!(matches!(
            generate_flamegraph(&[], None),
            Err(FlamegraphError::EmptyStacks)
        ));
    }

    #[test]
    fn test_generate_flamegraph_escapes_names() {
        let config = FlamegraphConfig::new().with_title("a < b");
        let svg = generate_flamegraph(&stacks(), Some(&config)).unwrap();

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("a &lt; b"));
        assert!(svg.contains("&lt;origin&gt;"));
        assert!(!svg.contains("<origin>"));
    }

    #[test]
    fn test_heat_levels() {
        assert_eq!(get_node_color(60.0), "rgb(220, 20, 60)");
        assert_eq!(get_node_color(15.0), "rgb(255, 140, 0)");
        assert_eq!(get_node_color(0.0), "rgb(169, 169, 169)");
    }

    #[test]
    fn test_truncate_left() {
        assert_eq!(truncate_left("short", 10), "short");
        assert_eq!(truncate_left("abcdefghijkl", 8), "...hijkl");
    }

    #[test]
    fn test_text_summary_mentions_paths() {
        let summary = generate_text_summary(&stacks(), &[], 2, 10_000);
        assert!(summary.contains("HOT CALL PATHS"));
        assert!(summary.contains("(Showing top 2 of 3 unique paths)"));
        assert!(!summary.contains("HOT LINES"));
    }

    #[test]
    fn test_self_time_by_function_merges_call_paths() {
        let stacks = vec![
            CollapsedStack::new("<origin>;a;parse".to_string(), 400, None),
            CollapsedStack::new("<origin>;b;parse".to_string(), 300, None),
            CollapsedStack::new("<origin>;a".to_string(), 500, None),
            CollapsedStack::new("<origin>".to_string(), 0, None),
        ];

        assert_eq!(
            self_time_by_function(&stacks),
            vec![("parse".to_string(), 700), ("a".to_string(), 500)]
        );
    }
}
