use crate::output::read_profile;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::Result;
use std::path::PathBuf;

/// Validate a profile JSON file
pub fn validate_profile_file(file_path: PathBuf) -> Result<()> {
    println!("Validating profile: {}", file_path.display());

    let profile = read_profile(&file_path)?;

    println!("✓ Valid profile JSON");
    println!("  Version: {}", profile.version);
    println!("  Source: {}", profile.source);
    println!("  Total Time: {:.6}s", profile.total_time);
    println!("  Nodes: {}", profile.tree.node_count());
    println!("  Calls Recorded: {}", profile.stats.calls_recorded);
    println!("  Hot Paths: {}", profile.hot_paths.len());
    if profile.hook_displaced {
        println!("  ⚠ Trace hook was displaced during capture");
    }

    Ok(())
}

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("Trace Tree Profile Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string            - Schema version (e.g., '1.0.0')");
        println!("  source: string             - Traced event log");
        println!("  total_time: number         - Inclusive time of the origin frame");
        println!("  stats: object              - Event handling counters");
        println!("  hot_paths: array           - Top self-time call stacks");
        println!("  hot_lines: array           - Top source lines by time");
        println!("  tree: object               - Call tree rooted at the origin frame");
        println!("    event: string            - 'origin' or 'call'");
        println!("    identity: string         - '<file>:<function>'");
        println!("    invocation_count: number - Times entered from this call site");
        println!("    time_spent: number       - Inclusive time");
        println!("    lines: object            - line -> {{execution_count, time_spent, source_text}}");
        println!("    children: object         - origin line -> signature -> node");
        println!("  generated_at: string       - ISO 8601 timestamp");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("Trace Tree v{}", env!("CARGO_PKG_VERSION"));
    println!("Profile Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Line-level call tree profiling from runtime instrumentation events.");
}
