//! Replay command implementation.
//!
//! The replay command:
//! 1. Reads and parses a recorded event log
//! 2. Runs the events through the trace processor
//! 3. Builds collapsed stacks
//! 4. Calculates hot paths and hot lines
//! 5. Generates flamegraph
//! 6. Writes output files

use super::models::ReplayArgs;
use crate::aggregator::{
    build_collapsed_stacks, calculate_hot_lines, calculate_hot_paths, calculate_time_distribution,
    merge_small_stacks, CollapsedStack, TimeDistribution,
};
use crate::flamegraph::{generate_flamegraph, generate_text_summary};
use crate::output::{write_profile, write_svg};
use crate::parser::{parse_event_log, to_profile, trace_event_log};
use crate::utils::config::{FLAMEGRAPH_MIN_SHARE, MAX_TOP_PATHS};
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::time::Instant;

/// Execute the replay command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Unreadable or malformed event logs
/// * Structural trace failures (stack underflow, missing origin source)
/// * File write errors
pub fn execute_replay(args: ReplayArgs) -> Result<()> {
    let started = Instant::now();

    info!("Replaying event log: {}", args.input.display());

    // Step 1: Read and parse the event log
    info!("Step 1/6: Parsing event log...");
    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read event log {}", args.input.display()))?;
    let raw_json: serde_json::Value =
        serde_json::from_str(&raw).context("Event log is not valid JSON")?;
    let log = parse_event_log(&raw_json).context("Failed to parse event log")?;

    // Step 2: Trace
    info!("Step 2/6: Tracing {} events...", log.events.len());
    let outcome = trace_event_log(&log).context("Trace failed")?;

    if outcome.hook_displaced {
        warn!("Trace hook was displaced during the trace, results may be partial");
    }
    debug!("Trace stats: {:?}", outcome.stats);

    // Step 3: Build collapsed stacks
    info!("Step 3/6: Building collapsed stacks...");
    let stacks = build_collapsed_stacks(&outcome.root);
    let distribution = calculate_time_distribution(&stacks);
    info!("Time distribution: {}", distribution.summary());
    if distribution.is_highly_concentrated() {
        info!("{}", concentration_note(&distribution));
    }

    // Step 4: Hot paths and lines
    info!("Step 4/6: Calculating top {} hot paths...", args.top_paths);
    let hot_paths = calculate_hot_paths(&stacks, distribution.total_us, args.top_paths);
    let hot_lines = calculate_hot_lines(&outcome.root, args.top_lines);

    for (i, path) in hot_paths.iter().take(3).enumerate() {
        debug!(
            "  {}. {}µs ({:.1}%): {}",
            i + 1,
            path.time_us,
            path.percentage,
            path.stack
        );
    }

    // Step 5: Flamegraph (if requested)
    let svg_content = if args.output_svg.is_some() {
        info!("Step 5/6: Generating flamegraph...");
        let svg_stacks = flamegraph_stacks(&stacks, distribution.total_us);
        let svg = generate_flamegraph(&svg_stacks, args.flamegraph_config.as_ref())
            .context("Failed to generate flamegraph")?;
        Some(svg)
    } else {
        info!("Step 5/6: Skipping flamegraph (not requested)");
        None
    };

    // Step 6: Write outputs
    info!("Step 6/6: Writing output files...");
    let source_name = args.input.display().to_string();
    let profile = to_profile(&source_name, &outcome, hot_paths, hot_lines.clone());

    write_profile(&profile, &args.output_json)
        .with_context(|| format!("Failed to write profile to {}", args.output_json.display()))?;

    if let (Some(svg), Some(svg_path)) = (svg_content, &args.output_svg) {
        write_svg(&svg, svg_path)
            .with_context(|| format!("Failed to write flamegraph to {}", svg_path.display()))?;
    }

    if args.print_summary {
        println!();
        println!(
            "{}",
            generate_text_summary(&stacks, &hot_lines, args.top_paths, distribution.total_us)
        );
        if distribution.is_highly_concentrated() {
            println!("  {}", concentration_note(&distribution));
        }
        println!();
    }

    info!(
        "Replay complete in {:.2}s: {} nodes, {:.6}s total",
        started.elapsed().as_secs_f64(),
        profile.tree.node_count(),
        profile.total_time
    );

    Ok(())
}

/// Stacks drawn in the flamegraph
///
/// Slivers under `FLAMEGRAPH_MIN_SHARE` of the total are folded into a
/// single "other" frame. The JSON profile keeps every stack.
fn flamegraph_stacks(stacks: &[CollapsedStack], total_us: u64) -> Vec<CollapsedStack> {
    let min_weight = (total_us as f64 * FLAMEGRAPH_MIN_SHARE) as u64;
    if min_weight == 0 {
        return stacks.to_vec();
    }
    merge_small_stacks(stacks.to_vec(), min_weight)
}

fn concentration_note(distribution: &TimeDistribution) -> String {
    format!(
        "Top 10% of call paths hold {:.1}% of self time",
        distribution.top_10_percent_percentage
    )
}

/// Validate replay arguments before running
///
/// **Public** - called before execute_replay
pub fn validate_args(args: &ReplayArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        bail!("Input event log path cannot be empty");
    }

    if args.output_json.as_os_str().is_empty() {
        bail!("Output profile path cannot be empty");
    }

    if args.top_paths == 0 {
        bail!("top_paths must be at least 1");
    }

    if args.top_paths > MAX_TOP_PATHS {
        bail!("top_paths cannot exceed {}", MAX_TOP_PATHS);
    }

    if let Some(config) = &args.flamegraph_config {
        if config.width == 0 {
            bail!("Flamegraph width must be greater than zero");
        }
    }

    if let Some(svg) = &args.output_svg {
        if svg == &args.output_json {
            bail!("Flamegraph and profile outputs must be different files");
        }
    }

    Ok(())
}
