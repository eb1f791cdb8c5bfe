use crate::flamegraph::FlamegraphConfig;
use crate::utils::config::{DEFAULT_TOP_LINES, DEFAULT_TOP_PATHS};
use std::path::PathBuf;

/// Arguments for the replay command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct ReplayArgs {
    /// Recorded event log to replay
    pub input: PathBuf,

    /// Output path for JSON profile
    pub output_json: PathBuf,

    /// Output path for SVG flamegraph (optional)
    pub output_svg: Option<PathBuf>,

    /// Number of top hot paths to include in profile
    pub top_paths: usize,

    /// Number of hot lines to include in profile
    pub top_lines: usize,

    /// Flamegraph configuration
    pub flamegraph_config: Option<FlamegraphConfig>,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for ReplayArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("events.json"),
            output_json: PathBuf::from("profile.json"),
            output_svg: None,
            top_paths: DEFAULT_TOP_PATHS,
            top_lines: DEFAULT_TOP_LINES,
            flamegraph_config: None,
            print_summary: false,
        }
    }
}
