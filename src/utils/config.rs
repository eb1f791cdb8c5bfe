//! Configuration and constants for the CLI.

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Event log versions accepted by the replay parser
pub const SUPPORTED_LOG_VERSIONS: &[&str] = &["1.0.0", "1.0"];

// Timestamps and time_spent values are seconds; stacks are weighted in microseconds
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

pub const DEFAULT_TOP_PATHS: usize = 20;
pub const MAX_TOP_PATHS: usize = 1000;
pub const DEFAULT_TOP_LINES: usize = 10;

/// Stacks below this share of total self time are drawn as one "other" frame
pub const FLAMEGRAPH_MIN_SHARE: f64 = 0.001;

/// Frame label used for the origin frame when its function name is empty
pub const ROOT_FRAME_LABEL: &str = "<origin>";
