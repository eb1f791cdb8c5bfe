//! Recorded event log parser.
//!
//! Parses a JSON event log captured from a host runtime into trace events
//! plus the code table used to answer source lookups during replay.

use crate::tracer::event::{EventKind, FrameId, LineNo, TraceEvent};
use crate::tracer::hook::SourceLocator;
use crate::tracer::recorder::{CallSignature, FrameDescriptor};
use crate::utils::config::SUPPORTED_LOG_VERSIONS;
use crate::utils::error::{ParseError, TraceError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw event log as written by a capture hook
#[derive(Debug, Clone, Deserialize)]
struct RawEventLog {
    version: String,

    origin: RawOrigin,

    /// Trace start; defaults to the first event timestamp
    #[serde(default)]
    start_time: Option<f64>,

    #[serde(default)]
    code: HashMap<String, CodeEntry>,

    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawOrigin {
    frame: FrameId,
    code: String,
}

/// Static information about one function, keyed by code key in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntry {
    #[serde(alias = "filename")]
    pub file_path: String,

    #[serde(alias = "function")]
    pub function_name: String,

    #[serde(default, alias = "module")]
    pub module_name: Option<String>,

    #[serde(alias = "lineno")]
    pub start_line: LineNo,

    /// Missing when the capture could not read the source
    #[serde(default)]
    pub source_lines: Option<Vec<String>>,
}

/// Raw execution event
#[derive(Debug, Clone, Deserialize)]
struct RawEvent {
    #[serde(alias = "kind")]
    event: EventKind,

    frame: FrameId,

    /// Code key; required on the first event of a frame
    #[serde(default)]
    code: Option<String>,

    #[serde(alias = "lineno")]
    line: LineNo,

    #[serde(default)]
    caller: Option<FrameId>,

    #[serde(default)]
    caller_line: Option<LineNo>,

    timestamp: f64,
}

/// Source lookups answered from a recorded code table
#[derive(Debug, Clone, Default)]
pub struct RecordedSources {
    code: HashMap<String, CodeEntry>,
    frames: HashMap<FrameId, String>,
}

impl RecordedSources {
    pub fn new(code: HashMap<String, CodeEntry>) -> Self {
        Self {
            code,
            frames: HashMap::new(),
        }
    }

    /// Bind a frame to a code key
    ///
    /// Returns false if the frame is already bound to a different key.
    pub fn bind(&mut self, frame: FrameId, code_key: &str) -> bool {
        match self.frames.get(&frame) {
            Some(existing) => existing == code_key,
            None => {
                self.frames.insert(frame, code_key.to_string());
                true
            }
        }
    }

    pub fn code_count(&self) -> usize {
        self.code.len()
    }

    fn entry(&self, frame: FrameId) -> Result<&CodeEntry, TraceError> {
        let key = self
            .frames
            .get(&frame)
            .ok_or_else(|| TraceError::SourceUnavailable {
                frame,
                reason: "frame has no code key".to_string(),
            })?;

        self.code
            .get(key)
            .ok_or_else(|| TraceError::SourceUnavailable {
                frame,
                reason: format!("unknown code key '{}'", key),
            })
    }
}

impl SourceLocator for RecordedSources {
    fn signature(&self, frame: FrameId) -> Result<CallSignature, TraceError> {
        let entry = self.entry(frame)?;
        Ok(CallSignature::new(&entry.file_path, &entry.function_name))
    }

    fn describe(&self, frame: FrameId) -> Result<FrameDescriptor, TraceError> {
        let entry = self.entry(frame)?;
        let source_lines = entry
            .source_lines
            .clone()
            .ok_or_else(|| TraceError::SourceUnavailable {
                frame,
                reason: format!("no source recorded for {}", entry.function_name),
            })?;

        Ok(FrameDescriptor {
            file_path: entry.file_path.clone(),
            function_name: entry.function_name.clone(),
            module_name: entry.module_name.clone(),
            source_lines,
            start_line: entry.start_line,
        })
    }
}

/// Parsed event log (internal representation)
#[derive(Debug, Clone)]
pub struct EventLog {
    pub version: String,
    pub origin: FrameId,
    pub start_time: f64,
    pub sources: RecordedSources,
    pub events: Vec<TraceEvent>,
}

/// Parse a recorded event log
///
/// **Public** - main entry point for replay input
///
/// # Errors
/// * `ParseError::JsonError` - document does not match the log structure
/// * `ParseError::UnsupportedVersion` - unknown log version
/// * `ParseError::UnknownCode` - the origin refers to a missing code key
/// * `ParseError::InvalidFormat` - inconsistent frames or timestamps
pub fn parse_event_log(raw: &serde_json::Value) -> Result<EventLog, ParseError> {
    validate_log_format(raw)?;

    let raw_log: RawEventLog = serde_json::from_value(raw.clone())?;

    if !SUPPORTED_LOG_VERSIONS.contains(&raw_log.version.as_str()) {
        return Err(ParseError::UnsupportedVersion(raw_log.version));
    }

    if !raw_log.code.contains_key(&raw_log.origin.code) {
        return Err(ParseError::UnknownCode(raw_log.origin.code));
    }

    debug!(
        "Parsing event log: {} code entries, {} events",
        raw_log.code.len(),
        raw_log.events.len()
    );

    let mut sources = RecordedSources::new(raw_log.code);
    sources.bind(raw_log.origin.frame, &raw_log.origin.code);

    let events = convert_events(&raw_log.events, &mut sources)?;

    let start_time = raw_log
        .start_time
        .or_else(|| events.first().map(|e| e.timestamp))
        .unwrap_or(0.0);

    if let Some(first) = events.first() {
        if first.timestamp < start_time {
            warn!(
                "First event at {} precedes start time {}, early deltas clamp to zero",
                first.timestamp, start_time
            );
        }
    }

    info!("Parsed event log with {} events", events.len());

    Ok(EventLog {
        version: raw_log.version,
        origin: raw_log.origin.frame,
        start_time,
        sources,
        events,
    })
}

/// Check the top-level shape before full deserialization
///
/// **Public** - lets callers reject obviously wrong input early
pub fn validate_log_format(raw: &serde_json::Value) -> Result<(), ParseError> {
    let obj = raw.as_object().ok_or_else(|| {
        ParseError::InvalidFormat("Event log must be a JSON object".to_string())
    })?;

    for field in ["version", "origin", "events"] {
        if !obj.contains_key(field) {
            return Err(ParseError::InvalidFormat(format!(
                "Missing required field '{}'",
                field
            )));
        }
    }

    if !obj["events"].is_array() {
        return Err(ParseError::InvalidFormat(
            "'events' must be an array".to_string(),
        ));
    }

    Ok(())
}

/// Convert raw events, binding frames to code keys along the way
///
/// **Private** - internal helper for parse_event_log
fn convert_events(
    raw_events: &[RawEvent],
    sources: &mut RecordedSources,
) -> Result<Vec<TraceEvent>, ParseError> {
    let mut events = Vec::with_capacity(raw_events.len());
    let mut last_timestamp = f64::NEG_INFINITY;

    for (index, raw) in raw_events.iter().enumerate() {
        if !raw.timestamp.is_finite() || raw.timestamp < last_timestamp {
            return Err(ParseError::InvalidFormat(format!(
                "Event {} has non-monotonic timestamp {}",
                index, raw.timestamp
            )));
        }
        last_timestamp = raw.timestamp;

        if let Some(code_key) = &raw.code {
            if !sources.bind(raw.frame, code_key) {
                return Err(ParseError::InvalidFormat(format!(
                    "Event {} rebinds frame {} to code '{}'",
                    index, raw.frame, code_key
                )));
            }
        } else if raw.event == EventKind::Call {
            debug!("Call event {} into {} carries no code key", index, raw.frame);
        }

        events.push(TraceEvent {
            kind: raw.event,
            frame: raw.frame,
            line: raw.line,
            caller: raw.caller,
            caller_line: raw.caller_line,
            timestamp: raw.timestamp,
        });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_log() -> serde_json::Value {
        json!({
            "version": "1.0.0",
            "origin": { "frame": 1, "code": "main" },
            "code": {
                "main": {
                    "file_path": "app.py",
                    "function_name": "main",
                    "module_name": "app",
                    "start_line": 1,
                    "source_lines": ["def main():", "    g()"]
                },
                "g": {
                    "filename": "app.py",
                    "function": "g",
                    "lineno": 10
                }
            },
            "events": [
                { "event": "call", "frame": 2, "code": "g", "line": 10, "caller": 1, "caller_line": 2, "timestamp": 0.5 },
                { "event": "return", "frame": 2, "line": 10, "timestamp": 0.75 }
            ]
        })
    }

    #[test]
    fn test_parse_event_log() {
        let log = parse_event_log(&sample_log()).unwrap();

        assert_eq!(log.origin, FrameId(1));
        assert_eq!(log.events.len(), 2);
        assert_eq!(log.events[0].kind, EventKind::Call);
        assert_eq!(log.events[0].caller_line, Some(2));
        assert_eq!(log.start_time, 0.5);
        assert_eq!(log.sources.code_count(), 2);
    }

    #[test]
    fn test_recorded_sources_lookup() {
        let log = parse_event_log(&sample_log()).unwrap();

        let root = log.sources.describe(FrameId(1)).unwrap();
        assert_eq!(root.source_lines.len(), 2);
        assert_eq!(log.sources.signature(FrameId(2)).unwrap().as_str(), "app.py:g");

        // g has no recorded source
        assert!(matches!(
            log.sources.describe(FrameId(2)),
            Err(TraceError::SourceUnavailable { .. })
        ));
        assert!(log.sources.signature(FrameId(7)).is_err());
    }

    #[test]
    fn test_unsupported_version() {
        let mut raw = sample_log();
        raw["version"] = json!("9.9");
        assert!(matches!(
            parse_event_log(&raw),
            Err(ParseError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_unknown_origin_code() {
        let mut raw = sample_log();
        raw["origin"]["code"] = json!("missing");
        assert!(matches!(parse_event_log(&raw), Err(ParseError::UnknownCode(_))));
    }

    #[test]
    fn test_non_monotonic_timestamps_rejected() {
        let mut raw = sample_log();
        raw["events"][1]["timestamp"] = json!(0.1);
        assert!(matches!(
            parse_event_log(&raw),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_frame_rebinding_rejected() {
        let mut raw = sample_log();
        raw["events"][1]["code"] = json!("main");
        assert!(matches!(
            parse_event_log(&raw),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_validate_log_format() {
        assert!(validate_log_format(&json!([])).is_err());
        assert!(validate_log_format(&json!({ "version": "1.0.0" })).is_err());
        assert!(validate_log_format(&json!({
            "version": "1.0.0", "origin": {}, "events": {}
        }))
        .is_err());
        assert!(validate_log_format(&sample_log()).is_ok());
    }
}
