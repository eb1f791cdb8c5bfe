//! Replay of a recorded event log through the trace processor.

use super::event_log::EventLog;
use crate::tracer::event::TraceEvent;
use crate::tracer::hook::{EventSource, HookToken, SourceLocator};
use crate::tracer::processor::{TraceOutcome, TraceProcessor};
use crate::utils::error::TraceError;
use log::{debug, warn};

/// Event source backed by a recorded event list
///
/// The clock follows the replayed timestamps, so `now()` before the first
/// event is the recorded start time.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    clock: f64,
    next_token: u64,
    active: Option<HookToken>,
}

impl ReplaySource {
    pub fn new(start_time: f64) -> Self {
        Self {
            clock: start_time,
            next_token: 0,
            active: None,
        }
    }

    /// Deliver events to the processor while its hook is installed
    ///
    /// Returns the number of events delivered.
    pub fn replay<L: SourceLocator>(
        &mut self,
        processor: &mut TraceProcessor<L>,
        events: &[TraceEvent],
    ) -> usize {
        if self.active.is_none() {
            warn!("Replay requested with no hook installed, nothing delivered");
            return 0;
        }

        for event in events {
            self.clock = self.clock.max(event.timestamp);
            processor.process(event);
        }

        debug!("Replayed {} events", events.len());
        events.len()
    }
}

impl EventSource for ReplaySource {
    fn install_hook(&mut self) -> HookToken {
        self.next_token += 1;
        let token = HookToken(self.next_token);
        self.active = Some(token);
        token
    }

    fn uninstall_hook(&mut self) {
        self.active = None;
    }

    fn active_hook(&self) -> Option<HookToken> {
        self.active
    }

    fn now(&self) -> f64 {
        self.clock
    }
}

/// Run a full trace over a parsed event log
///
/// **Public** - start, replay every event, stop
pub fn trace_event_log(log: &EventLog) -> Result<TraceOutcome, TraceError> {
    let mut source = ReplaySource::new(log.start_time);
    let mut processor = TraceProcessor::new(&log.sources);

    processor.start(&mut source, log.origin)?;
    source.replay(&mut processor, &log.events);
    processor.stop(&mut source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::event_log::parse_event_log;
    use crate::tracer::recorder::CallSignature;
    use serde_json::json;

    #[test]
    fn test_trace_event_log() {
        let raw = json!({
            "version": "1.0.0",
            "origin": { "frame": 1, "code": "main" },
            "start_time": 0.0,
            "code": {
                "main": {
                    "file_path": "app.py", "function_name": "main", "start_line": 1,
                    "source_lines": ["def main():", "    x = 1", "    g()"]
                },
                "g": {
                    "file_path": "app.py", "function_name": "g", "start_line": 10,
                    "source_lines": ["def g():", "    return 2"]
                }
            },
            "events": [
                { "event": "line", "frame": 1, "line": 2, "timestamp": 0.1 },
                { "event": "line", "frame": 1, "line": 3, "timestamp": 0.2 },
                { "event": "call", "frame": 2, "code": "g", "line": 10, "caller": 1, "caller_line": 3, "timestamp": 0.3 },
                { "event": "line", "frame": 2, "line": 11, "timestamp": 0.4 },
                { "event": "return", "frame": 2, "line": 11, "timestamp": 0.5 }
            ]
        });

        let log = parse_event_log(&raw).unwrap();
        let outcome = trace_event_log(&log).unwrap();

        let g = outcome
            .root
            .child(3, &CallSignature::new("app.py", "g"))
            .unwrap();
        assert_eq!(g.invocation_count(), 1);
        assert_eq!(g.lines()[&11].execution_count, 1);
        assert_eq!(g.lines()[&10].execution_count, 0);
        assert_eq!(outcome.stats.events, 5);
        assert!(!outcome.hook_displaced);
    }

    #[test]
    fn test_replay_without_hook_delivers_nothing() {
        let log = EventLog {
            version: "1.0.0".to_string(),
            origin: crate::tracer::FrameId(1),
            start_time: 0.0,
            sources: Default::default(),
            events: vec![TraceEvent::line(crate::tracer::FrameId(1), 1, 0.1)],
        };
        let mut source = ReplaySource::new(0.0);
        let mut processor = TraceProcessor::new(&log.sources);

        assert_eq!(source.replay(&mut processor, &log.events), 0);
        assert_eq!(source.now(), 0.0);
    }
}
