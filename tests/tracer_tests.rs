use pretty_assertions::assert_eq;
use std::collections::HashMap;
use trace_tree::tracer::{
    CallSignature, EventSource, FrameDescriptor, FrameId, HookToken, LineNo, SourceLocator,
    TraceEvent, TraceProcessor,
};
use trace_tree::utils::error::TraceError;

struct ScriptedSource {
    clock: f64,
    next_token: u64,
    active: Option<HookToken>,
}

impl ScriptedSource {
    fn new(clock: f64) -> Self {
        Self {
            clock,
            next_token: 0,
            active: None,
        }
    }
}

impl EventSource for ScriptedSource {
    fn install_hook(&mut self) -> HookToken {
        self.next_token += 1;
        self.active = Some(HookToken(self.next_token));
        HookToken(self.next_token)
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

/// Frames bound to functions of a single file
#[derive(Default)]
struct Sources {
    functions: HashMap<&'static str, (LineNo, usize)>,
    frames: HashMap<FrameId, &'static str>,
}

impl Sources {
    fn function(mut self, name: &'static str, start_line: LineNo, len: usize) -> Self {
        self.functions.insert(name, (start_line, len));
        self
    }

    fn frame(mut self, frame: u64, name: &'static str) -> Self {
        self.frames.insert(FrameId(frame), name);
        self
    }
}

impl SourceLocator for Sources {
    fn signature(&self, frame: FrameId) -> Result<CallSignature, TraceError> {
        self.describe(frame).map(|d| d.signature())
    }

    fn describe(&self, frame: FrameId) -> Result<FrameDescriptor, TraceError> {
        let unavailable = || TraceError::SourceUnavailable {
            frame,
            reason: "unknown".to_string(),
        };
        let name = self.frames.get(&frame).ok_or_else(unavailable)?;
        let (start_line, len) = self.functions.get(name).ok_or_else(unavailable)?;

        Ok(FrameDescriptor {
            file_path: "prog.py".to_string(),
            function_name: name.to_string(),
            module_name: Some("prog".to_string()),
            source_lines: (0..*len).map(|i| format!("{} #{}\n", name, i)).collect(),
            start_line: *start_line,
        })
    }
}

fn sig(name: &str) -> CallSignature {
    CallSignature::new("prog.py", name)
}

#[test]
fn test_root_calls_g_once() {
    let sources = Sources::default()
        .function("main", 1, 10)
        .function("g", 20, 2)
        .frame(1, "main")
        .frame(2, "g");
    let mut source = ScriptedSource::new(0.0);
    let mut tracer = TraceProcessor::new(sources);
    tracer.start(&mut source, FrameId(1)).unwrap();

    for event in [
        TraceEvent::line(FrameId(1), 5, 0.1),
        TraceEvent::call(FrameId(2), 20, FrameId(1), 5, 0.2),
        TraceEvent::line(FrameId(2), 20, 0.3),
        TraceEvent::line(FrameId(2), 21, 0.4),
        TraceEvent::ret(FrameId(2), 21, 0.5),
    ] {
        tracer.process(&event);
    }

    let outcome = tracer.stop(&mut source).unwrap();
    let root = &outcome.root;

    assert_eq!(root.children().len(), 1);
    assert_eq!(root.children()[&5].len(), 1);
    let g = &root.children()[&5][&sig("g")];
    assert_eq!(g.invocation_count(), 1);
    assert_eq!(g.lines().len(), 2);
    assert_eq!(
        g.lines().values().map(|l| l.execution_count).collect::<Vec<_>>(),
        vec![1, 1]
    );
    assert_eq!(g.caller_line(), Some(5));
    assert_eq!(g.lines()[&20].source_text, "g #0");

    // Flat tree: the root's total is exactly its children's
    assert_eq!(root.time_spent(), root.children_time());
    assert_eq!(g.time_spent(), 0.5);
}

#[test]
fn test_call_from_unknown_line_adds_no_children() {
    let sources = Sources::default()
        .function("main", 10, 11)
        .function("g", 30, 2)
        .frame(1, "main")
        .frame(2, "g");
    let mut source = ScriptedSource::new(0.0);
    let mut tracer = TraceProcessor::new(sources);
    tracer.start(&mut source, FrameId(1)).unwrap();

    tracer.process(&TraceEvent::call(FrameId(2), 30, FrameId(1), 5, 1.0));
    assert_eq!(tracer.pause_depth(), Some(0));

    tracer.process(&TraceEvent::line(FrameId(2), 30, 1.1));
    assert_eq!(tracer.pause_depth(), Some(0));

    tracer.process(&TraceEvent::ret(FrameId(2), 31, 1.2));
    assert_eq!(tracer.pause_depth(), None);

    let outcome = tracer.stop(&mut source).unwrap();
    assert_eq!(outcome.root.child_count(), 0);
    assert_eq!(outcome.stats.calls_skipped, 1);
}

#[test]
fn test_nested_trace_properties() {
    // main -> a (line 3) -> b (line 21), twice; main -> b (line 4) once
    let sources = Sources::default()
        .function("main", 1, 10)
        .function("a", 20, 5)
        .function("b", 40, 3)
        .frame(1, "main")
        .frame(2, "a")
        .frame(3, "b")
        .frame(4, "a")
        .frame(5, "b")
        .frame(6, "b");
    let mut source = ScriptedSource::new(0.0);
    let mut tracer = TraceProcessor::new(sources);
    tracer.start(&mut source, FrameId(1)).unwrap();

    let mut t = 0.0;
    let mut tick = || {
        t += 0.25;
        t
    };

    for (a, b) in [(2, 3), (4, 5)] {
        tracer.process(&TraceEvent::line(FrameId(1), 3, tick()));
        tracer.process(&TraceEvent::call(FrameId(a), 20, FrameId(1), 3, tick()));
        tracer.process(&TraceEvent::line(FrameId(a), 21, tick()));
        tracer.process(&TraceEvent::call(FrameId(b), 40, FrameId(a), 21, tick()));
        tracer.process(&TraceEvent::line(FrameId(b), 41, tick()));
        tracer.process(&TraceEvent::ret(FrameId(b), 41, tick()));
        tracer.process(&TraceEvent::line(FrameId(a), 22, tick()));
        tracer.process(&TraceEvent::ret(FrameId(a), 22, tick()));
    }
    tracer.process(&TraceEvent::line(FrameId(1), 4, tick()));
    tracer.process(&TraceEvent::call(FrameId(6), 40, FrameId(1), 4, tick()));
    tracer.process(&TraceEvent::ret(FrameId(6), 40, tick()));

    let outcome = tracer.stop(&mut source).unwrap();
    let root = &outcome.root;

    let a = root.child(3, &sig("a")).unwrap();
    let b_in_a = a.child(21, &sig("b")).unwrap();
    let b_in_main = root.child(4, &sig("b")).unwrap();

    assert_eq!(a.invocation_count(), 2);
    assert_eq!(b_in_a.invocation_count(), 2);
    assert_eq!(b_in_main.invocation_count(), 1);
    assert_eq!(root.lines()[&3].execution_count, 2);
    assert_eq!(b_in_a.lines()[&41].execution_count, 2);
    assert_eq!(b_in_a.lines()[&42].execution_count, 0);
    assert_eq!(outcome.stats.calls_recorded, 5);

    // Every return adds (now - start) to the callee and to its caller
    assert_eq!(b_in_a.time_spent(), 1.5 + 3.5);
    assert_eq!(a.time_spent(), 1.5 + 2.0 + 3.5 + 4.0);
    assert_eq!(b_in_main.time_spent(), 4.75);
    assert_eq!(root.time_spent(), 2.0 + 4.0 + 4.75);
}

#[test]
fn test_exception_skipping_returns_closes_each_frame_once() {
    let sources = Sources::default()
        .function("main", 1, 10)
        .function("outer", 20, 5)
        .function("inner", 30, 5)
        .frame(1, "main")
        .frame(2, "outer")
        .frame(3, "inner");
    let mut source = ScriptedSource::new(0.0);
    let mut tracer = TraceProcessor::new(sources);
    tracer.start(&mut source, FrameId(1)).unwrap();

    tracer.process(&TraceEvent::call(FrameId(2), 20, FrameId(1), 2, 1.0));
    tracer.process(&TraceEvent::call(FrameId(3), 30, FrameId(2), 21, 2.0));
    tracer.process(&TraceEvent::exception(FrameId(3), 32, Some(FrameId(2)), 3.0));
    tracer.process(&TraceEvent::exception(FrameId(2), 21, Some(FrameId(1)), 3.0));
    tracer.process(&TraceEvent::line(FrameId(1), 6, 4.0));
    assert_eq!(tracer.depth(), 0);

    // A later call from main still lands under main, not under a stale frame
    tracer.process(&TraceEvent::call(FrameId(2), 20, FrameId(1), 2, 5.0));
    tracer.process(&TraceEvent::ret(FrameId(2), 20, 6.0));

    let outcome = tracer.stop(&mut source).unwrap();
    let outer = outcome.root.child(2, &sig("outer")).unwrap();
    let inner = outer.child(21, &sig("inner")).unwrap();

    assert_eq!(outcome.stats.exception_unwinds, 2);
    assert_eq!(outer.invocation_count(), 2);
    assert_eq!(inner.invocation_count(), 1);
    assert_eq!(inner.time_spent(), 3.0);
    // The unwind closes outer at 4.0 without crediting main
    assert_eq!(outer.time_spent(), 4.0 + 6.0);
    assert_eq!(outcome.root.time_spent(), 6.0);
}

#[test]
fn test_exception_unwind_does_not_credit_caller() {
    let sources = Sources::default()
        .function("main", 1, 10)
        .function("a", 20, 5)
        .frame(1, "main")
        .frame(2, "a");
    let mut source = ScriptedSource::new(0.0);
    let mut tracer = TraceProcessor::new(sources);
    tracer.start(&mut source, FrameId(1)).unwrap();

    tracer.process(&TraceEvent::call(FrameId(2), 20, FrameId(1), 2, 1.0));
    tracer.process(&TraceEvent::exception(FrameId(2), 21, Some(FrameId(1)), 2.0));
    tracer.process(&TraceEvent::line(FrameId(1), 3, 3.0));

    let outcome = tracer.stop(&mut source).unwrap();
    let a = outcome.root.child(2, &sig("a")).unwrap();

    assert_eq!(a.time_spent(), 3.0);
    assert_eq!(outcome.root.time_spent(), 0.0);
    assert_eq!(outcome.root.lines()[&3].execution_count, 1);
}

#[test]
fn test_stop_without_start() {
    let mut source = ScriptedSource::new(0.0);
    let tracer = TraceProcessor::new(Sources::default());
    assert!(matches!(tracer.stop(&mut source), Err(TraceError::NotStarted)));
}

#[test]
fn test_start_fails_without_origin_source() {
    let mut source = ScriptedSource::new(0.0);
    let mut tracer = TraceProcessor::new(Sources::default());
    assert!(matches!(
        tracer.start(&mut source, FrameId(1)),
        Err(TraceError::SourceUnavailable { .. })
    ));
    assert_eq!(source.active_hook(), None);
}

#[test]
fn test_times_are_relative_to_start_clock() {
    let sources = Sources::default().function("main", 1, 3).frame(1, "main");
    let mut source = ScriptedSource::new(100.0);
    let mut tracer = TraceProcessor::new(sources);
    tracer.start(&mut source, FrameId(1)).unwrap();

    tracer.process(&TraceEvent::line(FrameId(1), 2, 100.5));
    tracer.process(&TraceEvent::line(FrameId(1), 2, 101.0));

    let outcome = tracer.stop(&mut source).unwrap();
    assert_eq!(outcome.root.lines()[&2].execution_count, 2);
    assert_eq!(outcome.root.lines()[&2].time_spent, 0.5 + 1.0);
}
