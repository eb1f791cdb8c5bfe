//! The event-processing state machine.
//!
//! The processor keeps an explicit stack of active frames mirroring the
//! observed call stack. While a frame runs it is detached from its parent
//! and lives on the stack; when it returns it is folded back into the
//! parent's `children` under its (origin line, signature) slot.
//!
//! Calls made from lines the current frame does not know about pause the
//! processor until the logical depth comes back to the caller, which keeps
//! library internals out of the tree while still tracking depth.

use super::event::{EventKind, FrameId, LineNo, TraceEvent};
use super::hook::{EventSource, HookToken, SourceLocator};
use super::recorder::{CallSignature, FrameRecorder};
use crate::utils::error::TraceError;
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};

/// Counters describing how the event stream was handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStats {
    /// Events delivered to `process` while running
    pub events: u64,

    /// Calls that entered a node of the tree
    pub calls_recorded: u64,

    /// Calls that paused the processor (out of scope or source unavailable)
    pub calls_skipped: u64,

    /// Events ignored while paused
    pub events_dropped: u64,

    /// Exception unwinds reconciled without a return event
    pub exception_unwinds: u64,
}

/// Result of a finished trace
#[derive(Debug, Clone)]
pub struct TraceOutcome {
    pub root: FrameRecorder,

    /// Another component replaced the hook during the trace
    pub hook_displaced: bool,

    pub stats: TraceStats,
}

struct ActiveFrame {
    recorder: FrameRecorder,
    /// Where the recorder goes back into its parent; `None` for the root
    slot: Option<(LineNo, CallSignature)>,
    frame: FrameId,
    depth: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingException {
    /// Frame that will see the next event once the exception unwinds to it
    frame: FrameId,
    raised_at: LineNo,
}

/// Builds a call tree from a stream of execution events
pub struct TraceProcessor<L> {
    locator: L,
    active_stack: Vec<ActiveFrame>,
    /// Every frame above the root, including untracked ones
    call_path: Vec<FrameId>,
    pause_depth: Option<usize>,
    pending_exception: Option<PendingException>,
    start_time: f64,
    hook: Option<HookToken>,
    fault: Option<TraceError>,
    stats: TraceStats,
}

impl<L: SourceLocator> TraceProcessor<L> {
    pub fn new(locator: L) -> Self {
        Self {
            locator,
            active_stack: Vec::new(),
            call_path: Vec::new(),
            pause_depth: None,
            pending_exception: None,
            start_time: 0.0,
            hook: None,
            fault: None,
            stats: TraceStats::default(),
        }
    }

    /// Start tracing with `origin` as the root of the tree
    ///
    /// # Errors
    /// * `TraceError::AlreadyStarted` - the processor is already running
    /// * `TraceError::SourceUnavailable` - the origin frame cannot be described
    pub fn start<S>(&mut self, source: &mut S, origin: FrameId) -> Result<(), TraceError>
    where
        S: EventSource + ?Sized,
    {
        if self.hook.is_some() {
            return Err(TraceError::AlreadyStarted);
        }

        let descriptor = self.locator.describe(origin)?;
        let root = FrameRecorder::new(descriptor, None);

        info!("Starting trace at {} ({})", origin, root.identity());

        self.start_time = source.now();
        self.active_stack = vec![ActiveFrame {
            recorder: root,
            slot: None,
            frame: origin,
            depth: 0,
        }];
        self.call_path.clear();
        self.pause_depth = None;
        self.pending_exception = None;
        self.fault = None;
        self.stats = TraceStats::default();
        self.hook = Some(source.install_hook());

        Ok(())
    }

    /// Stop tracing and hand back the finished tree
    ///
    /// Frames that are still open are folded into their parents as they are.
    ///
    /// # Errors
    /// * `TraceError::NotStarted` - `start` was never called
    /// * `TraceError::StackUnderflow` - the event stream unbalanced the stack
    pub fn stop<S>(mut self, source: &mut S) -> Result<TraceOutcome, TraceError>
    where
        S: EventSource + ?Sized,
    {
        let token = self.hook.take().ok_or(TraceError::NotStarted)?;

        let active = source.active_hook();
        let hook_displaced = active != Some(token);
        if hook_displaced {
            warn!("Trace hook changed, measurement is likely wrong: {:?}", active);
        }
        source.uninstall_hook();

        if let Some(fault) = self.fault.take() {
            return Err(fault);
        }

        if self.active_stack.len() > 1 {
            debug!("Stopping with {} frames still open", self.active_stack.len() - 1);
        }

        let root = self.fold_stack().ok_or(TraceError::NotStarted)?;

        info!(
            "Trace stopped: {} events, {} calls recorded, {} skipped",
            self.stats.events, self.stats.calls_recorded, self.stats.calls_skipped
        );

        Ok(TraceOutcome {
            root,
            hook_displaced,
            stats: self.stats,
        })
    }

    /// Handle one event
    ///
    /// Never fails: structural problems are remembered and reported by `stop`.
    pub fn process(&mut self, event: &TraceEvent) {
        if self.hook.is_none() || self.fault.is_some() {
            return;
        }

        self.stats.events += 1;
        trace!(
            "trace event: {} {} @{} (depth {})",
            event.kind,
            event.frame,
            event.line,
            self.depth()
        );

        if let Some(pending) = self.pending_exception.take() {
            if pending.frame == event.frame {
                self.unwind_to(pending, event.timestamp);
                if self.fault.is_some() {
                    return;
                }
            }
        }

        match event.kind {
            EventKind::Call => self.on_call(event),
            EventKind::Line => self.on_line(event),
            EventKind::Return => self.on_return(event),
            EventKind::Exception => self.on_exception(event),
        }
    }

    pub fn is_running(&self) -> bool {
        self.hook.is_some()
    }

    /// Logical depth of the current frame; the origin is depth 0
    pub fn depth(&self) -> usize {
        self.call_path.len()
    }

    pub fn pause_depth(&self) -> Option<usize> {
        self.pause_depth
    }

    pub fn is_paused(&self) -> bool {
        self.pause_depth.is_some()
    }

    /// The frame currently receiving events
    pub fn current(&self) -> Option<&FrameRecorder> {
        self.active_stack.last().map(|top| &top.recorder)
    }

    pub fn stats(&self) -> TraceStats {
        self.stats
    }

    fn on_call(&mut self, event: &TraceEvent) {
        let caller_depth = self.call_path.len();
        self.call_path.push(event.frame);

        // A paused trace only sees calls below the pause depth; the pause
        // itself is lifted once a Return or an unwind gets back to it.
        if self.pause_depth.is_some() {
            self.stats.events_dropped += 1;
            return;
        }

        let Some(top) = self.active_stack.last() else {
            return;
        };

        let origin_line = match event.caller_line {
            Some(line) if top.recorder.has_line(line) => line,
            other => {
                debug!(
                    "Call into {} from untracked line {:?} of {}, pausing at depth {}",
                    event.frame,
                    other,
                    top.recorder.identity(),
                    caller_depth
                );
                self.pause_at(caller_depth);
                return;
            }
        };

        let signature = match self.locator.signature(event.frame) {
            Ok(signature) => signature,
            Err(e) => {
                debug!("Skipping call: {}", e);
                self.pause_at(caller_depth);
                return;
            }
        };

        let existing = self
            .active_stack
            .last_mut()
            .and_then(|top| top.recorder.take_child(origin_line, &signature));

        let mut child = match existing {
            Some(child) => child,
            None => match self.locator.describe(event.frame) {
                Ok(descriptor) => FrameRecorder::new(descriptor, Some(origin_line)),
                Err(e) => {
                    debug!("Skipping call: {}", e);
                    self.pause_at(caller_depth);
                    return;
                }
            },
        };

        child.record_invocation();
        self.stats.calls_recorded += 1;

        self.active_stack.push(ActiveFrame {
            recorder: child,
            slot: Some((origin_line, signature)),
            frame: event.frame,
            depth: self.call_path.len(),
        });
    }

    fn on_line(&mut self, event: &TraceEvent) {
        if self.pause_depth.is_some() {
            self.stats.events_dropped += 1;
            return;
        }

        let delta = self.elapsed(event.timestamp);
        if let Some(top) = self.active_stack.last_mut() {
            top.recorder.record_line(event.line, delta);
        }
    }

    fn on_return(&mut self, event: &TraceEvent) {
        if self.pause_depth.is_some() {
            self.stats.events_dropped += 1;
        } else if !self.close_top(event.timestamp) {
            self.fail(EventKind::Return, event.frame);
            return;
        }

        self.call_path.pop();

        if let Some(pause) = self.pause_depth {
            if self.call_path.len() <= pause {
                debug!("Resuming trace at depth {}", self.call_path.len());
                self.pause_depth = None;
            }
        }
    }

    fn on_exception(&mut self, event: &TraceEvent) {
        match event.caller {
            Some(caller) => {
                self.pending_exception = Some(PendingException {
                    frame: caller,
                    raised_at: event.line,
                });
            }
            None => debug!("Exception in {} has no caller frame", event.frame),
        }
    }

    /// Close every tracked frame above `pending.frame` as if it had returned
    fn unwind_to(&mut self, pending: PendingException, now: f64) {
        let is_root = self.active_stack.first().map(|root| root.frame) == Some(pending.frame);
        let target_depth = if is_root {
            Some(0)
        } else {
            self.call_path
                .iter()
                .rposition(|frame| *frame == pending.frame)
                .map(|index| index + 1)
        };

        let Some(target_depth) = target_depth else {
            debug!("Exception target {} is not on the call path", pending.frame);
            return;
        };

        debug!(
            "Exception raised at line {} unwound to {} (depth {} -> {})",
            pending.raised_at,
            pending.frame,
            self.call_path.len(),
            target_depth
        );

        while self
            .active_stack
            .last()
            .is_some_and(|top| top.depth > target_depth)
        {
            if !self.pop_top(now, false) {
                self.fail(EventKind::Exception, pending.frame);
                return;
            }
            self.stats.exception_unwinds += 1;
        }

        self.call_path.truncate(target_depth);

        if let Some(pause) = self.pause_depth {
            if target_depth <= pause {
                debug!("Resuming trace at depth {}", target_depth);
                self.pause_depth = None;
            }
        }
    }

    /// Pop the top frame as on a Return: the callee and the caller's
    /// running total both receive the closing delta
    ///
    /// Returns false if only the root is left.
    fn close_top(&mut self, now: f64) -> bool {
        self.pop_top(now, true)
    }

    /// Pop the top frame, closing its time and reattaching it to the parent
    ///
    /// An exception unwind closes only the frame itself; the parent is not
    /// credited with the delta.
    fn pop_top(&mut self, now: f64, credit_parent: bool) -> bool {
        if self.active_stack.len() < 2 {
            return false;
        }

        let delta = self.elapsed(now);
        let Some(mut finished) = self.active_stack.pop() else {
            return false;
        };
        finished.recorder.add_time(delta);

        let Some(parent) = self.active_stack.last_mut() else {
            return false;
        };
        if credit_parent {
            parent.recorder.add_time(delta);
        }

        if let Some((origin_line, signature)) = finished.slot {
            parent
                .recorder
                .insert_child(origin_line, signature, finished.recorder);
        }

        true
    }

    /// Fold all open frames back into their parents and return the root
    fn fold_stack(&mut self) -> Option<FrameRecorder> {
        while self.active_stack.len() > 1 {
            let open = self.active_stack.pop()?;
            let parent = self.active_stack.last_mut()?;
            if let Some((origin_line, signature)) = open.slot {
                parent
                    .recorder
                    .insert_child(origin_line, signature, open.recorder);
            }
        }
        self.active_stack.pop().map(|root| root.recorder)
    }

    fn pause_at(&mut self, depth: usize) {
        self.pause_depth = Some(depth);
        self.stats.calls_skipped += 1;
    }

    fn fail(&mut self, event: EventKind, frame: FrameId) {
        error!("Stack underflow on {} event in {}, abandoning trace", event, frame);
        self.fault = Some(TraceError::StackUnderflow { event, frame });
    }

    /// Time since the trace started; all accumulations use this quantity
    fn elapsed(&self, now: f64) -> f64 {
        (now - self.start_time).max(0.0)
    }
}
