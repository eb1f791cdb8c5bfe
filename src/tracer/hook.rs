//! Seams to the host runtime: hook installation and source lookup.
//!
//! Both are injected into the processor so that tracing never touches
//! process-wide state and can be driven by fakes in tests.

use super::event::FrameId;
use super::recorder::{CallSignature, FrameDescriptor};
use crate::utils::error::TraceError;

/// Token identifying an installed hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookToken(pub u64);

/// Owner of the runtime's single active instrumentation hook
pub trait EventSource {
    /// Install a new hook, replacing whatever was active
    fn install_hook(&mut self) -> HookToken;

    /// Remove the active hook
    fn uninstall_hook(&mut self);

    /// Token of the currently installed hook
    fn active_hook(&self) -> Option<HookToken>;

    /// Current monotonic time in seconds, on the same clock as event timestamps
    fn now(&self) -> f64;
}

/// Resolves frame identities to source information
pub trait SourceLocator {
    /// Callee signature for a frame; called on every accepted call
    fn signature(&self, frame: FrameId) -> Result<CallSignature, TraceError>;

    /// Full descriptor for a frame; called only when a new node is created
    fn describe(&self, frame: FrameId) -> Result<FrameDescriptor, TraceError>;
}

impl<L: SourceLocator + ?Sized> SourceLocator for &L {
    fn signature(&self, frame: FrameId) -> Result<CallSignature, TraceError> {
        (**self).signature(frame)
    }

    fn describe(&self, frame: FrameId) -> Result<FrameDescriptor, TraceError> {
        (**self).describe(frame)
    }
}
