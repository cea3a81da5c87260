//! Environment dependencies for the allocation reducer.

use crate::notify::NotificationSink;
use crate::render::PassRenderer;
use seatline_core::environment::Clock;
use std::sync::Arc;

/// Injected dependencies for the allocation reducer.
///
/// Only collaborators the reducer emits effects against live here; the
/// identity directory and payment gateway are consumed by the engine before
/// any command is dispatched.
#[derive(Clone)]
pub struct AllocationEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Fire-and-forget notification delivery
    pub notifier: Arc<dyn NotificationSink>,
    /// Pass image rendering
    pub renderer: Arc<dyn PassRenderer>,
}

impl AllocationEnvironment {
    /// Creates a new `AllocationEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
        renderer: Arc<dyn PassRenderer>,
    ) -> Self {
        Self {
            clock,
            notifier,
            renderer,
        }
    }
}
