use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request shared between the CLI and the orchestrator
///
/// Once requested, no new listing page is dispatched. Work already in flight
/// finishes and is checkpointed.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears a previous request so the next run can proceed
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
