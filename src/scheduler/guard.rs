use std::sync::{Arc, Mutex};

/// Non-overlap guard for a recurring job
///
/// At most one `RunPermit` exists at a time; dropping it frees the guard, even when
/// the job returned early or panicked.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<Mutex<bool>>,
}

/// Proof that the guarded job is running
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<Mutex<bool>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard, or returns `None` if the job is already running
    pub fn try_start(&self) -> Option<RunPermit> {
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *running {
            return None;
        }
        *running = true;
        Some(RunPermit {
            running: Arc::clone(&self.running),
        })
    }

    pub fn is_running(&self) -> bool {
        match self.running.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        match self.running.lock() {
            Ok(mut guard) => *guard = false,
            Err(poisoned) => *poisoned.into_inner() = false,
        }
    }
}
