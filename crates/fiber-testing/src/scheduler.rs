use std::sync::atomic::{AtomicUsize, Ordering};

use fiber_core::CallbackScheduler;

/// Scheduler that only counts callback requests; tests decide when work runs.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    requests: AtomicUsize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Returns the request count and resets it.
    pub fn take_requests(&self) -> usize {
        self.requests.swap(0, Ordering::SeqCst)
    }
}

impl CallbackScheduler for ManualScheduler {
    fn schedule_callback(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}
