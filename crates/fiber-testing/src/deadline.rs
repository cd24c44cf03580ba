use std::cell::Cell;
use std::time::Duration;

use fiber_core::Deadline;

/// Deadline that grants a fixed number of units of work.
///
/// Every `time_remaining` query consumes one step while steps remain and
/// reports a generous budget; afterwards it reports zero.
#[derive(Debug)]
pub struct StepDeadline {
    remaining: Cell<usize>,
    used: Cell<usize>,
}

impl StepDeadline {
    pub fn new(steps: usize) -> Self {
        Self {
            remaining: Cell::new(steps),
            used: Cell::new(0),
        }
    }

    pub fn steps_used(&self) -> usize {
        self.used.get()
    }

    pub fn steps_left(&self) -> usize {
        self.remaining.get()
    }
}

impl Deadline for StepDeadline {
    fn time_remaining(&self) -> Duration {
        match self.remaining.get() {
            0 => Duration::ZERO,
            left => {
                self.remaining.set(left - 1);
                self.used.set(self.used.get() + 1);
                Duration::from_secs(1)
            }
        }
    }
}

/// Deadline that never expires.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}
