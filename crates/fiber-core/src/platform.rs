//! Platform abstraction traits for reconciler scheduling.
//!
//! The reconciler never decides on its own when to run. The host
//! environment is told that work is pending through a
//! [`CallbackScheduler`], and later calls back into
//! [`Reconciler::perform_work`](crate::Reconciler::perform_work) with a
//! [`Deadline`] describing how much time it may spend.

use std::time::Duration;

/// Requests idle-time callbacks from the host environment.
///
/// Implementations only record that a callback is wanted; the host loop is
/// expected to invoke the reconciler's work procedure at its next
/// opportunity. Requests are coalesced by the runtime, so a scheduler sees
/// at most one request per work-procedure invocation.
pub trait CallbackScheduler: Send + Sync {
    /// Request that the host run the work procedure when it has spare capacity.
    fn schedule_callback(&self);
}

/// Cooperative time budget handed to a single work-procedure invocation.
pub trait Deadline {
    /// Time left before the current invocation must yield.
    fn time_remaining(&self) -> Duration;
}

impl Deadline for Duration {
    fn time_remaining(&self) -> Duration {
        *self
    }
}
