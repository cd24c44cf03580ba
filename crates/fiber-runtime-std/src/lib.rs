//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform traits
//! defined in `fiber-core`. Applications construct a [`StdRuntime`], hand
//! its runtime to [`fiber_core::Reconciler::with_runtime`], and drive the
//! work procedure with [`StdRuntime::run_until_idle`] from their event loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use fiber_core::{
    CallbackScheduler, Deadline, HostAdapter, ReconcileError, Reconciler, ReconcilerOptions,
    Runtime, RuntimeHandle, WorkStatus,
};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records callback requests in an atomic flag.
pub struct StdScheduler {
    callback_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            callback_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a callback has been requested since the last call.
    pub fn take_callback_request(&self) -> bool {
        self.callback_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a callback is requested.
    pub fn set_callback_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_callback_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "callback_requested",
                &self.callback_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl CallbackScheduler for StdScheduler {
    fn schedule_callback(&self) {
        self.callback_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Deadline measured against the monotonic clock.
#[derive(Clone, Copy, Debug)]
pub struct InstantDeadline {
    end: Option<Instant>,
}

impl InstantDeadline {
    /// Deadline `budget` from now. Budgets too large to represent never expire.
    pub fn after(budget: Duration) -> Self {
        Self {
            end: Instant::now().checked_add(budget),
        }
    }

    pub fn at(end: Instant) -> Self {
        Self { end: Some(end) }
    }
}

impl Deadline for InstantDeadline {
    fn time_remaining(&self) -> Duration {
        match self.end {
            Some(end) => end.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }
}

/// Outcome of [`StdRuntime::run_until_idle`].
#[derive(Debug, Default)]
pub struct IdleReport {
    /// Work-procedure invocations.
    pub slices: usize,
    pub commits: usize,
    pub errors: Vec<ReconcileError>,
}

impl IdleReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Convenience container bundling the standard scheduler with a runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
    slice: Duration,
}

impl StdRuntime {
    /// Creates a runtime granting 16ms slices, about one frame at 60Hz.
    pub fn new() -> Self {
        Self::with_slice(Duration::from_millis(16))
    }

    pub fn with_slice(slice: Duration) -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self {
            scheduler,
            runtime,
            slice,
        }
    }

    /// Builds a reconciler wired to this runtime.
    pub fn reconciler<H: HostAdapter>(&self, host: H) -> Reconciler<H> {
        Reconciler::with_runtime(host, self.runtime(), ReconcilerOptions::default())
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn slice(&self) -> Duration {
        self.slice
    }

    /// Returns whether a callback was requested since the last poll.
    pub fn take_callback_request(&self) -> bool {
        self.scheduler.take_callback_request()
    }

    pub fn set_callback_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_callback_waker(waker);
    }

    pub fn clear_callback_waker(&self) {
        self.scheduler.clear_callback_waker();
    }

    /// Runs a single slice of work against `reconciler`.
    pub fn run_slice<H: HostAdapter>(
        &self,
        reconciler: &mut Reconciler<H>,
    ) -> Result<WorkStatus, ReconcileError> {
        reconciler.perform_work(&InstantDeadline::after(self.slice))
    }

    /// Grants slices until no callback is outstanding. Failed updates are
    /// logged and collected; later updates still run.
    pub fn run_until_idle<H: HostAdapter>(&self, reconciler: &mut Reconciler<H>) -> IdleReport {
        let mut report = IdleReport::default();
        while self.take_callback_request() {
            report.slices += 1;
            match self.run_slice(reconciler) {
                Ok(WorkStatus::Committed(summary)) => {
                    log::debug!("slice {} committed {} effects", report.slices, summary.len());
                    report.commits += 1;
                }
                Ok(WorkStatus::Suspended) | Ok(WorkStatus::Idle) => {}
                Err(err) => {
                    log::error!("update failed: {err}");
                    report.errors.push(err);
                }
            }
        }
        report
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("slice", &self.slice)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use fiber_core::{
        Component, Deadline, Element, MemoryHost, Props, RenderContext, RenderError, State,
    };

    use super::{InstantDeadline, StdRuntime};

    struct Counter;

    impl Component for Counter {
        fn create(_props: &Props) -> Self {
            Counter
        }

        fn initial_state(_props: &Props) -> State {
            State::new().with("count", 0)
        }

        fn render(&mut self, cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
            let count = cx.state().get_int("count").unwrap_or_default();
            let updater = cx.updater();
            Ok(vec![Element::host("button")
                .on("click", move |_| {
                    updater.request_state_update(State::new().with("count", count + 1));
                })
                .child(count)
                .build()?])
        }
    }

    #[test]
    fn render_requests_callback_and_runs_to_idle() {
        let runtime = StdRuntime::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        runtime.set_callback_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut reconciler = runtime.reconciler(MemoryHost::new());
        let container = reconciler.host_mut().create_container();
        reconciler.render(
            Element::component::<Counter>().build().expect("valid"),
            &container,
        );
        assert_eq!(wakes.load(Ordering::SeqCst), 1);

        let report = runtime.run_until_idle(&mut reconciler);
        assert!(report.is_clean());
        assert_eq!(report.commits, 1);
        assert!(!runtime.take_callback_request());
        assert_eq!(reconciler.host().text_content(container), "0");
    }

    #[test]
    fn listener_updates_flow_through_the_scheduler() {
        let runtime = StdRuntime::new();
        let mut reconciler = runtime.reconciler(MemoryHost::new());
        let container = reconciler.host_mut().create_container();
        reconciler.render(
            Element::component::<Counter>().build().expect("valid"),
            &container,
        );
        runtime.run_until_idle(&mut reconciler);

        let button = reconciler.host().find_by_tag(container, "button")[0];
        assert!(reconciler
            .host()
            .dispatch(button, &fiber_core::Event::new("click")));
        assert!(runtime.take_callback_request());
        // The request flag was consumed above; serve the queued update directly.
        runtime.run_slice(&mut reconciler).expect("slice");
        assert_eq!(reconciler.host().text_content(container), "1");
    }

    #[test]
    fn instant_deadline_counts_down() {
        assert_eq!(InstantDeadline::after(Duration::ZERO).time_remaining(), Duration::ZERO);
        assert!(InstantDeadline::after(Duration::from_secs(60)).time_remaining() > Duration::from_secs(59));
        assert_eq!(InstantDeadline::after(Duration::MAX).time_remaining(), Duration::MAX);
    }
}
