use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::component::{InstanceId, State};
use crate::element::Element;
use crate::platform::CallbackScheduler;
use crate::work_tree::RootId;

/// Pending request for new work, consumed one per work cycle.
pub(crate) enum UpdateRequest {
    Root { root: RootId, element: Element },
    Component { instance: InstanceId, partial_state: State },
}

struct RuntimeInner {
    scheduler: Arc<dyn CallbackScheduler>,
    queue: RefCell<VecDeque<UpdateRequest>>,
    callback_requested: Cell<bool>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn CallbackScheduler>) -> Self {
        Self {
            scheduler,
            queue: RefCell::new(VecDeque::new()),
            callback_requested: Cell::new(false),
        }
    }

    fn request_callback(&self) {
        if !self.callback_requested.replace(true) {
            self.scheduler.schedule_callback();
        }
    }

    fn enqueue(&self, request: UpdateRequest) {
        self.queue.borrow_mut().push_back(request);
        self.request_callback();
    }

    fn dequeue(&self) -> Option<UpdateRequest> {
        self.queue.borrow_mut().pop_front()
    }

    fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

/// Update queue shared by a reconciler and the updaters it hands out.
///
/// Requests are served in FIFO order. At most one scheduler callback is
/// outstanding at a time: further requests made before the callback runs
/// only extend the queue.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn CallbackScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn pending_updates(&self) -> usize {
        self.inner.pending()
    }

    pub fn has_pending_updates(&self) -> bool {
        self.pending_updates() > 0
    }

    /// Whether a scheduler callback has been requested and not yet served.
    pub fn callback_requested(&self) -> bool {
        self.inner.callback_requested.get()
    }

    pub(crate) fn enqueue(&self, request: UpdateRequest) {
        self.inner.enqueue(request);
    }

    pub(crate) fn dequeue(&self) -> Option<UpdateRequest> {
        self.inner.dequeue()
    }

    pub(crate) fn request_callback(&self) {
        self.inner.request_callback();
    }

    /// Marks the outstanding callback as being served.
    pub(crate) fn begin_callback(&self) {
        self.inner.callback_requested.set(false);
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl CallbackScheduler for DefaultScheduler {
    fn schedule_callback(&self) {}
}

#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub(crate) fn enqueue(&self, request: UpdateRequest) -> bool {
        match self.0.upgrade() {
            Some(inner) => {
                inner.enqueue(request);
                true
            }
            None => false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn pending_updates(&self) -> usize {
        self.0
            .upgrade()
            .map(|inner| inner.pending())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingScheduler {
        calls: AtomicUsize,
    }

    impl CallbackScheduler for CountingScheduler {
        fn schedule_callback(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn partial(instance: InstanceId) -> UpdateRequest {
        UpdateRequest::Component {
            instance,
            partial_state: State::new(),
        }
    }

    #[test]
    fn requests_are_coalesced_until_callback_runs() {
        let scheduler = Arc::new(CountingScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        runtime.enqueue(partial(InstanceId::default()));
        runtime.enqueue(partial(InstanceId::default()));
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.pending_updates(), 2);

        runtime.begin_callback();
        assert!(!runtime.callback_requested());
        runtime.enqueue(partial(InstanceId::default()));
        assert_eq!(scheduler.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn queue_is_fifo() {
        let runtime = Runtime::new(Arc::new(DefaultScheduler));
        runtime.enqueue(UpdateRequest::Root {
            root: RootId::new(0),
            element: Element::text("a"),
        });
        runtime.enqueue(UpdateRequest::Root {
            root: RootId::new(1),
            element: Element::text("b"),
        });
        let roots: Vec<usize> = std::iter::from_fn(|| runtime.dequeue())
            .map(|request| match request {
                UpdateRequest::Root { root, .. } => root.index(),
                UpdateRequest::Component { .. } => usize::MAX,
            })
            .collect();
        assert_eq!(roots, vec![0, 1]);
    }

    #[test]
    fn handle_outliving_runtime_is_inert() {
        let runtime = Runtime::new(Arc::new(DefaultScheduler));
        let handle = runtime.handle();
        assert!(handle.is_alive());
        drop(runtime);
        assert!(!handle.is_alive());
        assert!(!handle.enqueue(partial(InstanceId::default())));
        assert_eq!(handle.pending_updates(), 0);
    }
}
