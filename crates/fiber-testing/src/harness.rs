use std::sync::Arc;

use fiber_core::{
    CommitSummary, Deadline, Element, Event, HostNodeId, MemoryHost, ReconcileError, Reconciler,
    ReconcilerOptions, Runtime, WorkStatus,
};

use crate::deadline::{StepDeadline, Unbounded};
use crate::faulty_host::FaultyHost;
use crate::scheduler::ManualScheduler;

/// Upper bound on work-procedure invocations per flush.
const MAX_SLICES: usize = 10_000;

/// What a flush did.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub slices: usize,
    pub suspensions: usize,
    pub commits: Vec<CommitSummary>,
    pub errors: Vec<ReconcileError>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// The single commit of this flush.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one commit happened.
    pub fn only_commit(&self) -> &CommitSummary {
        assert_eq!(self.commits.len(), 1, "expected exactly one commit: {self:?}");
        &self.commits[0]
    }
}

/// Reconciler over an in-memory host with a manual scheduler and a single
/// container.
pub struct Harness {
    reconciler: Reconciler<FaultyHost<MemoryHost>>,
    scheduler: Arc<ManualScheduler>,
    container: HostNodeId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(ReconcilerOptions::default())
    }

    pub fn with_options(options: ReconcilerOptions) -> Self {
        let scheduler = Arc::new(ManualScheduler::new());
        let runtime = Runtime::new(scheduler.clone());
        let mut host = FaultyHost::new(MemoryHost::new());
        let container = host.inner_mut().create_container();
        Self {
            reconciler: Reconciler::with_runtime(host, runtime, options),
            scheduler,
            container,
        }
    }

    pub fn render(&mut self, element: Element) {
        self.reconciler.render(element, &self.container);
    }

    /// Runs one work-procedure invocation.
    pub fn step(&mut self, deadline: &dyn Deadline) -> Result<WorkStatus, ReconcileError> {
        self.reconciler.perform_work(deadline)
    }

    /// Runs all pending work with unlimited time per invocation.
    pub fn flush(&mut self) -> FlushReport {
        self.drive(|| Box::new(Unbounded) as Box<dyn Deadline>)
    }

    /// Runs all pending work, granting `steps` units of work per invocation.
    pub fn flush_with_steps(&mut self, steps: usize) -> FlushReport {
        self.drive(|| Box::new(StepDeadline::new(steps)) as Box<dyn Deadline>)
    }

    fn drive(&mut self, mut deadline: impl FnMut() -> Box<dyn Deadline>) -> FlushReport {
        let mut report = FlushReport::default();
        while self.reconciler.has_pending_work() && report.slices < MAX_SLICES {
            report.slices += 1;
            let slice = deadline();
            match self.reconciler.perform_work(slice.as_ref()) {
                Ok(WorkStatus::Committed(summary)) => report.commits.push(summary),
                Ok(WorkStatus::Suspended) => report.suspensions += 1,
                Ok(WorkStatus::Idle) => {}
                Err(err) => report.errors.push(err),
            }
        }
        report
    }

    /// Dump of the host tree under the container.
    pub fn snapshot(&self) -> String {
        self.memory().dump_tree(self.container)
    }

    /// Dump of the committed work tree, if anything was committed.
    pub fn work_snapshot(&self) -> Option<String> {
        self.reconciler.dump_tree(&self.container)
    }

    pub fn text(&self) -> String {
        self.memory().text_content(self.container)
    }

    /// Host nodes with `tag` under the container, in document order.
    pub fn find(&self, tag: &str) -> Vec<HostNodeId> {
        self.memory().find_by_tag(self.container, tag)
    }

    /// Dispatches `click` to the `index`-th node with `tag`.
    pub fn click(&self, tag: &str, index: usize) -> bool {
        match self.find(tag).get(index) {
            Some(node) => self.memory().dispatch(*node, &Event::new("click")),
            None => false,
        }
    }

    pub fn container(&self) -> HostNodeId {
        self.container
    }

    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }

    pub fn host(&self) -> &FaultyHost<MemoryHost> {
        self.reconciler.host()
    }

    pub fn host_mut(&mut self) -> &mut FaultyHost<MemoryHost> {
        self.reconciler.host_mut()
    }

    pub fn memory(&self) -> &MemoryHost {
        self.reconciler.host().inner()
    }

    pub fn reconciler(&self) -> &Reconciler<FaultyHost<MemoryHost>> {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler<FaultyHost<MemoryHost>> {
        &mut self.reconciler
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_commits_a_render() {
        let mut harness = Harness::new();
        harness.render(
            Element::host("p")
                .child("hi")
                .build()
                .expect("valid element"),
        );
        let report = harness.flush();
        assert!(report.is_clean());
        assert_eq!(report.only_commit().len(), 2);
        assert_eq!(harness.snapshot(), "<#container>\n  <p>\n    \"hi\"\n");
        assert_eq!(harness.scheduler().requests(), 1);
    }
}
