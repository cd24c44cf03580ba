//! Interruptible work loop.
//!
//! Each queued update becomes a work-in-progress tree rooted at a fresh root
//! node whose `alternate` is the committed root. The walk processes one node
//! per unit of work: begin the node, descend into its first child, and when
//! there is none complete nodes upward until a sibling turns up. Completing a
//! node hands its effects to its parent, so the root ends up holding every
//! effect of the cycle in child-before-parent order.

use std::fmt::Write as _;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use slotmap::SlotMap;

use crate::collections::map::FastMap;
use crate::component::{Instance, InstanceId, RenderContext, State, StateUpdater};
use crate::element::{Element, ElementType};
use crate::host::{HostAdapter, HostError, HostOperation};
use crate::platform::Deadline;
use crate::props::{Props, NODE_VALUE};
use crate::runtime::{DefaultScheduler, Runtime, RuntimeHandle, UpdateRequest};
use crate::work_tree::{Effect, EffectKind, FiberId, FiberTag, NodeKind, RootId, WorkNode, WorkTree};
use crate::ReconcileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerOptions {
    /// The walk yields once the deadline has this much time left or less.
    pub enough_time: Duration,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            enough_time: Duration::from_millis(1),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    WalkingTree,
    Committing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing was queued.
    Idle,
    /// The deadline ran out; the walk resumes on the next invocation.
    Suspended,
    Committed(CommitSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEffect {
    pub kind: EffectKind,
    pub node: NodeKind,
    pub label: String,
}

/// Effects of one commit, in the order they were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    effects: Vec<AppliedEffect>,
}

impl CommitSummary {
    pub(crate) fn push(&mut self, effect: AppliedEffect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[AppliedEffect] {
        &self.effects
    }

    pub fn count(&self, kind: EffectKind) -> usize {
        self.effects.iter().filter(|effect| effect.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// `"Placement li"`-style lines, handy in assertions.
    pub fn describe(&self) -> Vec<String> {
        self.effects
            .iter()
            .map(|effect| format!("{:?} {}", effect.kind, effect.label))
            .collect()
    }
}

pub(crate) struct RootSlot<Handle> {
    pub(crate) container: Handle,
    pub(crate) current: Option<FiberId>,
}

pub(crate) struct RenderedInstance {
    pub(crate) instance: InstanceId,
    pub(crate) props: Rc<Props>,
    pub(crate) state: State,
}

/// Book-keeping of the cycle in progress. Everything here is discarded
/// when the cycle aborts and applied when it commits.
pub(crate) struct WorkInProgress {
    pub(crate) root: RootId,
    pub(crate) root_fiber: FiberId,
    pub(crate) next_unit: Option<FiberId>,
    /// Committed nodes carrying a staged state update.
    pub(crate) staged: Vec<FiberId>,
    pub(crate) created: Vec<InstanceId>,
    pub(crate) rendered: Vec<RenderedInstance>,
    pub(crate) bindings: Vec<(InstanceId, FiberId)>,
    pub(crate) units: usize,
}

pub struct Reconciler<H: HostAdapter> {
    pub(crate) host: H,
    runtime: Runtime,
    options: ReconcilerOptions,
    pub(crate) tree: WorkTree<H::Handle>,
    pub(crate) instances: SlotMap<InstanceId, Instance>,
    pub(crate) roots: Vec<RootSlot<H::Handle>>,
    containers: FastMap<H::Handle, RootId>,
    wip: Option<WorkInProgress>,
    pub(crate) phase: Phase,
}

impl<H: HostAdapter> Reconciler<H> {
    pub fn new(host: H) -> Self {
        Self::with_runtime(
            host,
            Runtime::new(Arc::new(DefaultScheduler)),
            ReconcilerOptions::default(),
        )
    }

    pub fn with_runtime(host: H, runtime: Runtime, options: ReconcilerOptions) -> Self {
        Self {
            host,
            runtime,
            options,
            tree: WorkTree::new(),
            instances: SlotMap::with_key(),
            roots: Vec::new(),
            containers: FastMap::default(),
            wip: None,
            phase: Phase::Idle,
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn options(&self) -> ReconcilerOptions {
        self.options
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a suspended walk or a queued update is waiting.
    pub fn has_pending_work(&self) -> bool {
        self.wip.is_some() || self.runtime.has_pending_updates()
    }

    pub fn mounted_instances(&self) -> usize {
        self.instances.len()
    }

    /// Live nodes in the work tree arena, committed and in progress.
    pub fn work_node_count(&self) -> usize {
        self.tree.len()
    }

    /// Queues `element` as the new content of `container`.
    pub fn render(&mut self, element: Element, container: &H::Handle) -> RootId {
        let root = self.root_for(container);
        debug!("queued render of {:?} into {:?}", element.ty(), container);
        self.runtime
            .enqueue(UpdateRequest::Root { root, element });
        root
    }

    /// Runs queued work until it finishes one update or `deadline` runs out.
    ///
    /// A walk that fails is discarded as a whole; the committed tree, the
    /// component instances and the update that caused the failure are left
    /// behind as if the update had never been queued.
    pub fn perform_work(&mut self, deadline: &dyn Deadline) -> Result<WorkStatus, ReconcileError> {
        self.runtime.begin_callback();
        let result = self.work_loop(deadline);
        if self.has_pending_work() {
            self.runtime.request_callback();
        }
        result
    }

    /// Renders the committed work tree of `container`.
    pub fn dump_tree(&self, container: &H::Handle) -> Option<String> {
        let root = *self.containers.get(container)?;
        let current = self.roots.get(root.index())?.current?;
        let mut output = String::new();
        self.dump_node(&mut output, current, 0);
        Some(output)
    }

    fn dump_node(&self, output: &mut String, id: FiberId, depth: usize) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        match &node.tag {
            FiberTag::Element(ElementType::Text) => {
                let text = node.props.get_str(NODE_VALUE).unwrap_or_default();
                let _ = writeln!(output, "{indent}#text {text:?}");
            }
            tag => {
                let _ = writeln!(output, "{indent}{}", tag.label());
            }
        }
        for child in self.tree.children(id) {
            self.dump_node(output, child, depth + 1);
        }
    }

    fn root_for(&mut self, container: &H::Handle) -> RootId {
        if let Some(root) = self.containers.get(container) {
            return *root;
        }
        let root = RootId::new(self.roots.len());
        self.roots.push(RootSlot {
            container: container.clone(),
            current: None,
        });
        self.containers.insert(container.clone(), root);
        root
    }

    fn work_loop(&mut self, deadline: &dyn Deadline) -> Result<WorkStatus, ReconcileError> {
        let mut wip = match self.wip.take() {
            Some(wip) => wip,
            None => match self.reset_next_unit_of_work() {
                Some(wip) => wip,
                None => return Ok(WorkStatus::Idle),
            },
        };
        self.phase = Phase::WalkingTree;

        while let Some(unit) = wip.next_unit {
            if deadline.time_remaining() <= self.options.enough_time {
                trace!("yielding after {} units of work", wip.units);
                self.wip = Some(wip);
                return Ok(WorkStatus::Suspended);
            }
            match self.perform_unit_of_work(&mut wip, unit) {
                Ok(next) => {
                    wip.next_unit = next;
                    wip.units += 1;
                }
                Err(err) => {
                    warn!("discarding work in progress: {err}");
                    self.abort(wip);
                    return Err(err);
                }
            }
        }

        self.commit_all_work(wip).map(WorkStatus::Committed)
    }

    /// Takes the next serviceable update off the queue and builds the root
    /// of its work-in-progress tree.
    fn reset_next_unit_of_work(&mut self) -> Option<WorkInProgress> {
        while let Some(request) = self.runtime.dequeue() {
            match request {
                UpdateRequest::Root { root, element } => {
                    let slot = &self.roots[root.index()];
                    let props = Rc::new(Props::with_children(vec![element]));
                    let node = WorkNode::root(slot.container.clone(), props, slot.current);
                    debug!("starting root update for {:?}", slot.container);
                    return Some(self.begin_cycle(root, node, Vec::new()));
                }
                UpdateRequest::Component {
                    instance,
                    partial_state,
                } => {
                    let Some(target) = self.instances.get(instance) else {
                        warn!("dropping state update for unmounted instance {instance:?}");
                        continue;
                    };
                    let root = target.root;
                    let name = target.ty.name();
                    let fiber = target.fiber.filter(|fiber| self.tree.get(*fiber).is_some());
                    let current = self.roots[root.index()].current;
                    let (Some(fiber), Some(current)) = (fiber, current) else {
                        warn!("dropping state update for uncommitted {name} ({instance:?})");
                        continue;
                    };
                    debug!("starting state update for {name} ({instance:?})");
                    self.tree[fiber].pending_state = Some(partial_state);
                    let container = self.roots[root.index()].container.clone();
                    let props = Rc::clone(&self.tree[current].props);
                    let node = WorkNode::root(container, props, Some(current));
                    return Some(self.begin_cycle(root, node, vec![fiber]));
                }
            }
        }
        None
    }

    fn begin_cycle(
        &mut self,
        root: RootId,
        node: WorkNode<H::Handle>,
        staged: Vec<FiberId>,
    ) -> WorkInProgress {
        let root_fiber = self.tree.insert(node);
        WorkInProgress {
            root,
            root_fiber,
            next_unit: Some(root_fiber),
            staged,
            created: Vec::new(),
            rendered: Vec::new(),
            bindings: Vec::new(),
            units: 0,
        }
    }

    fn perform_unit_of_work(
        &mut self,
        wip: &mut WorkInProgress,
        unit: FiberId,
    ) -> Result<Option<FiberId>, ReconcileError> {
        trace!("begin {}", self.tree[unit].tag.label());
        self.begin_work(wip, unit)?;
        if let Some(child) = self.tree[unit].child {
            return Ok(Some(child));
        }

        let mut cursor = Some(unit);
        while let Some(node) = cursor {
            self.complete_work(wip, node);
            if node == wip.root_fiber {
                break;
            }
            if let Some(sibling) = self.tree[node].sibling {
                return Ok(Some(sibling));
            }
            cursor = self.tree[node].parent;
        }
        Ok(None)
    }

    fn begin_work(&mut self, wip: &mut WorkInProgress, unit: FiberId) -> Result<(), ReconcileError> {
        match self.tree[unit].kind() {
            NodeKind::Component => self.update_component(wip, unit),
            NodeKind::HostRoot | NodeKind::HostNode => self.update_host(unit),
        }
    }

    fn update_host(&mut self, unit: FiberId) -> Result<(), ReconcileError> {
        let props = Rc::clone(&self.tree[unit].props);
        if self.tree[unit].host.is_none() {
            let handle = self.create_host_node(unit, &props)?;
            self.tree[unit].host = Some(handle);
        }
        if let Some(alternate) = self.tree[unit].alternate {
            if Rc::ptr_eq(&self.tree[alternate].props, &props) {
                self.clone_child_fibers(unit);
                return Ok(());
            }
        }
        self.reconcile_children(unit, props.children());
        Ok(())
    }

    fn create_host_node(&mut self, unit: FiberId, props: &Props) -> Result<H::Handle, HostError> {
        match &self.tree[unit].tag {
            FiberTag::Element(ElementType::Text) => {
                let text = props.get_str(NODE_VALUE).unwrap_or_default();
                self.host.create_text_node(text)
            }
            FiberTag::Element(ElementType::Host(tag)) => {
                let handle = self.host.create_node(tag)?;
                self.host.apply_properties(&handle, &Props::default(), props)?;
                Ok(handle)
            }
            other => Err(HostError::Rejected {
                operation: HostOperation::CreateNode,
                reason: format!("{} has no host node", other.label()),
            }),
        }
    }

    fn update_component(
        &mut self,
        wip: &mut WorkInProgress,
        unit: FiberId,
    ) -> Result<(), ReconcileError> {
        let props = Rc::clone(&self.tree[unit].props);
        let (instance_id, created) = match self.tree[unit].instance {
            Some(id) if self.instances.contains_key(id) => (id, false),
            _ => {
                let FiberTag::Element(ElementType::Component(ty)) = self.tree[unit].tag else {
                    return Ok(());
                };
                let (component, state) = ty.instantiate(&props);
                let id = self.instances.insert(Instance {
                    component,
                    ty,
                    props: Rc::clone(&props),
                    state,
                    fiber: None,
                    root: wip.root,
                });
                debug!("created {} ({id:?})", ty.name());
                wip.created.push(id);
                self.tree[unit].instance = Some(id);
                (id, true)
            }
        };

        let pending = self.tree[unit].pending_state.take();
        let instance = &self.instances[instance_id];
        if !created && pending.is_none() && Rc::ptr_eq(&instance.props, &props) {
            trace!("{} unchanged, reusing children", instance.ty.name());
            self.clone_child_fibers(unit);
            return Ok(());
        }

        let state = match &pending {
            Some(partial) => instance.state.merged(partial),
            None => instance.state.clone(),
        };
        let updater = StateUpdater::new(instance_id, self.runtime.handle());
        let instance = &mut self.instances[instance_id];
        let component = instance.ty.name();
        let children = {
            let cx = RenderContext::new(&props, &state, updater);
            instance
                .component
                .render(&cx)
                .map_err(|source| ReconcileError::ComponentRender { component, source })?
        };
        wip.rendered.push(RenderedInstance {
            instance: instance_id,
            props,
            state,
        });
        self.reconcile_children(unit, &children);
        Ok(())
    }

    /// Copies the committed children of `parent` verbatim.
    fn clone_child_fibers(&mut self, parent: FiberId) {
        let Some(alternate) = self.tree[parent].alternate else {
            return;
        };
        let mut old = self.tree[alternate].child;
        let mut previous: Option<FiberId> = None;
        while let Some(old_id) = old {
            let old_node = &self.tree[old_id];
            let node = WorkNode::reuse(
                old_id,
                old_node,
                Rc::clone(&old_node.props),
                parent,
                EffectKind::None,
            );
            old = old_node.sibling;
            let id = self.tree.insert(node);
            match previous {
                Some(previous) => self.tree[previous].sibling = Some(id),
                None => self.tree[parent].child = Some(id),
            }
            previous = Some(id);
        }
    }

    /// Positional diff of `elements` against the committed children of
    /// `parent`'s alternate.
    fn reconcile_children(&mut self, parent: FiberId, elements: &[Element]) {
        let mut old = self.tree[parent]
            .alternate
            .and_then(|alternate| self.tree[alternate].child);
        let mut previous: Option<FiberId> = None;
        let mut index = 0;

        while index < elements.len() || old.is_some() {
            let element = elements.get(index);
            let fresh = match (old, element) {
                (Some(old_id), Some(element)) if self.tree[old_id].tag.matches(element.ty()) => {
                    let old_node = &self.tree[old_id];
                    let effect = if Rc::ptr_eq(&old_node.props, element.props()) {
                        EffectKind::None
                    } else {
                        EffectKind::Update
                    };
                    let node =
                        WorkNode::reuse(old_id, old_node, Rc::clone(element.props()), parent, effect);
                    Some(self.tree.insert(node))
                }
                (old_id, Some(element)) => {
                    let mut node =
                        WorkNode::fabricate(element.ty().clone(), Rc::clone(element.props()), parent);
                    if let Some(old_id) = old_id {
                        if element.ty().is_host() && self.tree[old_id].kind() == NodeKind::HostNode {
                            node.replaces = Some(old_id);
                        }
                        self.tree[parent].effects.push(Effect {
                            node: old_id,
                            kind: EffectKind::Deletion,
                        });
                    }
                    Some(self.tree.insert(node))
                }
                (Some(old_id), None) => {
                    self.tree[parent].effects.push(Effect {
                        node: old_id,
                        kind: EffectKind::Deletion,
                    });
                    None
                }
                (None, None) => None,
            };

            if let Some(old_id) = old {
                old = self.tree[old_id].sibling;
            }
            if index == 0 {
                self.tree[parent].child = fresh;
            } else if let (Some(previous), Some(_)) = (previous, fresh) {
                self.tree[previous].sibling = fresh;
            }
            previous = fresh;
            index += 1;
        }
    }

    fn complete_work(&mut self, wip: &mut WorkInProgress, unit: FiberId) {
        let node = &mut self.tree[unit];
        if node.kind() == NodeKind::Component {
            if let Some(instance) = node.instance {
                wip.bindings.push((instance, unit));
            }
        }
        let mut effects = std::mem::take(&mut node.effects);
        if node.effect != EffectKind::None {
            effects.push(Effect {
                node: unit,
                kind: node.effect,
            });
        }
        match node.parent {
            Some(parent) => self.tree[parent].effects.append(&mut effects),
            None => node.effects = effects,
        }
    }

    /// Throws away the cycle in progress.
    pub(crate) fn abort(&mut self, wip: WorkInProgress) {
        for fiber in &wip.staged {
            if let Some(node) = self.tree.get_mut(*fiber) {
                node.pending_state = None;
            }
        }
        for instance in &wip.created {
            self.instances.remove(*instance);
        }
        let released = self.tree.release(wip.root_fiber);
        self.phase = Phase::Idle;
        debug!(
            "released {released} work nodes and {} new instances",
            wip.created.len()
        );
    }
}
