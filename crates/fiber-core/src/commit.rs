//! Commit phase: applies the effect list of a finished walk to the host in
//! one uninterrupted pass, then makes the new tree the committed one.

use std::rc::Rc;

use log::{debug, trace, warn};

use crate::collections::map::FastSet;
use crate::host::{HostAdapter, HostError, HostOperation};
use crate::reconciler::{AppliedEffect, CommitSummary, Phase, Reconciler, WorkInProgress};
use crate::work_tree::{Effect, EffectKind, FiberId, NodeKind};
use crate::ReconcileError;

impl<H: HostAdapter> Reconciler<H> {
    pub(crate) fn commit_all_work(
        &mut self,
        wip: WorkInProgress,
    ) -> Result<CommitSummary, ReconcileError> {
        self.phase = Phase::Committing;
        let effects = std::mem::take(&mut self.tree[wip.root_fiber].effects);
        let replaced: FastSet<FiberId> = effects
            .iter()
            .filter(|effect| effect.kind == EffectKind::Placement)
            .filter_map(|effect| self.tree[effect.node].replaces)
            .collect();

        let mut summary = CommitSummary::default();
        for (index, effect) in effects.iter().enumerate() {
            if let Err(err) = self.commit_work(effect, &replaced) {
                warn!("commit of {:?} failed: {err}", effect.kind);
                if index == 0 {
                    self.abort(wip);
                } else {
                    self.reset_root(wip);
                }
                return Err(err.into());
            }
            let node = &self.tree[effect.node];
            summary.push(AppliedEffect {
                kind: effect.kind,
                node: node.kind(),
                label: node.tag.label().to_string(),
            });
        }

        let unmounted = self.finish_commit(wip, &effects);
        debug!(
            "committed {} effects, unmounted {unmounted} instances",
            summary.len()
        );
        Ok(summary)
    }

    fn commit_work(&mut self, effect: &Effect, replaced: &FastSet<FiberId>) -> Result<(), HostError> {
        let node = &self.tree[effect.node];
        if node.kind() != NodeKind::HostNode {
            if effect.kind == EffectKind::Deletion && node.kind() == NodeKind::Component {
                return self.commit_deletion(effect.node);
            }
            return Ok(());
        }

        match effect.kind {
            EffectKind::Placement => {
                let parent = self.host_parent_handle(effect.node, HostOperation::AppendChild)?;
                let child = node
                    .host
                    .clone()
                    .ok_or_else(|| HostError::missing(HostOperation::AppendChild, &effect.node))?;
                let old = node
                    .replaces
                    .and_then(|old| self.tree.get(old))
                    .and_then(|old| old.host.clone());
                match old {
                    Some(old) => self.host.replace_child(&parent, &child, &old),
                    None => self.host.append_child(&parent, &child),
                }
            }
            EffectKind::Update => {
                let handle = node
                    .host
                    .clone()
                    .ok_or_else(|| HostError::missing(HostOperation::ApplyProperties, &effect.node))?;
                let previous = node
                    .alternate
                    .and_then(|alternate| self.tree.get(alternate))
                    .map(|alternate| Rc::clone(&alternate.props))
                    .unwrap_or_default();
                let next = Rc::clone(&node.props);
                self.host.apply_properties(&handle, &previous, &next)
            }
            EffectKind::Deletion if replaced.contains(&effect.node) => Ok(()),
            EffectKind::Deletion => self.commit_deletion(effect.node),
            EffectKind::None => Ok(()),
        }
    }

    /// Removes the topmost host nodes under the committed node `fiber`,
    /// descending through components, which own no host node of their own.
    fn commit_deletion(&mut self, fiber: FiberId) -> Result<(), HostError> {
        let parent = self.host_parent_handle(fiber, HostOperation::RemoveChild)?;
        let mut cursor = fiber;
        loop {
            let node = &self.tree[cursor];
            if node.kind() == NodeKind::Component {
                if let Some(child) = node.child {
                    cursor = child;
                    continue;
                }
            } else if let Some(handle) = node.host.clone() {
                self.host.remove_child(&parent, &handle)?;
            }

            while cursor != fiber && self.tree[cursor].sibling.is_none() {
                match self.tree[cursor].parent {
                    Some(parent) => cursor = parent,
                    None => return Ok(()),
                }
            }
            if cursor == fiber {
                return Ok(());
            }
            match self.tree[cursor].sibling {
                Some(sibling) => cursor = sibling,
                None => return Ok(()),
            }
        }
    }

    /// Forgets the committed tree of a root whose host was left half
    /// updated. The root's top-level host nodes are detached from the
    /// container and its instances unmounted, so the next update of the
    /// container starts from an empty tree.
    fn reset_root(&mut self, wip: WorkInProgress) {
        let root = wip.root;
        let container = self.roots[root.index()].container.clone();
        let previous = self.roots[root.index()].current;

        let mut handles: Vec<H::Handle> = Vec::new();
        for top in [Some(wip.root_fiber), previous].into_iter().flatten() {
            for id in self.tree.top_host_nodes(top) {
                if let Some(handle) = self.tree[id].host.clone() {
                    if !handles.contains(&handle) {
                        handles.push(handle);
                    }
                }
            }
        }

        self.abort(wip);
        if let Some(previous) = self.roots[root.index()].current.take() {
            self.tree.release(previous);
        }
        let mounted = self.instances.len();
        self.instances.retain(|_, instance| instance.root != root);
        let unmounted = mounted - self.instances.len();

        // Nodes never attached, or already freed by the failed pass, are
        // expected to be refused here.
        let mut detached = 0;
        for handle in &handles {
            match self.host.remove_child(&container, handle) {
                Ok(()) => detached += 1,
                Err(err) => trace!("left {handle:?} in place: {err}"),
            }
        }
        warn!(
            "reset root {root:?} after a partial commit: detached {detached} host nodes, unmounted {unmounted} instances"
        );
    }

    fn host_parent_handle(
        &self,
        fiber: FiberId,
        operation: HostOperation,
    ) -> Result<H::Handle, HostError> {
        self.tree
            .host_parent(fiber)
            .and_then(|parent| self.tree[parent].host.clone())
            .ok_or_else(|| HostError::Rejected {
                operation,
                reason: format!("no host parent for {fiber:?}"),
            })
    }

    /// Swaps the committed tree, applies staged instance changes and frees
    /// the previous tree. Returns the number of unmounted instances.
    fn finish_commit(&mut self, wip: WorkInProgress, effects: &[Effect]) -> usize {
        let mut unmounted = 0;
        for effect in effects.iter().filter(|effect| effect.kind == EffectKind::Deletion) {
            for id in self.tree.descendants(effect.node) {
                if let Some(instance) = self.tree[id].instance {
                    if self.instances.remove(instance).is_some() {
                        unmounted += 1;
                    }
                }
            }
        }

        for rendered in wip.rendered {
            if let Some(instance) = self.instances.get_mut(rendered.instance) {
                instance.props = rendered.props;
                instance.state = rendered.state;
            }
        }
        for (instance, fiber) in wip.bindings {
            if let Some(instance) = self.instances.get_mut(instance) {
                instance.fiber = Some(fiber);
            }
        }

        let previous = self.roots[wip.root.index()].current.replace(wip.root_fiber);
        if let Some(previous) = previous {
            self.tree.release(previous);
        }
        for id in self.tree.descendants(wip.root_fiber) {
            let node = &mut self.tree[id];
            node.alternate = None;
            node.replaces = None;
            node.pending_state = None;
            node.effect = EffectKind::None;
            node.effects.clear();
        }
        self.phase = Phase::Idle;
        unmounted
    }
}
