//! In-memory host adapter used by tests, benches and the demo.

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::host::{HostAdapter, HostError, HostOperation};
use crate::props::{
    Event, Listener, PropValue, PropertyDelta, PropertyOp, Props, StyleMap, NODE_VALUE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNodeId(usize);

impl HostNodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for HostNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node of the in-memory tree. Text nodes have no tag.
#[derive(Clone, Debug, Default)]
pub struct HostNode {
    tag: Option<Arc<str>>,
    text: String,
    attributes: IndexMap<Arc<str>, PropValue>,
    style: StyleMap,
    listeners: IndexMap<String, Listener>,
    children: Vec<HostNodeId>,
    parent: Option<HostNodeId>,
}

impl HostNode {
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.tag.is_none()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attribute(&self, name: &str) -> Option<&PropValue> {
        self.attributes.get(name)
    }

    pub fn style(&self, key: &str) -> Option<&str> {
        self.style.get(key).map(|value| value.as_ref())
    }

    pub fn has_listener(&self, event: &str) -> bool {
        self.listeners.contains_key(event)
    }

    pub fn children(&self) -> &[HostNodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<HostNodeId> {
        self.parent
    }
}

/// Host call recorded by [`MemoryHost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostMutation {
    Create { node: HostNodeId, label: String },
    Update { node: HostNodeId, ops: usize },
    Append { parent: HostNodeId, child: HostNodeId },
    Replace { parent: HostNodeId, new_child: HostNodeId, old_child: HostNodeId },
    Remove { parent: HostNodeId, child: HostNodeId },
}

/// In-memory host adapter.
///
/// Node ids are slot indices that are never reused: a freed slot stays
/// empty, so a stale handle fails with [`HostError::MissingNode`] instead of
/// reaching an unrelated node. The slot vector therefore only grows. Nodes
/// created by a walk that is later discarded are never attached and stay
/// allocated until the host is dropped.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<Option<HostNode>>,
    mutations: Vec<HostMutation>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached element node to render into.
    pub fn create_container(&mut self) -> HostNodeId {
        self.insert(HostNode {
            tag: Some(Arc::from("#container")),
            ..HostNode::default()
        })
    }

    pub fn node(&self, id: HostNodeId) -> Option<&HostNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn children(&self, id: HostNodeId) -> &[HostNodeId] {
        self.node(id).map(HostNode::children).unwrap_or_default()
    }

    pub fn parent(&self, id: HostNodeId) -> Option<HostNodeId> {
        self.node(id).and_then(HostNode::parent)
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mutations(&self) -> &[HostMutation] {
        &self.mutations
    }

    pub fn take_mutations(&mut self) -> Vec<HostMutation> {
        std::mem::take(&mut self.mutations)
    }

    /// Element nodes with `tag` below `root`, in document order.
    pub fn find_by_tag(&self, root: HostNodeId, tag: &str) -> Vec<HostNodeId> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            if id != root && node.tag() == Some(tag) {
                found.push(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        found
    }

    /// Concatenated text of all text nodes below `id`.
    pub fn text_content(&self, id: HostNodeId) -> String {
        let mut text = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            if node.is_text() {
                text.push_str(&node.text);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        text
    }

    /// Delivers an event to the listener registered on `id`, if any.
    pub fn dispatch(&self, id: HostNodeId, event: &Event) -> bool {
        let listener = self
            .node(id)
            .and_then(|node| node.listeners.get(event.kind()))
            .cloned();
        match listener {
            Some(listener) => {
                listener.call(event);
                true
            }
            None => false,
        }
    }

    pub fn dump_tree(&self, root: HostNodeId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: HostNodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.node(id) else {
            let _ = writeln!(output, "{indent}{id} (missing)");
            return;
        };
        match node.tag() {
            None => {
                let _ = writeln!(output, "{indent}{:?}", node.text);
            }
            Some(tag) => {
                let _ = write!(output, "{indent}<{tag}");
                for (name, value) in &node.attributes {
                    let _ = write!(output, " {name}=\"{value}\"");
                }
                if !node.style.is_empty() {
                    let style = PropValue::Style(node.style.clone().into());
                    let _ = write!(output, " style=\"{style}\"");
                }
                for event in node.listeners.keys() {
                    let _ = write!(output, " @{event}");
                }
                output.push_str(">\n");
            }
        }
        for child in &node.children {
            self.dump_node(output, *child, depth + 1);
        }
    }

    fn insert(&mut self, node: HostNode) -> HostNodeId {
        let id = HostNodeId(self.nodes.len());
        self.nodes.push(Some(node));
        id
    }

    fn node_mut(
        &mut self,
        id: HostNodeId,
        operation: HostOperation,
    ) -> Result<&mut HostNode, HostError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| HostError::missing(operation, &id))
    }

    fn position(
        &self,
        parent: HostNodeId,
        child: HostNodeId,
        operation: HostOperation,
    ) -> Result<usize, HostError> {
        let node = self
            .node(parent)
            .ok_or_else(|| HostError::missing(operation, &parent))?;
        node.children
            .iter()
            .position(|candidate| *candidate == child)
            .ok_or_else(|| HostError::NotAChild {
                operation,
                parent: parent.to_string(),
                child: child.to_string(),
            })
    }

    fn detach(&mut self, child: HostNodeId) {
        let Some(parent) = self.parent(child) else {
            return;
        };
        if let Some(Some(node)) = self.nodes.get_mut(parent.0) {
            node.children.retain(|candidate| *candidate != child);
        }
        if let Some(Some(node)) = self.nodes.get_mut(child.0) {
            node.parent = None;
        }
    }

    fn free(&mut self, id: HostNodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
    }
}

impl HostAdapter for MemoryHost {
    type Handle = HostNodeId;

    fn create_node(&mut self, tag: &str) -> Result<HostNodeId, HostError> {
        let id = self.insert(HostNode {
            tag: Some(Arc::from(tag)),
            ..HostNode::default()
        });
        self.mutations.push(HostMutation::Create {
            node: id,
            label: tag.to_string(),
        });
        Ok(id)
    }

    fn create_text_node(&mut self, text: &str) -> Result<HostNodeId, HostError> {
        let id = self.insert(HostNode {
            text: text.to_string(),
            ..HostNode::default()
        });
        self.mutations.push(HostMutation::Create {
            node: id,
            label: "#text".to_string(),
        });
        Ok(id)
    }

    fn apply_properties(
        &mut self,
        node: &HostNodeId,
        previous: &Props,
        next: &Props,
    ) -> Result<(), HostError> {
        let delta = PropertyDelta::between(previous, next);
        let ops = delta.len();
        let target = self.node_mut(*node, HostOperation::ApplyProperties)?;
        let is_text = target.is_text();
        for op in delta {
            match op {
                PropertyOp::RemoveListener { event, listener } => {
                    if target
                        .listeners
                        .get(&event)
                        .is_some_and(|current| current.ptr_eq(&listener))
                    {
                        target.listeners.shift_remove(&event);
                    }
                }
                PropertyOp::RemoveAttribute { name } => {
                    if is_text && name.as_ref() == NODE_VALUE {
                        target.text.clear();
                    } else {
                        target.attributes.shift_remove(&name);
                    }
                }
                PropertyOp::SetAttribute { name, value } => {
                    if is_text && name.as_ref() == NODE_VALUE {
                        target.text = value.to_string();
                    } else {
                        target.attributes.insert(name, value);
                    }
                }
                PropertyOp::SetStyle { key, value } => {
                    target.style.insert(key, value);
                }
                PropertyOp::RemoveStyle { key } => {
                    target.style.shift_remove(&key);
                }
                PropertyOp::AddListener { event, listener } => {
                    target.listeners.insert(event, listener);
                }
            }
        }
        self.mutations.push(HostMutation::Update { node: *node, ops });
        Ok(())
    }

    fn append_child(&mut self, parent: &HostNodeId, child: &HostNodeId) -> Result<(), HostError> {
        self.node_mut(*child, HostOperation::AppendChild)?;
        self.node_mut(*parent, HostOperation::AppendChild)?;
        self.detach(*child);
        self.node_mut(*parent, HostOperation::AppendChild)?
            .children
            .push(*child);
        self.node_mut(*child, HostOperation::AppendChild)?.parent = Some(*parent);
        self.mutations.push(HostMutation::Append {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: &HostNodeId,
        new_child: &HostNodeId,
        old_child: &HostNodeId,
    ) -> Result<(), HostError> {
        self.node_mut(*new_child, HostOperation::ReplaceChild)?;
        self.position(*parent, *old_child, HostOperation::ReplaceChild)?;
        self.detach(*new_child);
        let index = self.position(*parent, *old_child, HostOperation::ReplaceChild)?;
        self.node_mut(*parent, HostOperation::ReplaceChild)?.children[index] = *new_child;
        self.node_mut(*new_child, HostOperation::ReplaceChild)?.parent = Some(*parent);
        self.free(*old_child);
        self.mutations.push(HostMutation::Replace {
            parent: *parent,
            new_child: *new_child,
            old_child: *old_child,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &HostNodeId, child: &HostNodeId) -> Result<(), HostError> {
        let index = self.position(*parent, *child, HostOperation::RemoveChild)?;
        self.node_mut(*parent, HostOperation::RemoveChild)?
            .children
            .remove(index);
        self.free(*child);
        self.mutations.push(HostMutation::Remove {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }
}
