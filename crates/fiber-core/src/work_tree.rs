//! Arena-backed work tree.
//!
//! Nodes link to their parent, first child and next sibling. A node built
//! during a work cycle also points at its `alternate`, the committed node it
//! was derived from. Committed nodes are never mutated by the walk, apart
//! from carrying a staged state update down to the work-in-progress copy.

use std::ops::{Index, IndexMut};
use std::rc::Rc;

use slotmap::SlotMap;

use crate::component::{InstanceId, State};
use crate::element::ElementType;
use crate::props::Props;

slotmap::new_key_type! {
    /// Key of a node in the work tree arena.
    pub struct FiberId;
}

/// Index of a registered root container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RootId(usize);

impl RootId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Coarse kind of a work node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Wraps a container supplied by the caller.
    HostRoot,
    /// Element or text backed by a host node.
    HostNode,
    Component,
}

impl NodeKind {
    pub fn is_host(self) -> bool {
        !matches!(self, NodeKind::Component)
    }
}

/// Mutation a node requires at commit time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EffectKind {
    #[default]
    None,
    Placement,
    Update,
    Deletion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Effect {
    pub(crate) node: FiberId,
    pub(crate) kind: EffectKind,
}

#[derive(Clone, Debug)]
pub(crate) enum FiberTag {
    Root,
    Element(ElementType),
}

impl FiberTag {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            FiberTag::Root => NodeKind::HostRoot,
            FiberTag::Element(ElementType::Component(_)) => NodeKind::Component,
            FiberTag::Element(_) => NodeKind::HostNode,
        }
    }

    pub(crate) fn matches(&self, ty: &ElementType) -> bool {
        matches!(self, FiberTag::Element(own) if own == ty)
    }

    pub(crate) fn label(&self) -> &str {
        match self {
            FiberTag::Root => "#root",
            FiberTag::Element(ty) => ty.label(),
        }
    }
}

pub(crate) struct WorkNode<Handle> {
    pub(crate) tag: FiberTag,
    pub(crate) props: Rc<Props>,
    pub(crate) host: Option<Handle>,
    pub(crate) instance: Option<InstanceId>,
    /// Partial state waiting to be merged by the next render of `instance`.
    pub(crate) pending_state: Option<State>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) alternate: Option<FiberId>,
    /// Committed host node this placement takes the position of.
    pub(crate) replaces: Option<FiberId>,
    pub(crate) effect: EffectKind,
    pub(crate) effects: Vec<Effect>,
}

impl<Handle: Clone> WorkNode<Handle> {
    pub(crate) fn root(container: Handle, props: Rc<Props>, alternate: Option<FiberId>) -> Self {
        Self {
            tag: FiberTag::Root,
            props,
            host: Some(container),
            instance: None,
            pending_state: None,
            parent: None,
            child: None,
            sibling: None,
            alternate,
            replaces: None,
            effect: EffectKind::None,
            effects: Vec::new(),
        }
    }

    /// Node for an element with no committed counterpart.
    pub(crate) fn fabricate(ty: ElementType, props: Rc<Props>, parent: FiberId) -> Self {
        Self {
            tag: FiberTag::Element(ty),
            props,
            host: None,
            instance: None,
            pending_state: None,
            parent: Some(parent),
            child: None,
            sibling: None,
            alternate: None,
            replaces: None,
            effect: EffectKind::Placement,
            effects: Vec::new(),
        }
    }

    /// Copy of the committed node `old`, keeping its host node and instance.
    pub(crate) fn reuse(
        old_id: FiberId,
        old: &WorkNode<Handle>,
        props: Rc<Props>,
        parent: FiberId,
        effect: EffectKind,
    ) -> Self {
        Self {
            tag: old.tag.clone(),
            props,
            host: old.host.clone(),
            instance: old.instance,
            pending_state: old.pending_state.clone(),
            parent: Some(parent),
            child: None,
            sibling: None,
            alternate: Some(old_id),
            replaces: None,
            effect,
            effects: Vec::new(),
        }
    }
}

impl<Handle> WorkNode<Handle> {
    pub(crate) fn kind(&self) -> NodeKind {
        self.tag.kind()
    }
}

pub(crate) struct WorkTree<Handle> {
    nodes: SlotMap<FiberId, WorkNode<Handle>>,
}

impl<Handle> WorkTree<Handle> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    pub(crate) fn insert(&mut self, node: WorkNode<Handle>) -> FiberId {
        self.nodes.insert(node)
    }

    pub(crate) fn get(&self, id: FiberId) -> Option<&WorkNode<Handle>> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut WorkNode<Handle>> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Visits `root` and every node below it, parents before children.
    /// Siblings of `root` itself are not visited.
    pub(crate) fn descendants(&self, root: FiberId) -> Vec<FiberId> {
        let mut visited = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            visited.push(id);
            if id != root {
                if let Some(sibling) = node.sibling {
                    stack.push(sibling);
                }
            }
            if let Some(child) = node.child {
                stack.push(child);
            }
        }
        visited
    }

    /// Frees `root` and its subtree.
    pub(crate) fn release(&mut self, root: FiberId) -> usize {
        let ids = self.descendants(root);
        for id in &ids {
            self.nodes.remove(*id);
        }
        ids.len()
    }

    /// Nearest ancestor of `id` that owns a host node.
    pub(crate) fn host_parent(&self, id: FiberId) -> Option<FiberId> {
        let mut cursor = self.nodes.get(id)?.parent;
        while let Some(parent) = cursor {
            let node = self.nodes.get(parent)?;
            if node.kind().is_host() {
                return Some(parent);
            }
            cursor = node.parent;
        }
        None
    }

    /// Nearest host nodes below `id`, descending through components, in
    /// document order.
    pub(crate) fn top_host_nodes(&self, id: FiberId) -> Vec<FiberId> {
        let mut found = Vec::new();
        let mut stack: Vec<FiberId> = self.children(id).collect();
        stack.reverse();
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if node.kind() == NodeKind::Component {
                let mut children: Vec<FiberId> = self.children(current).collect();
                children.reverse();
                stack.extend(children);
            } else {
                found.push(current);
            }
        }
        found
    }

    pub(crate) fn children(&self, id: FiberId) -> impl Iterator<Item = FiberId> + '_ {
        let first = self.nodes.get(id).and_then(|node| node.child);
        std::iter::successors(first, move |current| {
            self.nodes.get(*current).and_then(|node| node.sibling)
        })
    }
}

impl<Handle> Index<FiberId> for WorkTree<Handle> {
    type Output = WorkNode<Handle>;

    fn index(&self, id: FiberId) -> &Self::Output {
        &self.nodes[id]
    }
}

impl<Handle> IndexMut<FiberId> for WorkTree<Handle> {
    fn index_mut(&mut self, id: FiberId) -> &mut Self::Output {
        &mut self.nodes[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn host(tag: &str) -> ElementType {
        ElementType::Host(Arc::from(tag))
    }

    fn link(tree: &mut WorkTree<u32>, parent: FiberId, ty: ElementType) -> FiberId {
        let id = tree.insert(WorkNode::fabricate(ty, Rc::new(Props::new()), parent));
        let last = tree.children(parent).last();
        match last {
            Some(last) => tree[last].sibling = Some(id),
            None => tree[parent].child = Some(id),
        }
        id
    }

    #[test]
    fn release_frees_subtree_but_not_root_siblings() {
        let mut tree = WorkTree::new();
        let root = tree.insert(WorkNode::root(0u32, Rc::new(Props::new()), None));
        let list = link(&mut tree, root, host("ul"));
        let first = link(&mut tree, list, host("li"));
        link(&mut tree, list, host("li"));
        link(&mut tree, first, ElementType::Text);
        let footer = link(&mut tree, root, host("footer"));

        assert_eq!(tree.len(), 6);
        assert_eq!(tree.release(list), 4);
        assert_eq!(tree.len(), 2);
        assert!(tree.get(footer).is_some());
        assert!(tree.get(first).is_none());
    }

    #[test]
    fn host_parent_skips_component_nodes() {
        struct Panel;
        impl crate::component::Component for Panel {
            fn create(_props: &Props) -> Self {
                Panel
            }
            fn render(
                &mut self,
                _cx: &crate::component::RenderContext<'_>,
            ) -> Result<Vec<crate::element::Element>, crate::component::RenderError> {
                Ok(Vec::new())
            }
        }

        let mut tree = WorkTree::new();
        let root = tree.insert(WorkNode::root(0u32, Rc::new(Props::new()), None));
        let panel = link(
            &mut tree,
            root,
            ElementType::Component(crate::component::ComponentType::of::<Panel>()),
        );
        let text = link(&mut tree, panel, ElementType::Text);

        assert_eq!(tree.host_parent(text), Some(root));
        assert_eq!(tree[panel].kind(), NodeKind::Component);
        assert_eq!(tree[root].tag.label(), "#root");
    }

    #[test]
    fn top_host_nodes_look_through_components() {
        struct Group;
        impl crate::component::Component for Group {
            fn create(_props: &Props) -> Self {
                Group
            }
            fn render(
                &mut self,
                _cx: &crate::component::RenderContext<'_>,
            ) -> Result<Vec<crate::element::Element>, crate::component::RenderError> {
                Ok(Vec::new())
            }
        }
        let group = || ElementType::Component(crate::component::ComponentType::of::<Group>());

        let mut tree = WorkTree::new();
        let root = tree.insert(WorkNode::root(0u32, Rc::new(Props::new()), None));
        let header = link(&mut tree, root, host("header"));
        let outer = link(&mut tree, root, group());
        let inner = link(&mut tree, outer, group());
        let first = link(&mut tree, inner, host("p"));
        link(&mut tree, first, ElementType::Text);
        let second = link(&mut tree, outer, host("p"));
        link(&mut tree, root, group());
        let footer = link(&mut tree, root, host("footer"));

        assert_eq!(
            tree.top_host_nodes(root),
            vec![header, first, second, footer]
        );
        assert_eq!(tree.top_host_nodes(first).len(), 1);
    }
}
