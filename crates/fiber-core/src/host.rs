use std::fmt;
use std::hash::Hash;

use crate::props::Props;

/// Boundary between the reconciler and the concrete node tree.
///
/// Handles are opaque to the reconciler. It only clones, compares and
/// hashes them, and hands them back to the adapter. Every operation is
/// invoked either while building new host nodes during the walk or while
/// committing; nothing reaches an already attached node outside a commit.
pub trait HostAdapter {
    type Handle: Clone + Eq + Hash + fmt::Debug;

    fn create_node(&mut self, tag: &str) -> Result<Self::Handle, HostError>;

    fn create_text_node(&mut self, text: &str) -> Result<Self::Handle, HostError>;

    /// Moves `node` from the `previous` property map to `next`.
    /// See [`crate::PropertyDelta`] for the expected ordering.
    fn apply_properties(
        &mut self,
        node: &Self::Handle,
        previous: &Props,
        next: &Props,
    ) -> Result<(), HostError>;

    fn append_child(&mut self, parent: &Self::Handle, child: &Self::Handle)
        -> Result<(), HostError>;

    /// Puts `new_child` where `old_child` currently sits and detaches `old_child`.
    fn replace_child(
        &mut self,
        parent: &Self::Handle,
        new_child: &Self::Handle,
        old_child: &Self::Handle,
    ) -> Result<(), HostError>;

    fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle)
        -> Result<(), HostError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostOperation {
    CreateNode,
    CreateTextNode,
    ApplyProperties,
    AppendChild,
    ReplaceChild,
    RemoveChild,
}

impl fmt::Display for HostOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostOperation::CreateNode => "create_node",
            HostOperation::CreateTextNode => "create_text_node",
            HostOperation::ApplyProperties => "apply_properties",
            HostOperation::AppendChild => "append_child",
            HostOperation::ReplaceChild => "replace_child",
            HostOperation::RemoveChild => "remove_child",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    MissingNode {
        operation: HostOperation,
        node: String,
    },
    NotAChild {
        operation: HostOperation,
        parent: String,
        child: String,
    },
    Rejected {
        operation: HostOperation,
        reason: String,
    },
}

impl HostError {
    pub fn missing(operation: HostOperation, node: &impl fmt::Debug) -> Self {
        HostError::MissingNode {
            operation,
            node: format!("{node:?}"),
        }
    }

    pub fn operation(&self) -> HostOperation {
        match self {
            HostError::MissingNode { operation, .. }
            | HostError::NotAChild { operation, .. }
            | HostError::Rejected { operation, .. } => *operation,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::MissingNode { operation, node } => {
                write!(f, "{operation}: node {node} missing")
            }
            HostError::NotAChild {
                operation,
                parent,
                child,
            } => write!(f, "{operation}: {child} is not a child of {parent}"),
            HostError::Rejected { operation, reason } => {
                write!(f, "{operation} rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for HostError {}
