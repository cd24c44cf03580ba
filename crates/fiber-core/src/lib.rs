#![doc = r"Incremental fiber reconciliation engine with an interruptible work loop."]

pub mod collections;
pub mod component;
pub mod element;
pub mod host;
pub mod memory_host;
pub mod platform;
pub mod props;
pub mod reconciler;
pub mod runtime;
pub mod work_tree;

mod commit;

pub use component::{
    Component, ComponentType, InstanceId, RenderContext, RenderError, State, StateUpdater,
};
pub use element::{Element, ElementBuilder, ElementError, ElementType};
pub use host::{HostAdapter, HostError, HostOperation};
pub use memory_host::{HostMutation, HostNode, HostNodeId, MemoryHost};
pub use platform::{CallbackScheduler, Deadline};
pub use props::{Event, Listener, PropValue, PropertyDelta, PropertyOp, Props, StyleMap};
pub use reconciler::{
    AppliedEffect, CommitSummary, Phase, Reconciler, ReconcilerOptions, WorkStatus,
};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use work_tree::{EffectKind, FiberId, NodeKind, RootId};

use std::fmt;

/// Failure of a work cycle. The cycle's work is discarded when one occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    ComponentRender {
        component: &'static str,
        source: RenderError,
    },
    HostAdapter(HostError),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::ComponentRender { component, source } => {
                write!(f, "render of {component} failed: {source}")
            }
            ReconcileError::HostAdapter(err) => write!(f, "host adapter failed: {err}"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::ComponentRender { source, .. } => Some(source),
            ReconcileError::HostAdapter(err) => Some(err),
        }
    }
}

impl From<HostError> for ReconcileError {
    fn from(err: HostError) -> Self {
        ReconcileError::HostAdapter(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    struct Greeting;

    impl Component for Greeting {
        fn create(_props: &Props) -> Self {
            Greeting
        }

        fn render(&mut self, cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
            let name = cx.props().get_str("name").unwrap_or("world");
            Ok(vec![Element::host("p")
                .child(format!("hello {name}"))
                .build()?])
        }
    }

    fn mount(reconciler: &mut Reconciler<MemoryHost>, element: Element) -> HostNodeId {
        let container = reconciler.host_mut().create_container();
        reconciler.render(element, &container);
        container
    }

    #[test]
    fn first_render_commits_placements() {
        let mut reconciler = Reconciler::new(MemoryHost::new());
        let element = Element::host("div")
            .attr("id", "app")
            .child(Element::component::<Greeting>().attr("name", "fiber").build().expect("valid"))
            .build()
            .expect("valid");
        let container = mount(&mut reconciler, element);

        let status = reconciler.perform_work(&std::time::Duration::MAX).expect("work");
        let summary = match status {
            WorkStatus::Committed(summary) => summary,
            other => panic!("expected a commit, got {other:?}"),
        };
        assert_eq!(
            summary.describe(),
            vec![
                "Placement #text",
                "Placement p",
                "Placement Greeting",
                "Placement div"
            ]
        );
        assert_eq!(
            reconciler.host().dump_tree(container),
            "<#container>\n  <div id=\"app\">\n    <p>\n      \"hello fiber\"\n"
        );
        assert_eq!(
            reconciler.dump_tree(&container).as_deref(),
            Some("#root\n  div\n    Greeting\n      p\n        #text \"hello fiber\"\n")
        );
        assert_eq!(reconciler.mounted_instances(), 1);
        assert_eq!(reconciler.work_node_count(), 5);
        assert_eq!(reconciler.phase(), Phase::Idle);
    }

    #[test]
    fn empty_queue_is_idle() {
        let mut reconciler = Reconciler::new(MemoryHost::new());
        let status = reconciler.perform_work(&std::time::Duration::MAX).expect("work");
        assert_eq!(status, WorkStatus::Idle);
        assert!(!reconciler.has_pending_work());
    }

    #[test]
    fn render_errors_name_the_component() {
        let err = ReconcileError::ComponentRender {
            component: "Story",
            source: RenderError::new("boom"),
        };
        assert_eq!(err.to_string(), "render of Story failed: boom");
        assert!(err.source().is_some());
        let host: ReconcileError = HostError::Rejected {
            operation: HostOperation::AppendChild,
            reason: "full".into(),
        }
        .into();
        assert_eq!(
            host.to_string(),
            "host adapter failed: append_child rejected: full"
        );
    }
}
