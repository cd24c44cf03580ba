use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use fiber_core::{
    Component, EffectKind, Element, MemoryHost, PropValue, Props, Reconciler, RenderContext,
    RenderError, State, WorkStatus,
};
use fiber_testing::Harness;

type Counter = Rc<Cell<usize>>;

fn bump(props: &Props, key: &str) {
    if let Some(counter) = props.get(key).and_then(PropValue::downcast_data::<Counter>) {
        counter.set(counter.get() + 1);
    }
}

struct Story;

impl Component for Story {
    fn create(_props: &Props) -> Self {
        Story
    }

    fn initial_state(props: &Props) -> State {
        State::new()
            .with("likes", props.get_int("likes").unwrap_or_default())
            .with("unit", "likes")
    }

    fn render(&mut self, cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
        let likes = cx.state().get_int("likes").unwrap_or_default();
        let unit = cx.state().get_str("unit").unwrap_or_default();
        let name = cx.props().get_str("name").unwrap_or_default();
        let updater = cx.updater();
        Ok(vec![Element::host("li")
            .child(Element::host("span").child(name.to_string()).build()?)
            .child(
                Element::host("button")
                    .on("click", move |_| {
                        updater.request_state_update(State::new().with("likes", likes + 1));
                    })
                    .child(format!("{likes} {unit}"))
                    .build()?,
            )
            .build()?])
    }
}

fn stories(entries: &[(&str, i64)]) -> Element {
    Element::host("ul")
        .children(entries.iter().map(|(name, likes)| {
            Element::component::<Story>()
                .attr("name", *name)
                .attr("likes", *likes)
                .build()
                .expect("valid element")
        }))
        .build()
        .expect("valid element")
}

#[test]
fn clicking_merges_partial_state() {
    let mut harness = Harness::new();
    harness.render(stories(&[("fibers", 5), ("rust", 2)]));
    harness.flush();
    assert_eq!(harness.text(), "fibers5 likesrust2 likes");

    assert!(harness.click("button", 0));
    let report = harness.flush();
    let summary = report.only_commit();

    assert_eq!(harness.text(), "fibers6 likesrust2 likes");
    assert_eq!(summary.count(EffectKind::Placement), 0);
    assert_eq!(summary.count(EffectKind::Deletion), 0);
    assert_eq!(harness.reconciler().mounted_instances(), 2);
}

#[test]
fn repeated_clicks_accumulate() {
    let mut harness = Harness::new();
    harness.render(stories(&[("fibers", 0)]));
    harness.flush();

    for _ in 0..3 {
        assert!(harness.click("button", 0));
        harness.flush();
    }
    assert_eq!(harness.text(), "fibers3 likes");
}

/// Renders a button plus two children: one element built once, one rebuilt
/// on every render.
struct Parent {
    stable: Element,
}

impl Component for Parent {
    fn create(props: &Props) -> Self {
        let mut child = Element::component::<Child>();
        if let Some(counter) = props.get("stable") {
            child = child.attr("renders", counter.clone());
        }
        Parent {
            stable: child.build().unwrap_or_else(|_| Element::text("invalid")),
        }
    }

    fn render(&mut self, cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
        bump(cx.props(), "parent");
        let tick = cx.state().get_int("tick").unwrap_or_default();
        let updater = cx.updater();
        let mut fresh = Element::component::<Child>();
        if let Some(counter) = cx.props().get("fresh") {
            fresh = fresh.attr("renders", counter.clone());
        }
        Ok(vec![
            Element::host("button")
                .on("click", move |_| {
                    updater.request_state_update(State::new().with("tick", tick + 1));
                })
                .build()?,
            self.stable.clone(),
            fresh.build()?,
        ])
    }
}

struct Child;

impl Component for Child {
    fn create(_props: &Props) -> Self {
        Child
    }

    fn render(&mut self, cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
        bump(cx.props(), "renders");
        Ok(vec![Element::text("c")])
    }
}

#[test]
fn unchanged_children_skip_rendering() {
    let parent: Counter = Rc::default();
    let stable: Counter = Rc::default();
    let fresh: Counter = Rc::default();
    let mut harness = Harness::new();
    harness.render(
        Element::component::<Parent>()
            .attr("parent", PropValue::data(Rc::clone(&parent)))
            .attr("stable", PropValue::data(Rc::clone(&stable)))
            .attr("fresh", PropValue::data(Rc::clone(&fresh)))
            .build()
            .expect("valid element"),
    );
    harness.flush();
    assert_eq!((parent.get(), stable.get(), fresh.get()), (1, 1, 1));

    assert!(harness.click("button", 0));
    harness.flush();
    assert_eq!((parent.get(), stable.get(), fresh.get()), (2, 1, 2));
}

#[test]
fn rerendering_the_same_root_element_skips_components() {
    let parent: Counter = Rc::default();
    let mut harness = Harness::new();
    let root = Element::component::<Parent>()
        .attr("parent", PropValue::data(Rc::clone(&parent)))
        .build()
        .expect("valid element");
    harness.render(root.clone());
    harness.flush();
    harness.render(root);
    let report = harness.flush();

    assert_eq!(parent.get(), 1);
    assert!(report.only_commit().is_empty());
}

struct Pair;

impl Component for Pair {
    fn create(_props: &Props) -> Self {
        Pair
    }

    fn render(&mut self, _cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
        Ok(vec![
            Element::host("li").child("a").build()?,
            Element::host("li").child("b").build()?,
        ])
    }
}

struct Wrapper;

impl Component for Wrapper {
    fn create(_props: &Props) -> Self {
        Wrapper
    }

    fn render(&mut self, _cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
        Ok(vec![Element::component::<Pair>().build()?])
    }
}

#[test]
fn deleting_nested_components_removes_all_their_host_nodes() {
    let mut harness = Harness::new();
    harness.render(
        Element::host("ul")
            .child(Element::component::<Wrapper>().build().expect("valid element"))
            .child(Element::host("li").child("z").build().expect("valid element"))
            .build()
            .expect("valid element"),
    );
    harness.flush();
    assert_eq!(harness.find("li").len(), 3);
    assert_eq!(harness.reconciler().mounted_instances(), 2);

    harness.render(Element::host("ul").build().expect("valid element"));
    let report = harness.flush();

    assert_eq!(report.only_commit().count(EffectKind::Deletion), 2);
    assert!(harness.find("li").is_empty());
    assert_eq!(harness.reconciler().mounted_instances(), 0);
    assert_eq!(harness.snapshot(), "<#container>\n  <ul>\n");
}

struct Maybe;

impl Component for Maybe {
    fn create(_props: &Props) -> Self {
        Maybe
    }

    fn render(&mut self, cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
        if cx.props().get_bool("show").unwrap_or(false) {
            Ok(vec![Element::host("li").child("shown").build()?])
        } else {
            Ok(Vec::new())
        }
    }
}

fn maybe(show: bool) -> Element {
    Element::host("ul")
        .child(
            Element::component::<Maybe>()
                .attr("show", show)
                .build()
                .expect("valid element"),
        )
        .build()
        .expect("valid element")
}

#[test]
fn components_may_render_nothing() {
    let mut harness = Harness::new();
    harness.render(maybe(false));
    harness.flush();
    assert!(harness.find("li").is_empty());
    assert_eq!(harness.reconciler().mounted_instances(), 1);

    harness.render(maybe(true));
    harness.flush();
    assert_eq!(harness.text(), "shown");

    harness.render(maybe(false));
    harness.flush();
    assert!(harness.find("li").is_empty());

    harness.render(Element::host("ul").build().expect("valid element"));
    let report = harness.flush();
    assert!(report.is_clean());
    assert_eq!(harness.reconciler().mounted_instances(), 0);
}

#[test]
fn containers_keep_separate_trees() {
    let mut reconciler = Reconciler::new(MemoryHost::new());
    let left = reconciler.host_mut().create_container();
    let right = reconciler.host_mut().create_container();
    reconciler.render(stories(&[("left", 1)]), &left);
    reconciler.render(stories(&[("right", 2), ("more", 3)]), &right);

    let mut commits = 0;
    while reconciler.has_pending_work() {
        if let WorkStatus::Committed(_) = reconciler.perform_work(&Duration::MAX).expect("work") {
            commits += 1;
        }
    }

    assert_eq!(commits, 2);
    assert_eq!(reconciler.host().text_content(left), "left1 likes");
    assert_eq!(reconciler.host().text_content(right), "right2 likesmore3 likes");
    assert_eq!(reconciler.mounted_instances(), 3);
    assert_ne!(reconciler.dump_tree(&left), reconciler.dump_tree(&right));

    reconciler.render(Element::host("ul").build().expect("valid element"), &right);
    reconciler.perform_work(&Duration::MAX).expect("work");
    assert_eq!(reconciler.host().text_content(left), "left1 likes");
    assert_eq!(reconciler.mounted_instances(), 1);
}
