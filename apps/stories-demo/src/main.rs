use fiber_core::{
    Component, Element, Event, HostNodeId, MemoryHost, Props, Reconciler, RenderContext,
    RenderError, State,
};
use fiber_runtime_std::StdRuntime;

const STORIES: &[(&str, i64)] = &[
    ("Didact: a DIY guide to build your own React", 193),
    ("The Rust borrow checker, explained", 42),
    ("Incremental rendering with fibers", 7),
];

/// Root component: a list of stories.
struct App;

impl Component for App {
    fn create(_props: &Props) -> Self {
        App
    }

    fn render(&mut self, cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
        let title = cx.props().get_str("title").unwrap_or("Stories");
        let mut list = Element::host("ul");
        for (name, likes) in STORIES {
            list = list.child(
                Element::component::<Story>()
                    .attr("name", *name)
                    .attr("likes", *likes)
                    .build()?,
            );
        }
        Ok(vec![Element::host("div")
            .child(Element::host("h1").child(title.to_string()).build()?)
            .child(list.build()?)
            .build()?])
    }
}

/// One story with a like button.
struct Story;

impl Component for Story {
    fn create(_props: &Props) -> Self {
        Story
    }

    fn initial_state(props: &Props) -> State {
        State::new().with("likes", props.get_int("likes").unwrap_or_default())
    }

    fn render(&mut self, cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError> {
        let likes = cx.state().get_int("likes").unwrap_or_default();
        let name = cx.props().get_str("name").unwrap_or_default();
        let updater = cx.updater();
        Ok(vec![Element::host("li")
            .child(
                Element::host("button")
                    .style("border", "none")
                    .on("click", move |_| {
                        updater.request_state_update(State::new().with("likes", likes + 1));
                    })
                    .child(format!("{likes} \u{2764}"))
                    .build()?,
            )
            .child(Element::host("a").attr("href", "#").child(name.to_string()).build()?)
            .build()?])
    }
}

fn like(reconciler: &Reconciler<MemoryHost>, container: HostNodeId, index: usize) -> bool {
    let host = reconciler.host();
    match host.find_by_tag(container, "button").get(index) {
        Some(button) => host.dispatch(*button, &Event::new("click")),
        None => false,
    }
}

fn main() {
    env_logger::init();

    println!("=== Fiber Stories Example ===");

    let runtime = StdRuntime::new();
    let mut reconciler = runtime.reconciler(MemoryHost::new());
    let container = reconciler.host_mut().create_container();

    let app = match Element::component::<App>().attr("title", "Stories").build() {
        Ok(app) => app,
        Err(err) => {
            log::error!("invalid root element: {err}");
            return;
        }
    };
    reconciler.render(app, &container);
    let report = runtime.run_until_idle(&mut reconciler);
    println!(
        "initial render: {} slices, {} commits",
        report.slices, report.commits
    );
    print!("{}", reconciler.host().dump_tree(container));

    for (index, clicks) in [(0, 2), (2, 1)] {
        for _ in 0..clicks {
            if !like(&reconciler, container, index) {
                log::warn!("no like button at index {index}");
            }
            let report = runtime.run_until_idle(&mut reconciler);
            for err in &report.errors {
                log::error!("like failed: {err}");
            }
        }
    }

    println!("after likes:");
    print!("{}", reconciler.host().dump_tree(container));
    if let Some(work) = reconciler.dump_tree(&container) {
        println!("work tree:");
        print!("{work}");
    }
    println!("host mutations: {}", reconciler.host().mutations().len());
}
