use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fiber_core::{Element, HostNodeId, MemoryHost, Reconciler};
use fiber_testing::StepDeadline;

const SECTION_COUNT: usize = 4;
const ROWS_PER_SECTION: usize = 32;
const ROW_SAMPLES: &[usize] = &[8, 16, 32, 64];
const SLICE_STEPS: usize = 16;

fn content(sections: usize, rows_per_section: usize, generation: usize) -> Element {
    Element::host("main")
        .children((0..sections).map(|section| {
            Element::host("section")
                .child(format!("Section {section}"))
                .children((0..rows_per_section).map(|row| {
                    Element::host("div")
                        .attr("data-generation", generation as i64)
                        .child(format!("Item {section}-{row}"))
                        .child(
                            Element::host("span")
                                .child(format!("Detail {generation}"))
                                .build()
                                .expect("valid row detail"),
                        )
                        .build()
                        .expect("valid row")
                }))
                .build()
                .expect("valid section")
        }))
        .build()
        .expect("valid content")
}

fn node_count(sections: usize, rows_per_section: usize) -> usize {
    1 + sections * (2 + rows_per_section * 4)
}

struct Fixture {
    reconciler: Reconciler<MemoryHost>,
    container: HostNodeId,
    generation: usize,
}

impl Fixture {
    fn new() -> Self {
        let mut reconciler = Reconciler::new(MemoryHost::new());
        let container = reconciler.host_mut().create_container();
        Self {
            reconciler,
            container,
            generation: 0,
        }
    }

    fn render(&mut self, element: Element) {
        self.reconciler.render(element, &self.container);
        while self.reconciler.has_pending_work() {
            let status = self.reconciler.perform_work(&Duration::MAX).expect("work");
            black_box(status);
        }
        self.reconciler.host_mut().take_mutations();
    }

    fn next(&mut self, sections: usize, rows_per_section: usize) -> Element {
        self.generation += 1;
        content(sections, rows_per_section, self.generation)
    }
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_update");
    for &rows_per_section in ROW_SAMPLES {
        group.bench_with_input(
            BenchmarkId::new("host_nodes", node_count(SECTION_COUNT, rows_per_section)),
            &rows_per_section,
            |b, &rows_per_section| {
                let mut fixture = Fixture::new();
                let first = fixture.next(SECTION_COUNT, rows_per_section);
                fixture.render(first);

                b.iter(|| {
                    let element = fixture.next(SECTION_COUNT, rows_per_section);
                    fixture.render(element);
                });
            },
        );
    }
    group.finish();
}

fn bench_unchanged(c: &mut Criterion) {
    let mut fixture = Fixture::new();
    let element = content(SECTION_COUNT, ROWS_PER_SECTION, 0);
    fixture.render(element.clone());

    c.bench_function("reconcile_unchanged", |b| {
        b.iter(|| {
            fixture.render(element.clone());
        });
    });
}

fn bench_sliced(c: &mut Criterion) {
    let mut fixture = Fixture::new();
    let first = fixture.next(SECTION_COUNT, ROWS_PER_SECTION);
    fixture.render(first);

    c.bench_function("reconcile_sliced", |b| {
        b.iter(|| {
            let element = fixture.next(SECTION_COUNT, ROWS_PER_SECTION);
            fixture.reconciler.render(element, &fixture.container);
            let mut slices = 0usize;
            while fixture.reconciler.has_pending_work() {
                slices += 1;
                let status = fixture
                    .reconciler
                    .perform_work(&StepDeadline::new(SLICE_STEPS))
                    .expect("work");
                black_box(status);
            }
            black_box(slices);
        });
    });
}

criterion_group!(reconcile, bench_update, bench_unchanged, bench_sliced);
criterion_main!(reconcile);
