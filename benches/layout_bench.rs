//! Benchmarks for the widget layout packer
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dashsync::layout::place;
use dashsync::model::{Widget, WidgetKind, WidgetPayload};

/// Mix of sizes; every third widget keeps a stored position
fn create_widgets(count: usize, columns: u32) -> Vec<Widget> {
    (0..count)
        .map(|i| {
            let w = (i as u32 % 3) + 1;
            let h = (i as u32 % 2) + 1;
            let widget = Widget::new(format!("w-{}", i), WidgetPayload::empty(WidgetKind::Memo))
                .size(w, h);
            if i % 3 == 0 {
                widget.at((i as u32 * 2) % columns, i as u32 / 2)
            } else {
                widget
            }
        })
        .collect()
}

fn bench_place(c: &mut Criterion) {
    let mut group = c.benchmark_group("place");

    for size in [10, 100, 1000] {
        let widgets = create_widgets(size, 6);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("desktop", size), &widgets, |b, widgets| {
            b.iter(|| place(black_box(widgets), 6))
        });
    }

    group.finish();
}

fn bench_column_change(c: &mut Criterion) {
    let widgets = place(&create_widgets(200, 6), 6);

    c.bench_function("shrink_6_to_2", |b| {
        b.iter(|| place(black_box(&widgets), 2))
    });

    c.bench_function("repack_stable", |b| {
        b.iter(|| place(black_box(&widgets), 6))
    });
}

criterion_group!(benches, bench_place, bench_column_change);
criterion_main!(benches);
