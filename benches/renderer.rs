use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use fishbone_rs::config::{LayoutConfig, RenderConfig};
use fishbone_rs::ir::Tree;
use fishbone_rs::layout::{FishboneLayout, LayoutOptions, Size, build_graph, compute_layout};
use fishbone_rs::parser::parse_fishbone;
use fishbone_rs::render::render_svg;
use fishbone_rs::theme::Theme;
use std::hint::black_box;

/// Outline source with `branches` root causes, each `depth` levels deep and
/// `fan_out` children wide below the first generation.
fn outline_source(branches: usize, fan_out: usize, depth: usize) -> String {
    fn push_level(out: &mut String, prefix: &str, level: usize, fan_out: usize, depth: usize) {
        if level > depth {
            return;
        }
        for i in 0..fan_out {
            let label = format!("{prefix}.{i}");
            out.push_str(&"  ".repeat(level));
            out.push_str(&format!("- Cause {label}\n"));
            push_level(out, &label, level + 1, fan_out, depth);
        }
    }

    let mut out = String::from("fishbone\nEffect\n");
    for b in 0..branches {
        out.push_str(&format!("  - Branch {b}\n"));
        push_level(&mut out, &b.to_string(), 2, fan_out, depth);
    }
    out
}

fn tree(branches: usize, fan_out: usize, depth: usize) -> Tree {
    parse_fishbone(&outline_source(branches, fan_out, depth))
        .expect("parse failed")
        .tree
}

fn sizes() -> [(&'static str, usize, usize, usize); 3] {
    [("small", 4, 2, 2), ("medium", 6, 3, 3), ("large", 8, 3, 4)]
}

fn layout_config() -> LayoutConfig {
    LayoutConfig {
        fast_text_metrics: true,
        ..LayoutConfig::default()
    }
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for (name, branches, fan_out, depth) in sizes() {
        let input = outline_source(branches, fan_out, depth);
        group.bench_with_input(BenchmarkId::from_parameter(name), &input, |b, data| {
            b.iter(|| {
                let parsed = parse_fishbone(black_box(data)).expect("parse failed");
                black_box(parsed.tree.len());
            });
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_graph");
    for (name, branches, fan_out, depth) in sizes() {
        let tree = tree(branches, fan_out, depth);
        group.bench_with_input(BenchmarkId::from_parameter(name), &tree, |b, tree| {
            b.iter(|| {
                let graph = build_graph(black_box(tree)).expect("build failed");
                black_box(graph.links.len());
            });
        });
    }
    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation");
    for (name, branches, fan_out, depth) in sizes() {
        let tree = tree(branches, fan_out, depth);
        group.bench_with_input(BenchmarkId::from_parameter(name), &tree, |b, tree| {
            b.iter(|| {
                let mut layout = FishboneLayout::build(
                    black_box(tree),
                    Size::new(1200.0, 800.0),
                    LayoutOptions::default(),
                )
                .expect("build failed");
                layout.run_to_end();
                black_box(layout.iterations());
            });
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let theme = Theme::classic();
    let config = layout_config();
    let render = RenderConfig::default();
    for (name, branches, fan_out, depth) in sizes() {
        let layout =
            compute_layout(&tree(branches, fan_out, depth), &theme, &config).expect("layout failed");
        group.bench_with_input(BenchmarkId::from_parameter(name), &layout, |b, layout| {
            b.iter(|| {
                let svg = render_svg(black_box(layout), &theme, &config, &render);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    let theme = Theme::modern();
    let config = layout_config();
    let render = RenderConfig::default();
    for (name, branches, fan_out, depth) in sizes() {
        let input = outline_source(branches, fan_out, depth);
        group.bench_with_input(BenchmarkId::from_parameter(name), &input, |b, data| {
            b.iter(|| {
                let parsed = parse_fishbone(black_box(data)).expect("parse failed");
                let layout =
                    compute_layout(&parsed.tree, &theme, &config).expect("layout failed");
                let svg = render_svg(&layout, &theme, &config, &render);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_parse, bench_build, bench_simulation, bench_render, bench_end_to_end
);
criterion_main!(benches);
