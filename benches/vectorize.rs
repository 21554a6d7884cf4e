use criterion::{black_box, criterion_group, criterion_main, Criterion};
use skel2vec::vectorize::trace::trace_graph;
use skel2vec::{vectorize_skeleton_with, BinaryImage, VectorizeConfig};

/// A floor-plan-like skeleton: an outer frame, a grid of interior walls
/// and a ring in every other room.
fn synthetic_plan(width: usize, height: usize) -> BinaryImage {
    let rooms_x = (width - 8) / 64;
    let rooms_y = (height - 8) / 64;
    let (x1, y1) = (4 + rooms_x * 64, 4 + rooms_y * 64);
    let on_grid = |x: usize, y: usize| {
        let in_frame = (4..=x1).contains(&x) && (4..=y1).contains(&y);
        in_frame && ((x - 4) % 64 == 0 || (y - 4) % 64 == 0)
    };
    let on_ring = |x: usize, y: usize| {
        if x < 4 || y < 4 || x > x1 || y > y1 {
            return false;
        }
        let (rx, ry) = ((x - 4) / 64, (y - 4) / 64);
        if (rx + ry) % 2 != 0 {
            return false;
        }
        let cx = 4.0 + rx as f64 * 64.0 + 32.0;
        let cy = 4.0 + ry as f64 * 64.0 + 32.0;
        let d = ((x as f64 - cx).powi(2) + (y as f64 - cy).powi(2)).sqrt();
        (d - 18.0).abs() < 0.5
    };
    BinaryImage::from_fn(width, height, |x, y| on_grid(x, y) || on_ring(x, y))
        .expect("valid bench image")
}

fn bench_vectorize(c: &mut Criterion) {
    let image = synthetic_plan(1024, 768);

    c.bench_function("skel2vec_trace_graph_1024x768", |b| {
        b.iter(|| {
            let g = trace_graph(black_box(&image));
            black_box((g.nodes.len(), g.edges.len()));
        });
    });

    let mut group = c.benchmark_group("skel2vec_vectorize_1024x768");
    group.sample_size(10);
    for parallel in [false, true] {
        let config = VectorizeConfig {
            parallel,
            ..VectorizeConfig::default()
        };
        let name = if parallel { "parallel" } else { "serial" };
        group.bench_function(name, |b| {
            b.iter(|| {
                let vectors = vectorize_skeleton_with(black_box(&image), black_box(&config));
                black_box(vectors.segment_count());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_vectorize);
criterion_main!(benches);
