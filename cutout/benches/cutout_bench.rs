use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use cutout::geometry::Point;
use cutout::{
    ClipperKernel, CutoutCore, CutoutOptions, ExtentType, LayoutBuilder, LayoutDatabase,
};

/// 16 differential pairs over a tiled GND plane.
fn board() -> LayoutDatabase {
    let mut builder = LayoutBuilder::new("bench")
        .two_layer_stackup()
        .power_net("GND")
        .pad_definition("VIA", 4e-4, 4e-4, 2e-4);
    for tx in 0..8 {
        for ty in 0..8 {
            let (x, y) = (tx as f64 * 0.01, ty as f64 * 0.01);
            builder = builder
                .rectangle("GND", "BOTTOM", Point::new(x, y), Point::new(x + 0.0099, y + 0.0099))
                .via("GND", "VIA", Point::new(x + 0.005, y + 0.005), "TOP", "BOTTOM");
        }
    }
    for pair in 0..16 {
        let y = 0.02 + pair as f64 * 0.002;
        let (p, n) = (format!("D{}_P", pair), format!("D{}_N", pair));
        builder = builder
            .net(&p)
            .net(&n)
            .trace(&p, "TOP", &[Point::new(0.01, y), Point::new(0.05, y)], 1e-4)
            .trace(&n, "TOP", &[Point::new(0.01, y + 5e-4), Point::new(0.05, y + 5e-4)], 1e-4);
    }
    builder.build()
}

fn signals() -> Vec<String> {
    (0..4)
        .flat_map(|pair| [format!("D{}_P", pair), format!("D{}_N", pair)])
        .collect()
}

fn bench_compute_extent(c: &mut Criterion) {
    let db = board();
    let kernel = ClipperKernel::new();
    let references = vec!["GND".to_string()];
    for extent_type in [ExtentType::ConvexHull, ExtentType::BoundingBox, ExtentType::Conforming] {
        let options = CutoutOptions {
            extent_type,
            expansion_size: 0.001,
            ..Default::default()
        };
        c.bench_function(&format!("compute_extent_{}", extent_type), |b| {
            b.iter(|| {
                CutoutCore::compute_extent(
                    black_box(&db),
                    &kernel,
                    &signals(),
                    &references,
                    black_box(&options),
                )
            });
        });
    }
}

fn bench_cutout(c: &mut Criterion) {
    let db = board();
    let kernel = ClipperKernel::new();
    let references = vec!["GND".to_string()];
    for threads in [1, 4] {
        let options = CutoutOptions {
            expansion_size: 0.001,
            number_of_threads: threads,
            ..Default::default()
        };
        c.bench_function(&format!("cutout_{}_threads", threads), |b| {
            b.iter_batched(
                || db.clone(),
                |mut layout| {
                    CutoutCore::run(&mut layout, &kernel, &signals(), &references, &options)
                },
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(benches, bench_compute_extent, bench_cutout);
criterion_main!(benches);
