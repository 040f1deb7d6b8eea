use criterion::{criterion_group, criterion_main, Criterion, black_box};

use greyhound_loader::cloud::{DimensionDescriptor, PointBatch, PointCloud, PointRecord, Sample};
use greyhound_loader::convert::{ColorDepth, PointRecordConverter};
use greyhound_loader::math::Bounds;
use greyhound_loader::streaming::{DownloadMethod, SubdivisionPlanner};
use greyhound_loader::wire::{decode_read_response, encode_read_response};

fn autzen_like_batch(n: usize) -> PointBatch {
    let schema = vec![
        DimensionDescriptor::floating("X", 8),
        DimensionDescriptor::floating("Y", 8),
        DimensionDescriptor::floating("Z", 8),
        DimensionDescriptor::unsigned("Intensity", 2),
        DimensionDescriptor::unsigned("Classification", 1),
        DimensionDescriptor::unsigned("Red", 2),
        DimensionDescriptor::unsigned("Green", 2),
        DimensionDescriptor::unsigned("Blue", 2),
    ];
    let records = (0..n)
        .map(|i| {
            let t = i as f64;
            PointRecord::new(vec![
                Sample::Float(637_000.0 + (t * 0.37) % 500.0),
                Sample::Float(851_000.0 + (t * 0.53) % 500.0),
                Sample::Float(120.0 + (t * 0.11) % 40.0),
                Sample::Unsigned((i % 4096) as u64),
                Sample::Unsigned((i % 7) as u64),
                Sample::Unsigned((i * 13 % 65536) as u64),
                Sample::Unsigned((i * 29 % 65536) as u64),
                Sample::Unsigned((i * 31 % 65536) as u64),
            ])
        })
        .collect();
    PointBatch::with_records(schema, records)
}

fn bench_convert_batch_10k(c: &mut Criterion) {
    let batch = autzen_like_batch(10_000);

    c.bench_function("convert_batch_10k", |b| {
        b.iter(|| {
            let mut cloud = PointCloud::new("bench");
            let mut converter = PointRecordConverter::new(ColorDepth::Auto);
            converter.convert(black_box(&batch), &mut cloud)
        });
    });
}

fn bench_convert_many_batches(c: &mut Criterion) {
    let batches: Vec<PointBatch> = (0..16).map(|_| autzen_like_batch(1_000)).collect();

    c.bench_function("convert_16_batches_1k", |b| {
        b.iter(|| {
            let mut cloud = PointCloud::new("bench");
            let mut converter = PointRecordConverter::new(ColorDepth::Auto);
            for batch in &batches {
                converter.convert(black_box(batch), &mut cloud).ok();
            }
            cloud.len()
        });
    });
}

fn bench_decode_read_response(c: &mut Criterion) {
    let batch = autzen_like_batch(10_000);
    let bytes = encode_read_response(&batch).unwrap_or_default();

    c.bench_function("decode_read_response_10k", |b| {
        b.iter(|| decode_read_response(black_box(&bytes), &batch.schema));
    });
}

fn bench_quadtree_plan(c: &mut Criterion) {
    let Ok(bounds) = Bounds::new_2d(0.0, 0.0, 1024.0, 1024.0) else {
        return;
    };

    c.bench_function("quadtree_plan_6_levels", |b| {
        b.iter(|| {
            let Ok(planner) = SubdivisionPlanner::new(DownloadMethod::Quadtree, bounds, 8, 8) else {
                return 0;
            };
            let mut planner = planner.with_max_depth(Some(13));
            let mut issued = 0;
            while let Some(item) = planner.next() {
                planner.report(&item, black_box(1));
                issued += 1;
            }
            issued
        });
    });
}

criterion_group!(
    benches,
    bench_convert_batch_10k,
    bench_convert_many_batches,
    bench_decode_read_response,
    bench_quadtree_plan,
);
criterion_main!(benches);
