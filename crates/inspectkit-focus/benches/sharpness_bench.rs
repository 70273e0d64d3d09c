use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, GrayImage, Luma};
use inspectkit_focus::sharpness_score;

fn checkerboard(size: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |x, y| {
        if ((x / 16) + (y / 16)) % 2 == 0 {
            Luma([40])
        } else {
            Luma([215])
        }
    }))
}

fn bench_sharpness(c: &mut Criterion) {
    let mut group = c.benchmark_group("sharpness_score");
    for size in [256u32, 640, 1280] {
        let frame = checkerboard(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| sharpness_score(black_box(frame), 3))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sharpness);
criterion_main!(benches);
