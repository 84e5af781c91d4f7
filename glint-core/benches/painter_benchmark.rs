use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glint_core::{Painter, Quad, SoftwareBackend, Smoothing, TextureDescriptor};

fn bench_batch_quads(c: &mut Criterion) {
    let mut painter = Painter::new(Box::new(SoftwareBackend::default()));
    let quads: Vec<Quad> = (0..256)
        .map(|i| Quad::solid((i % 16) as f32 * 4.0, (i / 16) as f32 * 4.0, 4.0, 4.0, 0xFF8800))
        .collect();

    c.bench_function("batch_256_quads", |b| {
        b.iter(|| {
            painter
                .batch_quads(black_box(&quads), None, Smoothing::Bilinear, 1.0)
                .unwrap();
            painter.finish_quad_batch().unwrap();
        });
    });
}

fn bench_software_fill(c: &mut Criterion) {
    let mut painter = Painter::new(Box::new(SoftwareBackend::default()));
    let target = painter
        .create_texture(&TextureDescriptor::new(256.0, 256.0, 1.0).as_render_target())
        .unwrap();
    painter.set_projection(256.0, 256.0).unwrap();
    painter.set_render_target(Some(&target), 0).unwrap();
    let quad = [Quad::solid(0.0, 0.0, 256.0, 256.0, 0x336699).with_alpha(0.5)];

    c.bench_function("software_fill_256", |b| {
        b.iter(|| {
            painter.batch_quads(black_box(&quad), None, Smoothing::None, 1.0).unwrap();
            painter.finish_quad_batch().unwrap();
        });
    });
}

criterion_group!(benches, bench_batch_quads, bench_software_fill);
criterion_main!(benches);
