/// Benchmark suite for the rasterization pipeline
/// Tests performance of the end-to-end frame path and hot-path primitives.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec4;
use softpipe::pipeline::raster::rasterize_tile;
use softpipe::pipeline::tiles::DrawTask;
use softpipe::*;

fn ndc_vertex(x: f32, y: f32, z: f32) -> Vertex {
    Vertex::from_position_color(Vec4::new(x, y, z, 1.0), Vec4::new(x * 0.5 + 0.5, y * 0.5 + 0.5, 0.5, 1.0))
}

/// A fan of `n` triangles covering most of the screen.
fn triangle_fan(n: usize) -> Vec<[Vertex; 3]> {
    let center = ndc_vertex(0.0, 0.0, 0.5);
    (0..n)
        .map(|i| {
            let a0 = (i as f32 / n as f32) * std::f32::consts::TAU;
            let a1 = ((i + 1) as f32 / n as f32) * std::f32::consts::TAU;
            [
                center,
                ndc_vertex(a0.cos() * 0.9, a0.sin() * 0.9, 0.5),
                ndc_vertex(a1.cos() * 0.9, a1.sin() * 0.9, 0.5),
            ]
        })
        .collect()
}

fn bench_full_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_frame");
    for tri_count in [16usize, 256, 1024] {
        let fan = triangle_fan(tri_count);
        let mut device = GraphicsDevice::new(1280, 720);
        device.set_cull_face(CullFace::None);

        group.bench_with_input(BenchmarkId::new("triangles", tri_count), &fan, |b, fan| {
            b.iter(|| {
                device.clear_buffer(PlaneMask::ALL);
                for tri in fan {
                    device.submit_primitive(
                        Shader::VertexColor,
                        black_box(tri[0]),
                        black_box(tri[1]),
                        black_box(tri[2]),
                    );
                }
                device.fence_primitives();
                device.fence_pixels();
            });
        });
    }
    group.finish();
}

fn bench_full_frame_msaa(c: &mut Criterion) {
    c.bench_function("full_frame_msaa_2x", |b| {
        let fan = triangle_fan(64);
        let mut device = GraphicsDevice::new(1280, 720);
        device.set_cull_face(CullFace::None);
        device.set_subsample_count(2);
        device.set_msaa_enabled(true);

        b.iter(|| {
            device.clear_buffer(PlaneMask::ALL);
            for tri in &fan {
                device.submit_primitive(Shader::VertexColor, tri[0], tri[1], tri[2]);
            }
            device.fence_primitives();
            device.fence_pixels();
        });
    });
}

fn bench_target_clear(c: &mut Criterion) {
    c.bench_function("target_clear", |b| {
        let mut target = RenderTarget::new(1280, 720, PlaneMask::ALL, 1);
        b.iter(|| {
            target.clear(PlaneMask::ALL, black_box(0xFF87CEEB));
        });
    });
}

fn bench_clip_inside_fast_path(c: &mut Criterion) {
    c.bench_function("clip_inside_fast_path", |b| {
        let clipper = Clipper::new(1e-3, ClipPlanes::All);
        let v0 = ndc_vertex(0.0, 0.5, 0.5);
        let v1 = ndc_vertex(-0.5, -0.5, 0.5);
        let v2 = ndc_vertex(0.5, -0.5, 0.5);
        b.iter(|| {
            black_box(clipper.clip(black_box(&v0), black_box(&v1), black_box(&v2)));
        });
    });
}

fn bench_single_tile_raster(c: &mut Criterion) {
    c.bench_function("single_tile_raster", |b| {
        // One triangle covering a full 64px tile, scanline path.
        let mut verts = [
            ndc_vertex(-1.0, 1.0, 0.5),
            ndc_vertex(-1.0, -1.0, 0.5),
            ndc_vertex(1.0, -1.0, 0.5),
        ];
        for v in &mut verts {
            *v = v.to_raster(1280.0, 720.0);
        }
        let task = DrawTask {
            triangle: Triangle::assemble(verts),
            state: DrawState::default(),
            shader: Shader::Checker {
                scale: 8.0,
                color_a: Vec4::ONE,
                color_b: Vec4::new(0.2, 0.2, 0.2, 1.0),
            },
            shading: ShadingParams {
                light_dir: glam::Vec3::Z,
                ..ShadingParams::default()
            },
            seq: 0,
        };
        let mut target = RenderTarget::new(1280, 720, PlaneMask::ALL, 1);
        let tasks = [task];

        b.iter(|| {
            target.clear(PlaneMask(PlaneMask::DEPTH), 0);
            let mut view = target.tile_view(64, 64, 128, 128);
            rasterize_tile(&mut view, black_box(&tasks));
        });
    });
}

criterion_group!(
    benches,
    bench_full_frame,
    bench_full_frame_msaa,
    bench_target_clear,
    bench_clip_inside_fast_path,
    bench_single_tile_raster
);
criterion_main!(benches);
