/// Integration tests for homogeneous clipping against the full frustum,
/// including the screen-space area conservation property.
use glam::Vec4;
use softpipe::pipeline::clipper::{ClipPlanes, Clipper};
use softpipe::Vertex;

fn clip_vertex(x: f32, y: f32, z: f32, w: f32) -> Vertex {
    let mut v = Vertex {
        position: Vec4::new(x, y, z, w),
        ..Vertex::default()
    };
    v.derive_rhw();
    v
}

fn raster_area(tri: &[Vertex; 3]) -> f32 {
    let p: Vec<_> = tri
        .iter()
        .map(|v| {
            let r = v.to_raster(640.0, 480.0);
            (r.position.x, r.position.y)
        })
        .collect();
    (((p[1].0 - p[0].0) * (p[2].1 - p[0].1) - (p[2].0 - p[0].0) * (p[1].1 - p[0].1)) * 0.5).abs()
}

#[test]
fn fully_inside_triangle_is_returned_unchanged() {
    let clipper = Clipper::new(1e-3, ClipPlanes::All);
    let v0 = clip_vertex(0.0, 0.5, 0.5, 1.0);
    let v1 = clip_vertex(-0.5, -0.5, 0.5, 1.0);
    let v2 = clip_vertex(0.5, -0.5, 0.5, 1.0);

    let out = clipper.clip(&v0, &v1, &v2);
    assert_eq!(out.len(), 1);
    let tri = out.iter().next().unwrap();
    assert_eq!(tri[0].position, v0.position);
    assert_eq!(tri[1].position, v1.position);
    assert_eq!(tri[2].position, v2.position);
}

#[test]
fn fully_outside_each_plane_is_rejected() {
    let clipper = Clipper::new(1e-3, ClipPlanes::All);
    // (x, y, z, w) triples entirely beyond one plane each.
    let cases: [[Vec4; 3]; 4] = [
        // Behind the near plane (w below near distance).
        [
            Vec4::new(0.0, 0.0, -1.0, -1.0),
            Vec4::new(1.0, 0.0, -1.0, -1.0),
            Vec4::new(0.0, 1.0, -1.0, -1.0),
        ],
        // Left of the left plane: x < -w.
        [
            Vec4::new(-3.0, 0.0, 0.5, 1.0),
            Vec4::new(-2.5, 0.5, 0.5, 1.0),
            Vec4::new(-2.5, -0.5, 0.5, 1.0),
        ],
        // Above the top plane: y > w.
        [
            Vec4::new(0.0, 3.0, 0.5, 1.0),
            Vec4::new(0.5, 2.5, 0.5, 1.0),
            Vec4::new(-0.5, 2.5, 0.5, 1.0),
        ],
        // Beyond the far plane: z > w.
        [
            Vec4::new(0.0, 0.0, 2.0, 1.0),
            Vec4::new(0.5, 0.0, 2.0, 1.0),
            Vec4::new(0.0, 0.5, 2.0, 1.0),
        ],
    ];

    for (i, case) in cases.iter().enumerate() {
        let vs: Vec<Vertex> = case
            .iter()
            .map(|p| clip_vertex(p.x, p.y, p.z, p.w))
            .collect();
        let out = clipper.clip(&vs[0], &vs[1], &vs[2]);
        assert!(out.is_empty(), "case {i} should be trivially rejected");
    }
}

#[test]
fn straddling_triangle_clips_to_inside_vertices() {
    let clipper = Clipper::new(1e-3, ClipPlanes::All);
    // One vertex beyond the right plane.
    let v0 = clip_vertex(0.0, 0.5, 0.5, 1.0);
    let v1 = clip_vertex(-0.5, -0.5, 0.5, 1.0);
    let v2 = clip_vertex(2.0, -0.5, 0.5, 1.0);

    let out = clipper.clip(&v0, &v1, &v2);
    assert!(out.len() == 1 || out.len() == 2, "got {} triangles", out.len());
    for tri in out.iter() {
        for v in tri {
            assert!(
                v.position.x <= v.position.w + 1e-4,
                "vertex still beyond the right plane: {:?}",
                v.position
            );
            // rhw stays consistent with homogeneous w after interpolation.
            assert!((v.rhw - 1.0 / v.position.w).abs() < 1e-4);
        }
    }
}

#[test]
fn clipping_never_grows_screen_area() {
    let clipper = Clipper::new(1e-3, ClipPlanes::All);

    let inside = [
        clip_vertex(0.2, 0.1, 0.5, 1.0),
        clip_vertex(-0.4, -0.3, 0.5, 1.0),
        clip_vertex(0.3, -0.5, 0.5, 1.0),
    ];
    let straddling = [
        clip_vertex(0.0, 0.5, 0.5, 1.0),
        clip_vertex(-1.8, -0.9, 0.5, 1.0),
        clip_vertex(1.8, -0.9, 0.5, 1.0),
    ];

    for (name, tri) in [("inside", &inside), ("straddling", &straddling)] {
        let original = raster_area(tri);
        let out = clipper.clip(&tri[0], &tri[1], &tri[2]);
        let clipped: f32 = out.iter().map(raster_area).sum();
        println!("[CLIP] {name}: original={original:.1}px clipped={clipped:.1}px");
        assert!(
            clipped <= original + original * 1e-3,
            "{name}: clipped area {clipped} exceeds original {original}"
        );
        if name == "inside" {
            assert!((clipped - original).abs() < original * 1e-4);
        }
    }
}
