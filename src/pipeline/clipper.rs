/// Homogeneous-space polygon clipping against the view volume, plus the
/// screen-space helpers that protect the rasterizer from out-of-bounds
/// writes.
///
/// Clipping runs before perspective division, so intersection vertices are
/// produced by plain linear interpolation in clip space and stay exact under
/// projection. Only the near plane is mandatory; the lateral and far planes
/// can be deferred to screen-space clamping, which is cheaper than a full
/// polygon re-clip.
use glam::Vec4;

use super::state::{CullFace, DrawState, Winding};
use super::vertex::Vertex;
use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;

/// A polygon clipped against 6 planes gains at most one vertex per pass.
pub const MAX_POLY_VERTS: usize = 12;
/// Fan triangulation of a MAX_POLY_VERTS polygon.
pub const MAX_CLIPPED_TRIS: usize = MAX_POLY_VERTS - 2;

/// Which frustum planes the clipper cuts against.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClipPlanes {
    /// Near plane only; lateral overflow is handled by screen-space
    /// clamping in the rasterizer.
    NearOnly,
    /// All six planes of the view volume.
    All,
}

/// The six view-volume planes, as signed-distance functions over a
/// homogeneous clip-space vertex. NDC depth convention is [0, 1].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Plane {
    Near,
    Far,
    Left,
    Right,
    Bottom,
    Top,
}

const ALL_PLANES: [Plane; 6] = [
    Plane::Near,
    Plane::Far,
    Plane::Left,
    Plane::Right,
    Plane::Bottom,
    Plane::Top,
];

impl Plane {
    /// Signed homogeneous distance; >= 0 means inside.
    #[inline]
    fn distance(self, p: Vec4, near: f32) -> f32 {
        match self {
            Plane::Near => p.w - near,
            Plane::Far => p.w - p.z,
            Plane::Left => p.w + p.x,
            Plane::Right => p.w - p.x,
            Plane::Bottom => p.w + p.y,
            Plane::Top => p.w - p.y,
        }
    }
}

/// Fixed-capacity result of clipping one input triangle.
#[derive(Copy, Clone)]
pub struct ClippedTriangles {
    tris: [[Vertex; 3]; MAX_CLIPPED_TRIS],
    len: usize,
}

impl ClippedTriangles {
    fn empty() -> Self {
        Self {
            tris: [[Vertex::default(); 3]; MAX_CLIPPED_TRIS],
            len: 0,
        }
    }

    fn push(&mut self, tri: [Vertex; 3]) {
        debug_assert!(self.len < MAX_CLIPPED_TRIS);
        self.tris[self.len] = tri;
        self.len += 1;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &[Vertex; 3]> {
        self.tris[..self.len].iter()
    }
}

/// View-volume clipper. Value type; one per device, shared read-only by the
/// clip/bin workers.
#[derive(Copy, Clone, Debug)]
pub struct Clipper {
    /// Minimum homogeneous w a vertex may keep; also the NaN defense for
    /// the later `1/w`.
    pub near_distance: f32,
    pub planes: ClipPlanes,
}

impl Default for Clipper {
    fn default() -> Self {
        Self {
            near_distance: 1e-3,
            planes: ClipPlanes::NearOnly,
        }
    }
}

impl Clipper {
    pub fn new(near_distance: f32, planes: ClipPlanes) -> Self {
        Self {
            near_distance,
            planes,
        }
    }

    /// Clip one triangle against the view volume.
    ///
    /// Fast paths: a triangle fully inside every plane is returned
    /// unmodified; a triangle fully outside any single plane is trivially
    /// rejected. Otherwise the polygon is cut plane by plane and
    /// fan-triangulated (a quad yields exactly 2 triangles).
    pub fn clip(&self, v0: &Vertex, v1: &Vertex, v2: &Vertex) -> ClippedTriangles {
        let mut result = ClippedTriangles::empty();

        let mut all_inside = true;
        for plane in ALL_PLANES {
            let d0 = plane.distance(v0.position, self.near_distance);
            let d1 = plane.distance(v1.position, self.near_distance);
            let d2 = plane.distance(v2.position, self.near_distance);

            if d0 < 0.0 && d1 < 0.0 && d2 < 0.0 {
                // Trivial reject: every vertex outside one plane.
                count_call!(FUNCTION_COUNTERS.triangles_clip_rejected);
                return result;
            }
            if d0 < 0.0 || d1 < 0.0 || d2 < 0.0 {
                all_inside = false;
            }
        }

        if all_inside {
            result.push([*v0, *v1, *v2]);
            return result;
        }

        // Sutherland-Hodgman over the active plane set, ping-ponging
        // between two fixed-size polygon buffers.
        let mut poly_a = [Vertex::default(); MAX_POLY_VERTS];
        let mut poly_b = [Vertex::default(); MAX_POLY_VERTS];
        poly_a[0] = *v0;
        poly_a[1] = *v1;
        poly_a[2] = *v2;
        let mut len = 3usize;
        let mut in_a = true;

        let active: &[Plane] = match self.planes {
            ClipPlanes::NearOnly => &ALL_PLANES[..1],
            ClipPlanes::All => &ALL_PLANES[..],
        };

        for &plane in active {
            let (input, output) = if in_a {
                (&poly_a[..], &mut poly_b)
            } else {
                (&poly_b[..], &mut poly_a)
            };
            len = self.clip_polygon(plane, &input[..len], output);
            in_a = !in_a;
            if len < 3 {
                count_call!(FUNCTION_COUNTERS.triangles_clip_rejected);
                return result;
            }
        }

        let polygon = if in_a { &poly_a[..len] } else { &poly_b[..len] };
        for i in 1..(len - 1) {
            result.push([polygon[0], polygon[i], polygon[i + 1]]);
        }
        result
    }

    /// One Sutherland-Hodgman pass. Returns the output vertex count.
    fn clip_polygon(
        &self,
        plane: Plane,
        input: &[Vertex],
        output: &mut [Vertex; MAX_POLY_VERTS],
    ) -> usize {
        if input.is_empty() {
            return 0;
        }

        let mut out_len = 0usize;
        let mut prev = input[input.len() - 1];
        let mut d_prev = plane.distance(prev.position, self.near_distance);

        for &cur in input {
            let d_cur = plane.distance(cur.position, self.near_distance);
            let cur_inside = d_cur >= 0.0;
            let prev_inside = d_prev >= 0.0;

            if cur_inside != prev_inside {
                // Edge crosses the plane: emit the intersection vertex.
                let t = d_cur / (d_cur - d_prev);
                let mut inter = cur.lerp(&prev, t);
                inter.derive_rhw();
                output[out_len] = inter;
                out_len += 1;
            }
            if cur_inside {
                output[out_len] = cur;
                out_len += 1;
            }

            prev = cur;
            d_prev = d_cur;
        }

        out_len
    }
}

/// Backface test on NDC-space winding (post perspective-division, y up).
/// Returns true when the triangle must be rejected under the given state.
pub fn is_backface_culled(ndc: &[Vec4; 3], state: &DrawState) -> bool {
    if state.cull_face == CullFace::None {
        return false;
    }

    let area = (ndc[1].x - ndc[0].x) * (ndc[2].y - ndc[0].y)
        - (ndc[2].x - ndc[0].x) * (ndc[1].y - ndc[0].y);
    let observed = if area > 0.0 {
        Winding::CounterClockwise
    } else {
        Winding::Clockwise
    };

    let culled = match state.cull_face {
        CullFace::None => false,
        CullFace::Back => observed != state.front_face,
        CullFace::Front => observed == state.front_face,
    };
    if culled {
        count_call!(FUNCTION_COUNTERS.triangles_backface_culled);
    }
    culled
}

/// Clamp a scanline's left/right endpoints against `[lo, hi)` in screen x,
/// interpolating all attributes. Returns false when the span lies fully
/// outside.
pub fn clip_horizontally(left: &mut Vertex, right: &mut Vertex, lo: f32, hi: f32) -> bool {
    let x0 = left.position.x;
    let x1 = right.position.x;
    let span = x1 - x0;
    if span <= 0.0 || x1 <= lo || x0 >= hi {
        return false;
    }

    let inv = 1.0 / span;
    let orig_left = *left;
    let orig_right = *right;
    if x0 < lo {
        *left = orig_left.lerp(&orig_right, (lo - x0) * inv);
    }
    if x1 > hi {
        *right = orig_left.lerp(&orig_right, (hi - x0) * inv);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn clip_vertex(x: f32, y: f32, z: f32, w: f32) -> Vertex {
        let mut v = Vertex {
            position: Vec4::new(x, y, z, w),
            uv: Vec2::new(x, y),
            ..Vertex::default()
        };
        v.derive_rhw();
        v
    }

    #[test]
    fn fully_inside_triangle_is_returned_unchanged() {
        let clipper = Clipper::default();
        let v0 = clip_vertex(-0.5, -0.5, 0.5, 1.0);
        let v1 = clip_vertex(0.5, -0.5, 0.5, 1.0);
        let v2 = clip_vertex(0.0, 0.5, 0.5, 1.0);

        let out = clipper.clip(&v0, &v1, &v2);
        assert_eq!(out.len(), 1);
        let tri = out.iter().next().unwrap();
        assert_eq!(tri[0].position, v0.position);
        assert_eq!(tri[1].position, v1.position);
        assert_eq!(tri[2].position, v2.position);
    }

    #[test]
    fn fully_behind_near_plane_is_rejected() {
        let clipper = Clipper::default();
        let v0 = clip_vertex(-0.5, -0.5, 0.0, 0.0);
        let v1 = clip_vertex(0.5, -0.5, 0.0, 0.0);
        let v2 = clip_vertex(0.0, 0.5, 0.0, -0.1);

        let out = clipper.clip(&v0, &v1, &v2);
        assert!(out.is_empty());
    }

    #[test]
    fn triangle_straddling_near_plane_becomes_quad() {
        let clipper = Clipper::default();
        // One vertex behind the near plane, two in front: the clipped
        // polygon has 4 vertices, fan-triangulated into exactly 2.
        let v0 = clip_vertex(-0.5, -0.5, 0.5, 1.0);
        let v1 = clip_vertex(0.5, -0.5, 0.5, 1.0);
        let v2 = clip_vertex(0.0, 0.5, 0.0, -0.5);

        let out = clipper.clip(&v0, &v1, &v2);
        assert_eq!(out.len(), 2);

        for tri in out.iter() {
            for v in tri {
                assert!(
                    v.position.w >= clipper.near_distance - 1e-6,
                    "clipped vertex must be inside-or-on the near plane"
                );
            }
        }
    }

    #[test]
    fn clipped_vertices_rederive_rhw() {
        let clipper = Clipper::default();
        let v0 = clip_vertex(0.0, 0.0, 0.5, 2.0);
        let v1 = clip_vertex(1.0, 0.0, 0.5, 2.0);
        let v2 = clip_vertex(0.0, 1.0, 0.0, -1.0);

        let out = clipper.clip(&v0, &v1, &v2);
        for tri in out.iter() {
            for v in tri {
                let expected = 1.0 / v.position.w.max(1e-4);
                assert!((v.rhw - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn all_planes_mode_cuts_lateral_overflow() {
        let clipper = Clipper::new(1e-3, ClipPlanes::All);
        // Triangle poking out of the right plane (x > w).
        let v0 = clip_vertex(0.0, -0.5, 0.5, 1.0);
        let v1 = clip_vertex(2.0, -0.5, 0.5, 1.0);
        let v2 = clip_vertex(0.0, 0.5, 0.5, 1.0);

        let out = clipper.clip(&v0, &v1, &v2);
        assert!(!out.is_empty());
        for tri in out.iter() {
            for v in tri {
                assert!(v.position.x <= v.position.w + 1e-4);
            }
        }
    }

    #[test]
    fn backface_cull_respects_winding() {
        let state = DrawState::default(); // cull back, front = CCW
        let ccw = [
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 1.0, 0.0, 1.0),
        ];
        let cw = [ccw[0], ccw[2], ccw[1]];
        assert!(!is_backface_culled(&ccw, &state));
        assert!(is_backface_culled(&cw, &state));

        let mut double_sided = state;
        double_sided.cull_face = CullFace::None;
        assert!(!is_backface_culled(&cw, &double_sided));
    }

    #[test]
    fn horizontal_clip_clamps_span() {
        let mut left = clip_vertex(0.0, 0.0, 0.0, 1.0);
        let mut right = clip_vertex(10.0, 0.0, 0.0, 1.0);
        left.position.x = -4.0;
        right.position.x = 12.0;
        left.uv = Vec2::new(0.0, 0.0);
        right.uv = Vec2::new(1.0, 0.0);

        assert!(clip_horizontally(&mut left, &mut right, 0.0, 8.0));
        assert!((left.position.x - 0.0).abs() < 1e-4);
        assert!((right.position.x - 8.0).abs() < 1e-4);
        // Attributes follow the clamp: x=-4..12 maps uv 0..1, so x=0 is t=0.25.
        assert!((left.uv.x - 0.25).abs() < 1e-4);

        let mut l2 = clip_vertex(0.0, 0.0, 0.0, 1.0);
        let mut r2 = clip_vertex(0.0, 0.0, 0.0, 1.0);
        l2.position.x = 20.0;
        r2.position.x = 30.0;
        assert!(!clip_horizontally(&mut l2, &mut r2, 0.0, 8.0));
    }
}
