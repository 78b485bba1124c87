/// Screen-space triangle assembly.
///
/// Triangles are value types: assembled after clipping and perspective
/// division, duplicated per tile by the binner, and dropped once rasterized.
use super::vertex::Vertex;

/// Screen-space areas below this are treated as degenerate and skipped.
pub const DEGENERATE_AREA: f32 = 1e-6;

#[derive(Copy, Clone, Debug)]
pub struct Triangle {
    /// Raster-space vertices (pixels in xy, NDC depth in z, attributes
    /// pre-multiplied by rhw).
    pub v: [Vertex; 3],
    /// True when, with vertices sorted by y, the middle vertex lies on the
    /// right of the top-to-bottom edge. Decides the scan direction of the
    /// monotone pieces.
    pub flip: bool,
    /// Degenerate triangles are flagged instead of removed so counters can
    /// observe them.
    pub culled: bool,
    /// Cached signed screen-space area (positive = clockwise on screen,
    /// y growing downward).
    pub area: f32,
}

impl Triangle {
    pub fn assemble(v: [Vertex; 3]) -> Self {
        let area = signed_area(&v);
        let culled = area.abs() < DEGENERATE_AREA;

        // Orientation of the y-sorted middle vertex relative to the long
        // edge; meaningless for degenerate triangles.
        let flip = if culled {
            false
        } else {
            let [a, b, c] = sorted_by_y(&v);
            cross_z(&a, &c, &b) < 0.0
        };

        Self {
            v,
            flip,
            culled,
            area,
        }
    }

    /// Conservative screen-space bounding box, padded by one pixel.
    pub fn padded_bounds(&self) -> (f32, f32, f32, f32) {
        let xs = [self.v[0].position.x, self.v[1].position.x, self.v[2].position.x];
        let ys = [self.v[0].position.y, self.v[1].position.y, self.v[2].position.y];
        let min_x = xs[0].min(xs[1]).min(xs[2]) - 1.0;
        let max_x = xs[0].max(xs[1]).max(xs[2]) + 1.0;
        let min_y = ys[0].min(ys[1]).min(ys[2]) - 1.0;
        let max_y = ys[0].max(ys[1]).max(ys[2]) + 1.0;
        (min_x, min_y, max_x, max_y)
    }

    /// Split into at most two y-monotone pieces for the scanline path.
    /// A triangle with a horizontal top or bottom edge is already monotone
    /// and yields a single piece.
    pub fn split_monotone(&self) -> ([MonotoneTri; 2], usize) {
        let [a, b, c] = sorted_by_y(&self.v);
        let mut out = [MonotoneTri::default(); 2];
        let mut count = 0usize;

        let total_dy = c.position.y - a.position.y;
        if total_dy <= 0.0 {
            return (out, 0);
        }

        // The fourth vertex: the long edge a->c sampled at b's scanline.
        let t = (b.position.y - a.position.y) / total_dy;
        let m = a.lerp(&c, t);

        // flip: b on the right of a->c.
        let (mid_left, mid_right) = if self.flip { (m, b) } else { (b, m) };

        if b.position.y - a.position.y > 0.0 {
            out[count] = MonotoneTri {
                y_start: a.position.y,
                y_end: b.position.y,
                left_top: a,
                left_bottom: mid_left,
                right_top: a,
                right_bottom: mid_right,
            };
            count += 1;
        }
        if c.position.y - b.position.y > 0.0 {
            out[count] = MonotoneTri {
                y_start: b.position.y,
                y_end: c.position.y,
                left_top: mid_left,
                left_bottom: c,
                right_top: mid_right,
                right_bottom: c,
            };
            count += 1;
        }

        (out, count)
    }
}

/// A y-monotone triangle piece: one left edge, one right edge, a shared
/// vertical extent. The scanline rasterizer interpolates both edges per row.
#[derive(Copy, Clone, Debug, Default)]
pub struct MonotoneTri {
    pub y_start: f32,
    pub y_end: f32,
    pub left_top: Vertex,
    pub left_bottom: Vertex,
    pub right_top: Vertex,
    pub right_bottom: Vertex,
}

impl MonotoneTri {
    /// Interpolate the boundary vertices at a scanline's y center.
    pub fn edges_at(&self, y_center: f32) -> (Vertex, Vertex) {
        let t = (y_center - self.y_start) / (self.y_end - self.y_start);
        let left = self.left_top.lerp(&self.left_bottom, t);
        let right = self.right_top.lerp(&self.right_bottom, t);
        (left, right)
    }
}

#[inline]
fn signed_area(v: &[Vertex; 3]) -> f32 {
    cross_z(&v[0], &v[1], &v[2]) * 0.5
}

/// z component of (b-a) x (c-a) in screen space.
#[inline]
fn cross_z(a: &Vertex, b: &Vertex, c: &Vertex) -> f32 {
    (b.position.x - a.position.x) * (c.position.y - a.position.y)
        - (b.position.y - a.position.y) * (c.position.x - a.position.x)
}

fn sorted_by_y(v: &[Vertex; 3]) -> [Vertex; 3] {
    let mut sorted = *v;
    if sorted[0].position.y > sorted[1].position.y {
        sorted.swap(0, 1);
    }
    if sorted[1].position.y > sorted[2].position.y {
        sorted.swap(1, 2);
    }
    if sorted[0].position.y > sorted[1].position.y {
        sorted.swap(0, 1);
    }
    sorted
}
