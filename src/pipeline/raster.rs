/// Per-tile triangle rasterization.
///
/// Two fill paths share the fragment stage:
///
/// * Single-sample draws use the scanline path: the triangle is split into
///   y-monotone pieces, both boundary edges are interpolated per row, the
///   span is clipped to the tile and walked with a DDA.
/// * MSAA draws use the block path: 2x2 pixel blocks are tested against the
///   triangle's edge functions, subsample coverage is evaluated at each
///   subsample center and depth is interpolated barycentrically.
///
/// Both paths interpolate rhw-premultiplied attributes linearly in screen
/// space and divide by the interpolated rhw per fragment, so all attributes
/// are perspective correct.
use glam::Vec2;

use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;
use crate::pipeline::clipper::clip_horizontally;
use crate::pipeline::fragment::{early_z_rejects, scissor_rejects, write_sample};
use crate::pipeline::state::ShadingFrequency;
use crate::pipeline::target::TileView;
use crate::pipeline::tiles::DrawTask;
use crate::pipeline::vertex::{Fragment, Vertex};

/// Rasterize every queued task of one tile, in submission order.
pub fn rasterize_tile(view: &mut TileView, tasks: &[DrawTask]) {
    for task in tasks {
        if task.triangle.culled {
            continue;
        }
        if task.state.msaa && view.samples_per_axis() > 1 {
            raster_blocks(view, task);
        } else {
            raster_scanline(view, task);
        }
    }
}

/// First integer coordinate whose center (coord + 0.5) is >= bound.
#[inline]
fn first_center_at_or_after(bound: f32) -> i64 {
    (bound - 0.5).ceil() as i64
}

fn raster_scanline(view: &mut TileView, task: &DrawTask) {
    let state = &task.state;
    let (pieces, piece_count) = task.triangle.split_monotone();

    for piece in &pieces[..piece_count] {
        // Rows whose center lies in [y_start, y_end), clipped to the tile.
        let row_lo = first_center_at_or_after(piece.y_start).max(view.y0 as i64);
        let row_hi = first_center_at_or_after(piece.y_end).min(view.y1 as i64);

        for y in row_lo..row_hi {
            let yc = y as f32 + 0.5;
            let (mut left, mut right) = piece.edges_at(yc);
            if right.position.x < left.position.x {
                std::mem::swap(&mut left, &mut right);
            }
            if !clip_horizontally(&mut left, &mut right, view.x0 as f32, view.x1 as f32) {
                continue;
            }

            let span = right.position.x - left.position.x;
            if span <= 0.0 {
                continue;
            }
            let x_lo = first_center_at_or_after(left.position.x);
            let x_hi = first_center_at_or_after(right.position.x);
            if x_lo >= x_hi {
                continue;
            }

            // UV footprint for the row, estimated from the row below.
            let (below_l, below_r) = piece.edges_at(yc + 1.0);

            let inv_span = 1.0 / span;
            let step = left.differential(&right, inv_span);
            let mut cursor = left.lerp(&right, (x_lo as f32 + 0.5 - left.position.x) * inv_span);

            for x in x_lo..x_hi {
                let (x, y) = (x as usize, y as usize);
                if scissor_rejects(x, y, state) {
                    cursor.advance(&step);
                    continue;
                }
                let Some(idx) = view.sample_index(x, y, 0, 0) else {
                    cursor.advance(&step);
                    continue;
                };

                let depth = cursor.depth();
                if early_z_rejects(view, idx, depth, state) {
                    cursor.advance(&step);
                    continue;
                }

                let corrected = cursor.corrected();
                let mut next = cursor;
                next.advance(&step);
                let ddx_uv = next.corrected().uv - corrected.uv;
                let below_span = below_r.position.x - below_l.position.x;
                let ddy_uv = if below_span > 0.0 {
                    let t = ((x as f32 + 0.5) - below_l.position.x) / below_span;
                    below_l.lerp(&below_r, t.clamp(0.0, 1.0)).corrected().uv - corrected.uv
                } else {
                    ddx_uv
                };

                let frag = Fragment::from_vertex(&corrected, ddx_uv, ddy_uv);
                count_call!(FUNCTION_COUNTERS.samples_shaded);
                if let Some(color) = task.shader.fragment(&frag, &task.shading) {
                    write_sample(view, idx, depth, color, state);
                }

                cursor = next;
            }
        }
    }
}

/// Signed doubled area of the triangle (a, b, p) in screen space.
#[inline]
fn orient2d(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Top-left fill rule for a positively-oriented triangle in y-down screen
/// space: a zero edge function only counts as covered on left edges
/// (descending in winding order, dy < 0) and top edges (horizontal, dx > 0).
#[inline]
fn edge_accepts_ties(a: Vec2, b: Vec2) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dy < 0.0 || (dy == 0.0 && dx > 0.0)
}

#[inline]
fn covered(e: f32, tie: bool) -> bool {
    e > 0.0 || (e == 0.0 && tie)
}

/// Weighted combination of three raster-space vertices by barycentric
/// weights. Linear in screen space, which is exact for rhw-premultiplied
/// attributes.
fn bary_interp(v: &[Vertex; 3], w: [f32; 3]) -> Vertex {
    Vertex {
        position: v[0].position * w[0] + v[1].position * w[1] + v[2].position * w[2],
        world_pos: v[0].world_pos * w[0] + v[1].world_pos * w[1] + v[2].world_pos * w[2],
        shadow_pos: v[0].shadow_pos * w[0] + v[1].shadow_pos * w[1] + v[2].shadow_pos * w[2],
        color: v[0].color * w[0] + v[1].color * w[1] + v[2].color * w[2],
        normal: v[0].normal * w[0] + v[1].normal * w[1] + v[2].normal * w[2],
        uv: v[0].uv * w[0] + v[1].uv * w[1] + v[2].uv * w[2],
        tangent: v[0].tangent * w[0] + v[1].tangent * w[1] + v[2].tangent * w[2],
        bitangent: v[0].bitangent * w[0] + v[1].bitangent * w[1] + v[2].bitangent * w[2],
        rhw: v[0].rhw * w[0] + v[1].rhw * w[1] + v[2].rhw * w[2],
    }
}

struct EdgeSetup {
    verts: [Vertex; 3],
    p: [Vec2; 3],
    ties: [bool; 3],
    inv_area2: f32,
}

impl EdgeSetup {
    /// Reorder to positive orientation and precompute tie rules. None for
    /// zero-area triangles.
    fn new(triangle_verts: &[Vertex; 3]) -> Option<Self> {
        let mut verts = *triangle_verts;
        let pos = |v: &Vertex| Vec2::new(v.position.x, v.position.y);
        let mut area2 = orient2d(pos(&verts[0]), pos(&verts[1]), pos(&verts[2]));
        if area2 < 0.0 {
            verts.swap(1, 2);
            area2 = -area2;
        }
        if area2 <= 0.0 {
            return None;
        }
        let p = [pos(&verts[0]), pos(&verts[1]), pos(&verts[2])];
        Some(Self {
            verts,
            p,
            ties: [
                edge_accepts_ties(p[0], p[1]),
                edge_accepts_ties(p[1], p[2]),
                edge_accepts_ties(p[2], p[0]),
            ],
            inv_area2: 1.0 / area2,
        })
    }

    /// Coverage test at an exact sample position.
    #[inline]
    fn covers(&self, at: Vec2) -> bool {
        covered(orient2d(self.p[0], self.p[1], at), self.ties[0])
            && covered(orient2d(self.p[1], self.p[2], at), self.ties[1])
            && covered(orient2d(self.p[2], self.p[0], at), self.ties[2])
    }

    /// Normalized barycentric weights of a point (relative to the reordered
    /// vertices).
    #[inline]
    fn weights(&self, at: Vec2) -> [f32; 3] {
        let w0 = orient2d(self.p[1], self.p[2], at) * self.inv_area2;
        let w1 = orient2d(self.p[2], self.p[0], at) * self.inv_area2;
        [w0, w1, 1.0 - w0 - w1]
    }

    #[inline]
    fn interp(&self, at: Vec2) -> Vertex {
        bary_interp(&self.verts, self.weights(at))
    }
}

fn raster_blocks(view: &mut TileView, task: &DrawTask) {
    let state = &task.state;
    let Some(setup) = EdgeSetup::new(&task.triangle.v) else {
        return;
    };

    let (min_x, min_y, max_x, max_y) = task.triangle.padded_bounds();
    let x_lo = (min_x.max(view.x0 as f32) as usize).max(view.x0) & !1;
    let y_lo = (min_y.max(view.y0 as f32) as usize).max(view.y0) & !1;
    let x_hi = (max_x.ceil() as usize).min(view.x1);
    let y_hi = (max_y.ceil() as usize).min(view.y1);

    let s = view.samples_per_axis();
    let sub_step = 1.0 / s as f32;

    for by in (y_lo..y_hi).step_by(2) {
        for bx in (x_lo..x_hi).step_by(2) {
            // Corrected corners of the 2x2 block give the UV derivatives for
            // all four pixels.
            let corner = |dx: usize, dy: usize| {
                setup
                    .interp(Vec2::new((bx + dx) as f32 + 0.5, (by + dy) as f32 + 0.5))
                    .corrected()
            };
            let c00 = corner(0, 0);
            let c10 = corner(1, 0);
            let c01 = corner(0, 1);
            let ddx_uv = c10.uv - c00.uv;
            let ddy_uv = c01.uv - c00.uv;

            for (dy, dx) in [(0usize, 0usize), (0, 1), (1, 0), (1, 1)] {
                let (x, y) = (bx + dx, by + dy);
                if x >= x_hi || y >= y_hi || !view.contains_pixel(x, y) {
                    continue;
                }
                if scissor_rejects(x, y, state) {
                    continue;
                }
                shade_msaa_pixel(view, task, &setup, x, y, s, sub_step, ddx_uv, ddy_uv);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn shade_msaa_pixel(
    view: &mut TileView,
    task: &DrawTask,
    setup: &EdgeSetup,
    x: usize,
    y: usize,
    s: usize,
    sub_step: f32,
    ddx_uv: Vec2,
    ddy_uv: Vec2,
) {
    let state = &task.state;

    // Coverage and per-subsample depth first; shading is skipped entirely
    // when nothing survives.
    let mut survivors: [(usize, f32, Vec2); 16] = [(0, 0.0, Vec2::ZERO); 16];
    let mut survivor_count = 0usize;

    for sy in 0..s {
        for sx in 0..s {
            let at = Vec2::new(
                x as f32 + (sx as f32 + 0.5) * sub_step,
                y as f32 + (sy as f32 + 0.5) * sub_step,
            );
            if !setup.covers(at) {
                continue;
            }
            let Some(idx) = view.sample_index(x, y, sx, sy) else {
                continue;
            };
            let w = setup.weights(at);
            let depth = setup.verts[0].position.z * w[0]
                + setup.verts[1].position.z * w[1]
                + setup.verts[2].position.z * w[2];
            if early_z_rejects(view, idx, depth, state) {
                continue;
            }
            if survivor_count < survivors.len() {
                survivors[survivor_count] = (idx, depth, at);
                survivor_count += 1;
            }
        }
    }

    if survivor_count == 0 {
        return;
    }

    match state.shading_frequency {
        ShadingFrequency::Pixel => {
            // One fragment evaluation at the pixel center, shared by every
            // covered subsample.
            let center = setup
                .interp(Vec2::new(x as f32 + 0.5, y as f32 + 0.5))
                .corrected();
            let frag = Fragment::from_vertex(&center, ddx_uv, ddy_uv);
            count_call!(FUNCTION_COUNTERS.samples_shaded);
            if let Some(color) = task.shader.fragment(&frag, &task.shading) {
                for &(idx, depth, _) in &survivors[..survivor_count] {
                    write_sample(view, idx, depth, color, state);
                }
            }
        }
        ShadingFrequency::Sample => {
            for &(idx, depth, at) in &survivors[..survivor_count] {
                let corrected = setup.interp(at).corrected();
                let frag = Fragment::from_vertex(&corrected, ddx_uv, ddy_uv);
                count_call!(FUNCTION_COUNTERS.samples_shaded);
                if let Some(color) = task.shader.fragment(&frag, &task.shading) {
                    write_sample(view, idx, depth, color, state);
                }
            }
        }
    }
}
