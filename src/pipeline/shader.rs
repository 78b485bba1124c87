/// Fragment shading as a tagged variant.
///
/// Shader kinds are an enum with a single dispatch function rather than a
/// trait object, keeping the per-pixel loop free of virtual calls.
use glam::{Vec2, Vec4};

use super::state::ShadingParams;
use super::vertex::Fragment;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shader {
    /// Constant color, no lighting.
    Flat { color: Vec4 },
    /// Interpolated vertex color, no lighting.
    VertexColor,
    /// Interpolated vertex color modulated by directional + ambient light.
    Lambert,
    /// Procedural checker over UV, lit like `Lambert`. The checker fades to
    /// its average color once a screen pixel spans more than one cell, using
    /// the UV derivatives supplied by the rasterizer.
    Checker {
        scale: f32,
        color_a: Vec4,
        color_b: Vec4,
    },
    /// Writes depth only; color output is ignored (shadow-map passes).
    DepthOnly,
}

impl Shader {
    /// Evaluate the fragment stage once. `None` signals a discard: the
    /// per-sample pipeline aborts without any buffer writes.
    pub fn fragment(&self, frag: &Fragment, params: &ShadingParams) -> Option<Vec4> {
        match *self {
            Self::Flat { color } => Some(color),
            Self::VertexColor => Some(frag.color),
            Self::Lambert => Some(apply_lambert(frag.color, frag, params)),
            Self::Checker {
                scale,
                color_a,
                color_b,
            } => {
                let base = checker_color(frag, scale, color_a, color_b);
                Some(apply_lambert(base, frag, params))
            }
            Self::DepthOnly => Some(Vec4::ZERO),
        }
    }

    /// True when the variant produces no meaningful color.
    #[inline]
    pub fn is_depth_only(&self) -> bool {
        matches!(self, Self::DepthOnly)
    }
}

fn apply_lambert(base: Vec4, frag: &Fragment, params: &ShadingParams) -> Vec4 {
    let n = frag.normal.normalize_or_zero();
    let lambert = n.dot(params.light_dir).max(0.0);
    let light = (params.ambient + params.diffuse * lambert).clamp(0.0, 1.0);
    Vec4::new(base.x * light, base.y * light, base.z * light, base.w)
}

fn checker_color(frag: &Fragment, scale: f32, color_a: Vec4, color_b: Vec4) -> Vec4 {
    // Footprint of one pixel in checker cells; once a pixel spans a full
    // cell the pattern aliases, so fade towards the average.
    let cell_uv = frag.uv * scale;
    let footprint = Vec2::new(
        frag.ddx_uv.x.abs().max(frag.ddy_uv.x.abs()),
        frag.ddx_uv.y.abs().max(frag.ddy_uv.y.abs()),
    ) * scale;
    let fade = (footprint.x.max(footprint.y)).clamp(0.0, 1.0);

    let parity = (cell_uv.x.floor() as i64 + cell_uv.y.floor() as i64) & 1;
    let sharp = if parity == 0 { color_a } else { color_b };
    let average = (color_a + color_b) * 0.5;
    sharp.lerp(average, fade)
}
