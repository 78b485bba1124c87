/// Vertex and fragment types shared by the whole pipeline.
///
/// A `Vertex` lives in two coordinate spaces over its lifetime. Straight out
/// of the vertex stage its `position` is a homogeneous clip-space point and
/// every attribute is in its natural space. `to_raster` moves it into raster
/// space: `position` becomes (screen x, screen y, ndc z, 1) and every
/// attribute is pre-multiplied by `rhw = 1/w`, so screen-space-linear
/// interpolation followed by `corrected()` yields perspective-correct values.
use glam::{Vec2, Vec3, Vec4};

/// Smallest w we will divide by. Anything closer to the camera plane than
/// this is clamped to avoid NaN/Inf leaking into the interpolators.
pub const W_EPSILON: f32 = 1e-4;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vertex {
    /// Clip-space position before `to_raster`, raster-space after.
    pub position: Vec4,
    pub world_pos: Vec3,
    pub shadow_pos: Vec4,
    pub color: Vec4,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    /// Reciprocal homogeneous w. Always `1/position.w` right after the
    /// vertex stage; re-derived whenever a vertex is produced by
    /// interpolation in clip space.
    pub rhw: f32,
}

impl Vertex {
    /// Minimal constructor for positions-plus-color geometry. The remaining
    /// attributes default to zero.
    pub fn from_position_color(position: Vec4, color: Vec4) -> Self {
        Self {
            position,
            color,
            rhw: 1.0 / position.w.max(W_EPSILON),
            ..Self::default()
        }
    }

    /// Re-derive `rhw` from the current clip-space w.
    #[inline]
    pub fn derive_rhw(&mut self) {
        self.rhw = 1.0 / self.position.w.max(W_EPSILON);
    }

    /// Componentwise linear interpolation of all attributes.
    ///
    /// In clip space the caller must re-derive `rhw` afterwards; in raster
    /// space the linearly interpolated `rhw` is exactly what perspective
    /// correction needs.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            world_pos: self.world_pos.lerp(other.world_pos, t),
            shadow_pos: self.shadow_pos.lerp(other.shadow_pos, t),
            color: self.color.lerp(other.color, t),
            normal: self.normal.lerp(other.normal, t),
            uv: self.uv.lerp(other.uv, t),
            tangent: self.tangent.lerp(other.tangent, t),
            bitangent: self.bitangent.lerp(other.bitangent, t),
            rhw: self.rhw + (other.rhw - self.rhw) * t,
        }
    }

    /// Horizontal differential: the per-step attribute increment when
    /// walking from `self` towards `other` in `1/inv_steps`-sized steps.
    pub fn differential(&self, other: &Self, inv_steps: f32) -> Self {
        Self {
            position: (other.position - self.position) * inv_steps,
            world_pos: (other.world_pos - self.world_pos) * inv_steps,
            shadow_pos: (other.shadow_pos - self.shadow_pos) * inv_steps,
            color: (other.color - self.color) * inv_steps,
            normal: (other.normal - self.normal) * inv_steps,
            uv: (other.uv - self.uv) * inv_steps,
            tangent: (other.tangent - self.tangent) * inv_steps,
            bitangent: (other.bitangent - self.bitangent) * inv_steps,
            rhw: (other.rhw - self.rhw) * inv_steps,
        }
    }

    /// Advance this vertex by a precomputed differential (one DDA step).
    #[inline]
    pub fn advance(&mut self, d: &Self) {
        self.position += d.position;
        self.world_pos += d.world_pos;
        self.shadow_pos += d.shadow_pos;
        self.color += d.color;
        self.normal += d.normal;
        self.uv += d.uv;
        self.tangent += d.tangent;
        self.bitangent += d.bitangent;
        self.rhw += d.rhw;
    }

    /// Perspective division plus viewport mapping. The returned vertex is in
    /// raster space: attributes pre-multiplied by `rhw`, position.xy in
    /// pixels, position.z the NDC depth in [0, 1].
    pub fn to_raster(&self, width: f32, height: f32) -> Self {
        let w = self.position.w.max(W_EPSILON);
        let rhw = 1.0 / w;
        let ndc = self.position * rhw;

        let sx = (ndc.x + 1.0) * 0.5 * width;
        let sy = (1.0 - ndc.y) * 0.5 * height;

        Self {
            position: Vec4::new(sx, sy, ndc.z, 1.0),
            world_pos: self.world_pos * rhw,
            shadow_pos: self.shadow_pos * rhw,
            color: self.color * rhw,
            normal: self.normal * rhw,
            uv: self.uv * rhw,
            tangent: self.tangent * rhw,
            bitangent: self.bitangent * rhw,
            rhw,
        }
    }

    /// Undo the `rhw` pre-multiplication after screen-space interpolation.
    /// Position (screen x/y and NDC depth) is left untouched.
    pub fn corrected(&self) -> Self {
        let w = 1.0 / self.rhw.max(W_EPSILON);
        Self {
            position: self.position,
            world_pos: self.world_pos * w,
            shadow_pos: self.shadow_pos * w,
            color: self.color * w,
            normal: self.normal * w,
            uv: self.uv * w,
            tangent: self.tangent * w,
            bitangent: self.bitangent * w,
            rhw: self.rhw,
        }
    }

    /// NDC depth of a raster-space vertex.
    #[inline]
    pub fn depth(&self) -> f32 {
        self.position.z
    }
}

/// Interpolated, perspective-corrected data handed to the fragment stage,
/// together with the screen-space partial derivatives of the UV.
#[derive(Copy, Clone, Debug, Default)]
pub struct Fragment {
    pub world_pos: Vec3,
    pub shadow_pos: Vec4,
    pub color: Vec4,
    pub normal: Vec3,
    pub uv: Vec2,
    /// NDC depth in [0, 1], interpolated linearly in screen space.
    pub depth: f32,
    /// Forward difference of UV along +x (one pixel).
    pub ddx_uv: Vec2,
    /// Forward difference of UV along +y (one pixel).
    pub ddy_uv: Vec2,
}

impl Fragment {
    /// Build a fragment from a corrected raster-space vertex.
    pub fn from_vertex(v: &Vertex, ddx_uv: Vec2, ddy_uv: Vec2) -> Self {
        Self {
            world_pos: v.world_pos,
            shadow_pos: v.shadow_pos,
            color: v.color,
            normal: v.normal,
            uv: v.uv,
            depth: v.depth(),
            ddx_uv,
            ddy_uv,
        }
    }
}
