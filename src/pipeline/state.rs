/// Per-draw pipeline state.
///
/// Everything here is a plain value struct: `GraphicsDevice` snapshots the
/// current `DrawState` into each draw task at submission time, so state
/// setters can never mutate a draw that is already in flight on a worker.
use glam::Vec3;

/// Comparison function shared by the depth and stencil tests.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompareFunc {
    Never,
    Always,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
}

impl CompareFunc {
    /// Direct float comparison, no epsilon.
    #[inline]
    pub fn passes_f32(self, incoming: f32, stored: f32) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Less => incoming < stored,
            Self::LessEqual => incoming <= stored,
            Self::Equal => incoming == stored,
            Self::NotEqual => incoming != stored,
            Self::Greater => incoming > stored,
            Self::GreaterEqual => incoming >= stored,
        }
    }

    #[inline]
    pub fn passes_u8(self, reference: u8, stored: u8) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Less => reference < stored,
            Self::LessEqual => reference <= stored,
            Self::Equal => reference == stored,
            Self::NotEqual => reference != stored,
            Self::Greater => reference > stored,
            Self::GreaterEqual => reference >= stored,
        }
    }
}

/// Stencil buffer update operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    Invert,
}

impl StencilOp {
    #[inline]
    pub fn apply(self, stored: u8, reference: u8) -> u8 {
        match self {
            Self::Keep => stored,
            Self::Zero => 0,
            Self::Replace => reference,
            Self::Increment => stored.saturating_add(1),
            Self::Decrement => stored.saturating_sub(1),
            Self::Invert => !stored,
        }
    }
}

/// Stencil test configuration: comparison plus the three update ops.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StencilState {
    pub func: CompareFunc,
    pub reference: u8,
    pub read_mask: u8,
    pub write_mask: u8,
    /// Applied when the stencil test fails.
    pub fail_op: StencilOp,
    /// Applied when stencil passes but depth fails.
    pub zfail_op: StencilOp,
    /// Applied when both stencil and depth pass.
    pub pass_op: StencilOp,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            func: CompareFunc::Always,
            reference: 0,
            read_mask: 0xFF,
            write_mask: 0xFF,
            fail_op: StencilOp::Keep,
            zfail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
        }
    }
}

/// Blend weight applied to the source or destination color.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

impl BlendFactor {
    #[inline]
    pub fn weight(self, src_alpha: f32, dst_alpha: f32) -> f32 {
        match self {
            Self::Zero => 0.0,
            Self::One => 1.0,
            Self::SrcAlpha => src_alpha,
            Self::OneMinusSrcAlpha => 1.0 - src_alpha,
            Self::DstAlpha => dst_alpha,
            Self::OneMinusDstAlpha => 1.0 - dst_alpha,
        }
    }
}

/// Operator combining the weighted source and destination colors.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Which faces get culled, relative to the front-face winding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CullFace {
    /// Double-sided rendering.
    None,
    Back,
    Front,
}

/// Vertex winding convention for front faces, in NDC (y up).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Winding {
    CounterClockwise,
    Clockwise,
}

/// Per-channel color write mask.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ColorMask(pub u8);

impl ColorMask {
    pub const R: u8 = 1 << 0;
    pub const G: u8 = 1 << 1;
    pub const B: u8 = 1 << 2;
    pub const A: u8 = 1 << 3;
    pub const ALL: Self = Self(0b1111);
    pub const NONE: Self = Self(0);

    #[inline]
    pub fn red(self) -> bool {
        self.0 & Self::R != 0
    }

    #[inline]
    pub fn green(self) -> bool {
        self.0 & Self::G != 0
    }

    #[inline]
    pub fn blue(self) -> bool {
        self.0 & Self::B != 0
    }

    #[inline]
    pub fn alpha(self) -> bool {
        self.0 & Self::A != 0
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Whether MSAA shading runs once per pixel or once per covered subsample.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShadingFrequency {
    /// One fragment evaluation per pixel, reused for all its subsamples.
    Pixel,
    /// One fragment evaluation per covered subsample.
    Sample,
}

/// Pixel-space scissor rectangle, half-open on the max edges.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScissorRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl ScissorRect {
    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        let (x, y) = (x as u32, y as u32);
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Snapshot of all fixed-function state for one draw call.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawState {
    pub depth_test: bool,
    pub depth_func: CompareFunc,
    pub depth_write: bool,

    pub stencil_test: bool,
    pub stencil: StencilState,

    pub alpha_test: bool,
    /// Fragments with alpha below this are discarded when alpha_test is on.
    pub alpha_cutoff: f32,

    pub blend: bool,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub blend_op: BlendOp,

    pub color_mask: ColorMask,

    pub cull_face: CullFace,
    pub front_face: Winding,

    pub msaa: bool,
    pub shading_frequency: ShadingFrequency,

    pub scissor: Option<ScissorRect>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_func: CompareFunc::Less,
            depth_write: true,
            stencil_test: false,
            stencil: StencilState::default(),
            alpha_test: false,
            alpha_cutoff: 0.5,
            blend: false,
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            blend_op: BlendOp::Add,
            color_mask: ColorMask::ALL,
            cull_face: CullFace::Back,
            front_face: Winding::CounterClockwise,
            msaa: false,
            shading_frequency: ShadingFrequency::Pixel,
            scissor: None,
        }
    }
}

impl DrawState {
    /// Early-Z is only valid when the depth result alone decides the sample:
    /// alpha and stencil must both be off.
    #[inline]
    pub fn early_z_eligible(&self) -> bool {
        self.depth_test && !self.alpha_test && !self.stencil_test
    }
}

/// Immutable per-frame shading parameters, captured once before tile tasks
/// are dispatched and passed by value into worker closures.
#[derive(Copy, Clone, Debug)]
pub struct ShadingParams {
    /// Direction the light is coming from (world space), normalized.
    pub light_dir: Vec3,
    /// Constant ambient term added to all fragments.
    pub ambient: f32,
    /// Strength of the directional (Lambert) term.
    pub diffuse: f32,
}

impl Default for ShadingParams {
    fn default() -> Self {
        Self {
            // Slightly from +X/+Z and above.
            light_dir: Vec3::new(0.4, 1.0, 0.3).normalize(),
            ambient: 0.35,
            diffuse: 0.65,
        }
    }
}
