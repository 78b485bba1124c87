pub mod device;
pub mod perf;
/// Softpipe - CPU-only tile-parallel rasterization engine
/// Built with compartmentalized benchmarkable components
pub mod pipeline;

pub use device::{BufferId, GraphicsDevice};
pub use perf::{CounterSnapshot, FrameStats, FunctionCounters, FUNCTION_COUNTERS};
pub use pipeline::{
    BlendFactor, BlendOp, ClipPlanes, Clipper, ColorMask, CompareFunc, CullFace, DrawState,
    PlaneMask, RenderTarget, ScissorRect, Shader, ShadingFrequency, ShadingParams, StencilOp,
    StencilState, Triangle, Vertex, Winding, TILE_SIZE,
};
