/// Software rasterization pipeline
/// Tile-parallel, perspective-correct, with optional MSAA
pub mod clipper;
pub mod fragment;
pub mod raster;
pub mod shader;
pub mod state;
pub mod target;
pub mod tiles;
pub mod triangle;
pub mod vertex;

pub use clipper::{ClipPlanes, ClippedTriangles, Clipper};
pub use shader::Shader;
pub use state::{
    BlendFactor, BlendOp, ColorMask, CompareFunc, CullFace, DrawState, ScissorRect,
    ShadingFrequency, ShadingParams, StencilOp, StencilState, Winding,
};
pub use target::{PlaneMask, RenderTarget, TileView};
pub use tiles::{DrawTask, Tile, TileGrid, TILE_SIZE};
pub use triangle::Triangle;
pub use vertex::{Fragment, Vertex};
