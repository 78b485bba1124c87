/// The graphics device: owns every render target, the tile grid and the
/// worker pool, and exposes the draw-call surface the rest of the program
/// talks to.
///
/// A frame is two fork-join phases. `submit_primitive` only records commands;
/// `fence_primitives` runs clip/cull/assemble/bin in parallel over the
/// recorded commands and blocks until every triangle is queued in its tiles;
/// `fence_pixels` rasterizes all tiles in parallel (and resolves them when
/// the target is multisampled) and blocks until the image is complete. The
/// active render target is only ever switched or resized between fences.
use glam::Vec4;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::time::Instant;

use crate::count_call;
use crate::perf::{FrameStats, FUNCTION_COUNTERS};
use crate::pipeline::clipper::{is_backface_culled, ClipPlanes, Clipper};
use crate::pipeline::raster::rasterize_tile;
use crate::pipeline::shader::Shader;
use crate::pipeline::state::{
    BlendFactor, BlendOp, ColorMask, CompareFunc, CullFace, DrawState, ScissorRect,
    ShadingFrequency, ShadingParams, StencilOp, Winding,
};
use crate::pipeline::target::{pack_color, PlaneMask, RenderTarget};
use crate::pipeline::tiles::{DrawTask, TileGrid};
use crate::pipeline::triangle::Triangle;
use crate::pipeline::vertex::Vertex;

/// Handle into the device's render-target table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BufferId(usize);

/// Default near-plane distance for homogeneous clipping.
pub const DEFAULT_NEAR_DISTANCE: f32 = 1e-3;

const MAX_SAMPLES_PER_AXIS: usize = 4;

/// One recorded draw command, snapshotted at submission.
struct DrawCommand {
    shader: Shader,
    verts: [Vertex; 3],
    state: DrawState,
    shading: ShadingParams,
    seq: u64,
}

pub struct GraphicsDevice {
    targets: Vec<RenderTarget>,
    active: BufferId,
    grid: TileGrid,

    state: DrawState,
    shading: ShadingParams,
    clipper: Clipper,
    clear_color: u32,
    subsample_count: usize,
    msaa_enabled: bool,

    pending: Vec<DrawCommand>,
    next_seq: u64,

    pool: Option<rayon::ThreadPool>,
    stats: FrameStats,
}

impl GraphicsDevice {
    pub fn new(width: usize, height: usize) -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| {
                warn!("worker pool construction failed ({e}), falling back to the global pool");
                e
            })
            .ok();

        info!("graphics device: {width}x{height}, {threads} worker threads");

        Self {
            targets: vec![RenderTarget::new(width, height, PlaneMask::ALL, 1)],
            active: BufferId(0),
            grid: TileGrid::new(width, height),
            state: DrawState::default(),
            shading: ShadingParams::default(),
            clipper: Clipper::new(DEFAULT_NEAR_DISTANCE, ClipPlanes::NearOnly),
            clear_color: 0,
            subsample_count: 2,
            msaa_enabled: false,
            pending: Vec::new(),
            next_seq: 0,
            pool,
            stats: FrameStats::default(),
        }
    }

    // -------- resource management --------

    /// Allocate a new render target and return its handle. Created
    /// single-sampled; offscreen targets (shadow maps) do not multisample.
    pub fn create_buffer(&mut self, width: usize, height: usize, planes: PlaneMask) -> BufferId {
        let id = BufferId(self.targets.len());
        self.targets.push(RenderTarget::new(width, height, planes, 1));
        debug!("created buffer {:?}: {width}x{height}", id);
        id
    }

    /// Switch the active render target. Returns false (and leaves the
    /// active target alone) for an unknown id. Precondition: no tile tasks
    /// in flight.
    pub fn set_active_render_target(&mut self, id: BufferId) -> bool {
        let Some(target) = self.targets.get(id.0) else {
            warn!("set_active_render_target: unknown buffer {:?}", id);
            return false;
        };
        self.grid = TileGrid::new(target.width, target.height);
        self.active = id;
        true
    }

    /// Back to the default (display) target.
    pub fn reset_active_render_target(&mut self) {
        self.set_active_render_target(BufferId(0));
    }

    pub fn get_buffer(&self, id: BufferId) -> Option<&RenderTarget> {
        self.targets.get(id.0)
    }

    pub fn active_target(&self) -> &RenderTarget {
        &self.targets[self.active.0]
    }

    fn active_target_mut(&mut self) -> &mut RenderTarget {
        &mut self.targets[self.active.0]
    }

    pub fn width(&self) -> usize {
        self.active_target().width
    }

    pub fn height(&self) -> usize {
        self.active_target().height
    }

    /// The pixels to present: resolved under MSAA, raw color otherwise.
    pub fn display_plane(&self) -> &[u32] {
        self.active_target().display_plane()
    }

    /// Resize the active render target and rebuild the tile grid.
    /// Precondition: fenced (no tile tasks in flight).
    pub fn set_viewport(&mut self, width: usize, height: usize) {
        let samples = self.effective_samples();
        self.active_target_mut().reconfigure(width, height, samples);
        self.grid = TileGrid::new(width, height);
        debug!("viewport {width}x{height}, {samples}x{samples} subsamples");
    }

    fn effective_samples(&self) -> usize {
        if self.msaa_enabled {
            self.subsample_count
        } else {
            1
        }
    }

    fn reapply_sampling(&mut self) {
        let samples = self.effective_samples();
        let (w, h) = (self.width(), self.height());
        if self.active_target().samples_per_axis != samples {
            self.active_target_mut().reconfigure(w, h, samples);
        }
    }

    /// Subsamples per pixel axis used while MSAA is enabled, clamped to
    /// [1, 4].
    pub fn set_subsample_count(&mut self, per_axis: usize) {
        self.subsample_count = per_axis.clamp(1, MAX_SAMPLES_PER_AXIS);
        self.reapply_sampling();
    }

    pub fn set_msaa_enabled(&mut self, enabled: bool) {
        self.msaa_enabled = enabled;
        self.state.msaa = enabled;
        self.reapply_sampling();
    }

    pub fn msaa_enabled(&self) -> bool {
        self.msaa_enabled
    }

    pub fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = pack_color(color);
    }

    pub fn clear_buffer(&mut self, planes: PlaneMask) {
        let clear = self.clear_color;
        self.active_target_mut().clear(planes, clear);
    }

    // -------- draw state --------

    pub fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    pub fn set_depth_func(&mut self, func: CompareFunc) {
        self.state.depth_func = func;
    }

    pub fn set_depth_write(&mut self, enabled: bool) {
        self.state.depth_write = enabled;
    }

    pub fn set_stencil_test(&mut self, enabled: bool) {
        self.state.stencil_test = enabled;
    }

    pub fn set_stencil_func(&mut self, func: CompareFunc, reference: u8, read_mask: u8) {
        self.state.stencil.func = func;
        self.state.stencil.reference = reference;
        self.state.stencil.read_mask = read_mask;
    }

    pub fn set_stencil_op(&mut self, fail: StencilOp, zfail: StencilOp, pass: StencilOp) {
        self.state.stencil.fail_op = fail;
        self.state.stencil.zfail_op = zfail;
        self.state.stencil.pass_op = pass;
    }

    pub fn set_stencil_write_mask(&mut self, mask: u8) {
        self.state.stencil.write_mask = mask;
    }

    pub fn set_alpha_test(&mut self, enabled: bool, cutoff: f32) {
        self.state.alpha_test = enabled;
        self.state.alpha_cutoff = cutoff;
    }

    pub fn set_blend_enabled(&mut self, enabled: bool) {
        self.state.blend = enabled;
    }

    pub fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.state.src_factor = src;
        self.state.dst_factor = dst;
    }

    pub fn set_blend_op(&mut self, op: BlendOp) {
        self.state.blend_op = op;
    }

    pub fn set_cull_face(&mut self, mode: CullFace) {
        self.state.cull_face = mode;
    }

    pub fn set_front_face(&mut self, winding: Winding) {
        self.state.front_face = winding;
    }

    pub fn set_color_mask(&mut self, mask: ColorMask) {
        self.state.color_mask = mask;
    }

    pub fn set_scissor(&mut self, rect: Option<ScissorRect>) {
        self.state.scissor = rect;
    }

    pub fn set_shading_frequency(&mut self, frequency: ShadingFrequency) {
        self.state.shading_frequency = frequency;
    }

    pub fn set_shading_params(&mut self, params: ShadingParams) {
        self.shading = params;
    }

    pub fn set_clip_planes(&mut self, planes: ClipPlanes) {
        self.clipper = Clipper::new(DEFAULT_NEAR_DISTANCE, planes);
    }

    pub fn draw_state(&self) -> &DrawState {
        &self.state
    }

    // -------- frame --------

    /// Record one triangle for the next `fence_primitives`. The current draw
    /// state and shading parameters are snapshotted with it.
    pub fn submit_primitive(&mut self, shader: Shader, v0: Vertex, v1: Vertex, v2: Vertex) {
        count_call!(FUNCTION_COUNTERS.triangles_submitted);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(DrawCommand {
            shader,
            verts: [v0, v1, v2],
            state: self.state,
            shading: self.shading,
            seq,
        });
    }

    pub fn pending_primitives(&self) -> usize {
        self.pending.len()
    }

    /// Barrier: clip, cull, assemble and bin every submitted triangle.
    /// Returns once all surviving triangles sit in their tiles' queues.
    pub fn fence_primitives(&mut self) {
        let start = Instant::now();
        let pending = std::mem::take(&mut self.pending);

        let target = &self.targets[self.active.0];
        let (width, height) = (target.width as f32, target.height as f32);
        let grid = &self.grid;
        let clipper = &self.clipper;

        let work = || {
            pending.par_iter().for_each(|cmd| {
                let clipped = clipper.clip(&cmd.verts[0], &cmd.verts[1], &cmd.verts[2]);
                for tri in clipped.iter() {
                    let ndc = [
                        tri[0].position * tri[0].rhw,
                        tri[1].position * tri[1].rhw,
                        tri[2].position * tri[2].rhw,
                    ];
                    if is_backface_culled(&ndc, &cmd.state) {
                        continue;
                    }

                    let triangle = Triangle::assemble([
                        tri[0].to_raster(width, height),
                        tri[1].to_raster(width, height),
                        tri[2].to_raster(width, height),
                    ]);
                    if triangle.culled {
                        count_call!(FUNCTION_COUNTERS.triangles_degenerate);
                        continue;
                    }

                    grid.bin(DrawTask {
                        triangle,
                        state: cmd.state,
                        shader: cmd.shader,
                        shading: cmd.shading,
                        seq: cmd.seq,
                    });
                }
            });
        };
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }

        self.stats.clip_bin_us = start.elapsed().as_secs_f64() * 1e6;
    }

    /// Barrier: rasterize every tile's queue in parallel, then resolve each
    /// tile when the target is multisampled. Returns once the target holds
    /// the complete image.
    pub fn fence_pixels(&mut self) {
        let start = Instant::now();

        let grid = &self.grid;
        let pool = self.pool.as_ref();
        let target = &mut self.targets[self.active.0];
        let resolve = target.samples_per_axis > 1;

        let mut jobs: Vec<_> = grid
            .tiles()
            .iter()
            .map(|tile| {
                (
                    target.tile_view(tile.x0, tile.y0, tile.x1, tile.y1),
                    tile.drain_sorted(),
                )
            })
            .collect();

        let mut raster = || {
            jobs.par_iter_mut().for_each(|(view, tasks)| {
                rasterize_tile(view, tasks);
            });
        };
        match pool {
            Some(pool) => pool.install(raster),
            None => raster(),
        }
        self.stats.raster_us = start.elapsed().as_secs_f64() * 1e6;

        if resolve {
            let resolve_start = Instant::now();
            let mut run = || {
                jobs.par_iter_mut().for_each(|(view, _)| view.resolve());
            };
            match pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
            self.stats.resolve_us = resolve_start.elapsed().as_secs_f64() * 1e6;
        } else {
            self.stats.resolve_us = 0.0;
        }
    }

    /// Timings of the most recent fence pair.
    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::target::unpack_color;

    fn clip_vertex(x: f32, y: f32, z: f32, color: Vec4) -> Vertex {
        Vertex::from_position_color(Vec4::new(x, y, z, 1.0), color)
    }

    fn draw_test_triangle(device: &mut GraphicsDevice, color: Vec4) {
        // Screen coords (400,100), (200,400), (600,400) in an 800x600
        // target, counter-clockwise in NDC.
        let v0 = clip_vertex(0.0, 2.0 / 3.0, 0.5, color);
        let v1 = clip_vertex(-0.5, -1.0 / 3.0, 0.5, color);
        let v2 = clip_vertex(0.5, -1.0 / 3.0, 0.5, color);
        device.submit_primitive(Shader::Flat { color }, v0, v1, v2);
        device.fence_primitives();
        device.fence_pixels();
    }

    #[test]
    fn single_triangle_end_to_end() {
        let mut device = GraphicsDevice::new(800, 600);
        device.clear_buffer(PlaneMask::ALL);
        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        draw_test_triangle(&mut device, red);

        let target = device.active_target();
        // Interior pixel gets the flat color and the triangle's depth.
        let c = unpack_color(target.color_at(400, 300, 0, 0).unwrap());
        assert!((c.x - 1.0).abs() < 0.01 && c.y < 0.01);
        let d = target.depth_at(400, 300, 0, 0).unwrap();
        assert!((d - 0.5).abs() < 1e-3);

        // Outside the bounding box: untouched.
        assert_eq!(target.color_at(50, 50, 0, 0), Some(0));
        assert_eq!(target.depth_at(50, 50, 0, 0), Some(1.0));
    }

    #[test]
    fn depth_test_is_idempotent_under_lequal() {
        let mut device = GraphicsDevice::new(800, 600);
        device.clear_buffer(PlaneMask::ALL);
        device.set_depth_func(CompareFunc::LessEqual);

        let white = Vec4::ONE;
        draw_test_triangle(&mut device, white);
        let first: Vec<Option<f32>> = (0..600)
            .map(|y| device.active_target().depth_at(400, y, 0, 0))
            .collect();

        draw_test_triangle(&mut device, white);
        for (y, expected) in first.iter().enumerate() {
            assert_eq!(
                device.active_target().depth_at(400, y, 0, 0),
                *expected,
                "second identical draw changed depth at y={y}"
            );
        }
    }

    #[test]
    fn unknown_buffer_id_is_rejected() {
        let mut device = GraphicsDevice::new(64, 64);
        assert!(!device.set_active_render_target(BufferId(42)));
        assert_eq!(device.width(), 64);
    }

    #[test]
    fn offscreen_target_round_trip() {
        let mut device = GraphicsDevice::new(64, 64);
        let shadow = device.create_buffer(128, 128, PlaneMask::DEPTH_ONLY);
        assert!(device.set_active_render_target(shadow));
        assert_eq!(device.width(), 128);
        device.reset_active_render_target();
        assert_eq!(device.width(), 64);
        assert!(device.get_buffer(shadow).is_some());
    }

    #[test]
    fn msaa_resolve_matches_single_sample_for_full_coverage() {
        let color = Vec4::new(0.2, 0.6, 0.9, 1.0);

        let mut plain = GraphicsDevice::new(64, 64);
        plain.clear_buffer(PlaneMask::ALL);
        draw_test_triangle(&mut plain, color);
        let reference = plain.active_target().color_at(32, 32, 0, 0).unwrap();

        let mut msaa = GraphicsDevice::new(64, 64);
        msaa.set_subsample_count(2);
        msaa.set_msaa_enabled(true);
        msaa.clear_buffer(PlaneMask::ALL);
        draw_test_triangle(&mut msaa, color);
        let resolved = msaa.display_plane()[32 * 64 + 32];

        let a = unpack_color(reference);
        let b = unpack_color(resolved);
        assert!(
            (a.truncate() - b.truncate()).length() < 0.02,
            "resolved color diverged: {a:?} vs {b:?}"
        );
    }

    #[test]
    fn behind_camera_triangle_draws_nothing() {
        let mut device = GraphicsDevice::new(64, 64);
        device.clear_buffer(PlaneMask::ALL);
        let c = Vec4::ONE;
        let behind = |x: f32, y: f32| {
            Vertex::from_position_color(Vec4::new(x, y, -1.0, -1.0), c)
        };
        device.submit_primitive(Shader::Flat { color: c }, behind(0.0, 1.0), behind(-1.0, -1.0), behind(1.0, -1.0));
        device.fence_primitives();
        device.fence_pixels();

        let target = device.active_target();
        for y in 0..64 {
            for x in 0..64 {
                assert_eq!(target.color_at(x, y, 0, 0), Some(0));
            }
        }
    }

    #[test]
    fn backface_is_culled_by_default() {
        let mut device = GraphicsDevice::new(64, 64);
        device.clear_buffer(PlaneMask::ALL);
        let c = Vec4::ONE;
        // Clockwise in NDC with the default CCW front face.
        let v0 = clip_vertex(0.0, 0.5, 0.5, c);
        let v1 = clip_vertex(0.5, -0.5, 0.5, c);
        let v2 = clip_vertex(-0.5, -0.5, 0.5, c);
        device.submit_primitive(Shader::Flat { color: c }, v0, v2, v1);
        device.fence_primitives();
        device.fence_pixels();
        assert_eq!(device.active_target().color_at(32, 32, 0, 0), Some(0));

        // The same triangle with culling off must draw.
        device.set_cull_face(CullFace::None);
        device.submit_primitive(Shader::Flat { color: c }, v0, v2, v1);
        device.fence_primitives();
        device.fence_pixels();
        assert_ne!(device.active_target().color_at(32, 32, 0, 0), Some(0));
    }

    #[test]
    fn state_is_snapshotted_at_submission() {
        let mut device = GraphicsDevice::new(64, 64);
        device.clear_buffer(PlaneMask::ALL);
        let c = Vec4::ONE;
        let v0 = clip_vertex(0.0, 0.5, 0.5, c);
        let v1 = clip_vertex(-0.5, -0.5, 0.5, c);
        let v2 = clip_vertex(0.5, -0.5, 0.5, c);
        device.submit_primitive(Shader::Flat { color: c }, v0, v1, v2);
        // Changing the mask after submission must not affect the queued draw.
        device.set_color_mask(ColorMask::NONE);
        device.fence_primitives();
        device.fence_pixels();
        assert_ne!(device.active_target().color_at(32, 32, 0, 0), Some(0));
    }
}
