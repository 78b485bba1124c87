/// Tile grid and draw-task binning.
///
/// The framebuffer is divided into fixed-size square tiles, each with its own
/// task queue. Binning walks a triangle's padded screen bounds, intersects
/// them with the grid and pushes a task clone into every overlapped tile.
/// Binning runs in parallel over triangles, so queue order within a tile is
/// nondeterministic; tasks carry a submission sequence number and each tile
/// sorts its queue by it before rasterizing, restoring FIFO order per tile.
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;
use crate::pipeline::shader::Shader;
use crate::pipeline::state::{DrawState, ShadingParams};
use crate::pipeline::triangle::Triangle;

pub const TILE_SIZE: usize = 64;

/// One screen-space triangle plus the full state snapshot it was submitted
/// under. State is captured at submission so later state changes never
/// retroactively affect queued work.
#[derive(Clone)]
pub struct DrawTask {
    pub triangle: Triangle,
    pub state: DrawState,
    pub shader: Shader,
    pub shading: ShadingParams,
    /// Submission order, used to restore FIFO within a tile after parallel
    /// binning.
    pub seq: u64,
}

/// A tile: a pixel rectangle and its pending task queue.
pub struct Tile {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
    queue: Mutex<VecDeque<DrawTask>>,
}

impl Tile {
    fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, task: DrawTask) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(task);
        }
        count_call!(FUNCTION_COUNTERS.tile_tasks_binned);
    }

    /// Take all queued tasks in submission order.
    pub fn drain_sorted(&self) -> Vec<DrawTask> {
        let mut tasks: Vec<DrawTask> = match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        tasks.sort_by_key(|t| t.seq);
        tasks
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

/// Grid of tiles covering a render target.
pub struct TileGrid {
    pub width: usize,
    pub height: usize,
    pub cols: usize,
    pub rows: usize,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(width: usize, height: usize) -> Self {
        let cols = width.div_ceil(TILE_SIZE);
        let rows = height.div_ceil(TILE_SIZE);
        let mut tiles = Vec::with_capacity(cols * rows);
        for row in 0..rows {
            for col in 0..cols {
                let x0 = col * TILE_SIZE;
                let y0 = row * TILE_SIZE;
                tiles.push(Tile::new(
                    x0,
                    y0,
                    (x0 + TILE_SIZE).min(width),
                    (y0 + TILE_SIZE).min(height),
                ));
            }
        }
        Self {
            width,
            height,
            cols,
            rows,
            tiles,
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Push a task into every tile its triangle's padded bounds overlap.
    /// Bounds fully off screen bin nothing.
    pub fn bin(&self, task: DrawTask) {
        let (min_x, min_y, max_x, max_y) = task.triangle.padded_bounds();
        if max_x < 0.0 || max_y < 0.0 || min_x >= self.width as f32 || min_y >= self.height as f32 {
            return;
        }

        let col0 = (min_x.max(0.0) as usize) / TILE_SIZE;
        let row0 = (min_y.max(0.0) as usize) / TILE_SIZE;
        let col1 = ((max_x as usize).min(self.width - 1)) / TILE_SIZE;
        let row1 = ((max_y as usize).min(self.height - 1)) / TILE_SIZE;

        for row in row0..=row1 {
            for col in col0..=col1 {
                self.tiles[row * self.cols + col].push(task.clone());
            }
        }
    }
}
