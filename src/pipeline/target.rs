/// Render targets for software rendering.
///
/// A target owns up to four planes (color, depth, stencil, coverage) stored
/// as separate `Vec`s for independent access patterns, plus a single-sample
/// display plane when MSAA is active. Planes are allocated at
/// `samples_per_axis` subsamples per pixel axis, so a 2x MSAA target stores
/// 4 subsamples per pixel.
///
/// All per-pixel accessors are bounds-checked and report success as a bool;
/// out-of-range access is a recoverable no-op, never a fault.
use glam::Vec4;

use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;

/// Which planes a target owns / which planes a clear touches.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PlaneMask(pub u8);

impl PlaneMask {
    pub const COLOR: u8 = 1 << 0;
    pub const DEPTH: u8 = 1 << 1;
    pub const STENCIL: u8 = 1 << 2;
    pub const COVERAGE: u8 = 1 << 3;
    pub const ALL: Self = Self(0b1111);
    /// Depth-only target (shadow maps).
    pub const DEPTH_ONLY: Self = Self(Self::DEPTH);

    #[inline]
    pub fn has(self, plane: u8) -> bool {
        self.0 & plane != 0
    }
}

pub const DEPTH_CLEAR: f32 = 1.0;

/// Convert a linear-ish float RGBA color to packed ARGB32.
#[inline]
pub fn pack_color(c: Vec4) -> u32 {
    let r = (c.x.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    let g = (c.y.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    let b = (c.z.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    let a = (c.w.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    (a << 24) | (r << 16) | (g << 8) | b
}

/// Unpack ARGB32 into float RGBA.
#[inline]
pub fn unpack_color(c: u32) -> Vec4 {
    const INV: f32 = 1.0 / 255.0;
    Vec4::new(
        ((c >> 16) & 0xFF) as f32 * INV,
        ((c >> 8) & 0xFF) as f32 * INV,
        (c & 0xFF) as f32 * INV,
        ((c >> 24) & 0xFF) as f32 * INV,
    )
}

pub struct RenderTarget {
    pub width: usize,
    pub height: usize,
    /// Subsamples per pixel axis; 1 when single-sampled.
    pub samples_per_axis: usize,
    pub planes: PlaneMask,
    color: Vec<u32>,
    depth: Vec<f32>,
    stencil: Vec<u8>,
    coverage: Vec<u8>,
    /// Resolved single-sample color, only allocated when MSAA is on.
    display: Vec<u32>,
}

impl RenderTarget {
    pub fn new(width: usize, height: usize, planes: PlaneMask, samples_per_axis: usize) -> Self {
        let samples_per_axis = samples_per_axis.max(1);
        let sample_count = width * samples_per_axis * height * samples_per_axis;
        let pixel_count = width * height;

        Self {
            width,
            height,
            samples_per_axis,
            planes,
            color: if planes.has(PlaneMask::COLOR) {
                vec![0; sample_count]
            } else {
                Vec::new()
            },
            depth: if planes.has(PlaneMask::DEPTH) {
                vec![DEPTH_CLEAR; sample_count]
            } else {
                Vec::new()
            },
            stencil: if planes.has(PlaneMask::STENCIL) {
                vec![0; sample_count]
            } else {
                Vec::new()
            },
            coverage: if planes.has(PlaneMask::COVERAGE) {
                vec![0; sample_count]
            } else {
                Vec::new()
            },
            display: if samples_per_axis > 1 && planes.has(PlaneMask::COLOR) {
                vec![0; pixel_count]
            } else {
                Vec::new()
            },
        }
    }

    /// Reallocate for new dimensions or subsample count. Precondition: no
    /// tile tasks in flight (callers must fence first).
    pub fn reconfigure(&mut self, width: usize, height: usize, samples_per_axis: usize) {
        *self = Self::new(width, height, self.planes, samples_per_axis);
    }

    /// Subsamples per pixel (N*N for N per axis).
    #[inline]
    pub fn samples_per_pixel(&self) -> usize {
        self.samples_per_axis * self.samples_per_axis
    }

    /// Stride of the sample planes in subsamples.
    #[inline]
    fn sample_stride(&self) -> usize {
        self.width * self.samples_per_axis
    }

    /// Linear index of subsample (sx, sy) of pixel (x, y); None when out of
    /// range.
    #[inline]
    pub fn sample_index(&self, x: usize, y: usize, sx: usize, sy: usize) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let s = self.samples_per_axis;
        if sx >= s || sy >= s {
            return None;
        }
        Some((y * s + sy) * self.sample_stride() + (x * s + sx))
    }

    /// Clear the selected planes. Color planes take the given clear color;
    /// depth clears to the far value, stencil and coverage to zero.
    pub fn clear(&mut self, mask: PlaneMask, clear_color: u32) {
        if mask.has(PlaneMask::COLOR) {
            self.color.fill(clear_color);
            self.display.fill(clear_color);
        }
        if mask.has(PlaneMask::DEPTH) {
            self.depth.fill(DEPTH_CLEAR);
        }
        if mask.has(PlaneMask::STENCIL) {
            self.stencil.fill(0);
        }
        if mask.has(PlaneMask::COVERAGE) {
            self.coverage.fill(0);
        }
    }

    /// The plane to present: the resolved display plane under MSAA, the
    /// color plane otherwise.
    pub fn display_plane(&self) -> &[u32] {
        if self.samples_per_axis > 1 {
            &self.display
        } else {
            &self.color
        }
    }

    /// Read one depth sample; None when the plane is absent or the index is
    /// out of range.
    pub fn depth_at(&self, x: usize, y: usize, sx: usize, sy: usize) -> Option<f32> {
        let idx = self.sample_index(x, y, sx, sy)?;
        self.depth.get(idx).copied()
    }

    /// Read one color sample.
    pub fn color_at(&self, x: usize, y: usize, sx: usize, sy: usize) -> Option<u32> {
        let idx = self.sample_index(x, y, sx, sy)?;
        self.color.get(idx).copied()
    }

    /// Read one stencil sample.
    pub fn stencil_at(&self, x: usize, y: usize, sx: usize, sy: usize) -> Option<u8> {
        let idx = self.sample_index(x, y, sx, sy)?;
        self.stencil.get(idx).copied()
    }

    /// Split the target into per-tile views for parallel rasterization.
    /// Views carry raw pointers into the backing planes; they are safe to
    /// use concurrently because every view only touches its own disjoint
    /// pixel rectangle.
    pub fn tile_view(&mut self, x0: usize, y0: usize, x1: usize, y1: usize) -> TileView {
        TileView {
            x0,
            y0,
            x1: x1.min(self.width),
            y1: y1.min(self.height),
            width: self.width,
            samples_per_axis: self.samples_per_axis,
            color: self.color.as_mut_ptr(),
            color_len: self.color.len(),
            depth: self.depth.as_mut_ptr(),
            depth_len: self.depth.len(),
            stencil: self.stencil.as_mut_ptr(),
            stencil_len: self.stencil.len(),
            coverage: self.coverage.as_mut_ptr(),
            coverage_len: self.coverage.len(),
            display: self.display.as_mut_ptr(),
            display_len: self.display.len(),
        }
    }
}

/// View into one rectangular tile of a render target.
///
/// Internally raw pointers into the backing planes; tiles partition the
/// target into disjoint pixel rectangles, and every accessor rejects pixels
/// outside the view's rectangle, so concurrent tile views never alias.
pub struct TileView {
    /// Pixel-space rectangle, half-open.
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
    width: usize,
    samples_per_axis: usize,
    color: *mut u32,
    color_len: usize,
    depth: *mut f32,
    depth_len: usize,
    stencil: *mut u8,
    stencil_len: usize,
    coverage: *mut u8,
    coverage_len: usize,
    display: *mut u32,
    display_len: usize,
}

// Safety: a TileView only dereferences plane memory for pixels inside its
// own rectangle, and the device hands out exactly one view per disjoint
// tile rectangle per frame phase.
unsafe impl Send for TileView {}

impl TileView {
    #[inline]
    pub fn samples_per_axis(&self) -> usize {
        self.samples_per_axis
    }

    #[inline]
    pub fn samples_per_pixel(&self) -> usize {
        self.samples_per_axis * self.samples_per_axis
    }

    #[inline]
    pub fn contains_pixel(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Linear sample index, or None when the pixel lies outside this tile
    /// or the subsample coordinates are out of range.
    #[inline]
    pub fn sample_index(&self, x: usize, y: usize, sx: usize, sy: usize) -> Option<usize> {
        if !self.contains_pixel(x, y) {
            return None;
        }
        let s = self.samples_per_axis;
        if sx >= s || sy >= s {
            return None;
        }
        Some((y * s + sy) * (self.width * s) + (x * s + sx))
    }

    #[inline]
    pub fn read_depth(&self, idx: usize) -> Option<f32> {
        if idx < self.depth_len {
            Some(unsafe { *self.depth.add(idx) })
        } else {
            None
        }
    }

    #[inline]
    pub fn write_depth(&mut self, idx: usize, value: f32) -> bool {
        if idx < self.depth_len {
            unsafe { *self.depth.add(idx) = value };
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn read_color(&self, idx: usize) -> Option<u32> {
        if idx < self.color_len {
            Some(unsafe { *self.color.add(idx) })
        } else {
            None
        }
    }

    #[inline]
    pub fn write_color(&mut self, idx: usize, value: u32) -> bool {
        if idx < self.color_len {
            unsafe { *self.color.add(idx) = value };
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn read_stencil(&self, idx: usize) -> Option<u8> {
        if idx < self.stencil_len {
            Some(unsafe { *self.stencil.add(idx) })
        } else {
            None
        }
    }

    #[inline]
    pub fn write_stencil(&mut self, idx: usize, value: u8) -> bool {
        if idx < self.stencil_len {
            unsafe { *self.stencil.add(idx) = value };
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn mark_covered(&mut self, idx: usize) -> bool {
        if idx < self.coverage_len {
            unsafe { *self.coverage.add(idx) = 1 };
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn is_covered(&self, idx: usize) -> bool {
        idx < self.coverage_len && unsafe { *self.coverage.add(idx) } != 0
    }

    /// MSAA resolve for this tile: box-filter every pixel's covered
    /// subsamples into the display plane, weighting each by
    /// 1/subsample-count and forcing alpha opaque. Pixels with no covered
    /// subsample are left untouched (they keep the clear color and are
    /// never polluted by uninitialized subsamples).
    pub fn resolve(&mut self) {
        let s = self.samples_per_axis;
        if s <= 1 || self.display_len == 0 {
            return;
        }
        let inv = 1.0 / (s * s) as f32;

        for y in self.y0..self.y1 {
            for x in self.x0..self.x1 {
                let mut sum = Vec4::ZERO;
                let mut any = false;
                for sy in 0..s {
                    for sx in 0..s {
                        // Indices inside the tile rect are always valid here.
                        if let Some(idx) = self.sample_index(x, y, sx, sy) {
                            if self.is_covered(idx) {
                                if let Some(c) = self.read_color(idx) {
                                    sum += unpack_color(c);
                                    any = true;
                                }
                            }
                        }
                    }
                }
                if !any {
                    continue;
                }
                let mut resolved = sum * inv;
                resolved.w = 1.0;
                let display_idx = y * self.width + x;
                if display_idx < self.display_len {
                    unsafe { *self.display.add(display_idx) = pack_color(resolved) };
                }
                count_call!(FUNCTION_COUNTERS.pixels_resolved);
            }
        }
    }
}
