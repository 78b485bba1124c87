/// Per-sample fragment operations.
///
/// Fixed evaluation order for every candidate subsample:
/// scissor, early depth (when eligible), shading, alpha test, stencil test,
/// depth test, depth write, blending, then the coverage mark and the
/// color-masked write. The stencil plane updates on stencil fail and depth
/// fail as well as on full pass, each through its own operation.
use glam::Vec4;

use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;
use crate::pipeline::state::{BlendOp, ColorMask, DrawState};
use crate::pipeline::target::{pack_color, unpack_color, TileView};

/// Scissor test in pixel space. Samples of a pixel share the result.
#[inline]
pub fn scissor_rejects(x: usize, y: usize, state: &DrawState) -> bool {
    match state.scissor {
        Some(rect) => !rect.contains(x, y),
        None => false,
    }
}

/// Conservative early depth rejection, run before shading. Only legal when
/// the depth test alone decides sample survival; alpha or stencil testing
/// disqualify it because they have side effects of their own.
#[inline]
pub fn early_z_rejects(view: &TileView, idx: usize, depth: f32, state: &DrawState) -> bool {
    if !state.early_z_eligible() {
        return false;
    }
    if let Some(stored) = view.read_depth(idx) {
        if !state.depth_func.passes_f32(depth, stored) {
            count_call!(FUNCTION_COUNTERS.early_z_rejects);
            return true;
        }
    }
    false
}

#[inline]
fn write_stencil_masked(view: &mut TileView, idx: usize, stored: u8, result: u8, write_mask: u8) {
    let merged = (stored & !write_mask) | (result & write_mask);
    view.write_stencil(idx, merged);
}

/// Combine the shaded source color with the stored destination color.
fn blend_colors(src: Vec4, dst: Vec4, state: &DrawState) -> Vec4 {
    match state.blend_op {
        BlendOp::Min => src.min(dst),
        BlendOp::Max => src.max(dst),
        op => {
            let sw = state.src_factor.weight(src.w, dst.w);
            let dw = state.dst_factor.weight(src.w, dst.w);
            match op {
                BlendOp::Add => src * sw + dst * dw,
                BlendOp::Subtract => src * sw - dst * dw,
                BlendOp::ReverseSubtract => dst * dw - src * sw,
                _ => unreachable!(),
            }
        }
    }
}

#[inline]
fn write_color_masked(view: &mut TileView, idx: usize, color: Vec4, mask: ColorMask) {
    if mask == ColorMask::ALL {
        view.write_color(idx, pack_color(color));
        return;
    }
    if let Some(stored) = view.read_color(idx) {
        let dst = unpack_color(stored);
        let merged = Vec4::new(
            if mask.red() { color.x } else { dst.x },
            if mask.green() { color.y } else { dst.y },
            if mask.blue() { color.z } else { dst.z },
            if mask.alpha() { color.w } else { dst.w },
        );
        view.write_color(idx, pack_color(merged));
    }
}

/// Run a shaded sample through alpha, stencil, depth, blend and the final
/// write. Returns true when the sample's color landed in the target.
pub fn write_sample(
    view: &mut TileView,
    idx: usize,
    depth: f32,
    color: Vec4,
    state: &DrawState,
) -> bool {
    if state.alpha_test && color.w < state.alpha_cutoff {
        count_call!(FUNCTION_COUNTERS.alpha_discards);
        return false;
    }

    // Stencil test. An absent stencil plane passes and updates nothing.
    let mut stencil_stored = None;
    if state.stencil_test {
        if let Some(stored) = view.read_stencil(idx) {
            let s = state.stencil;
            if !s.func.passes_u8(s.reference & s.read_mask, stored & s.read_mask) {
                count_call!(FUNCTION_COUNTERS.stencil_test_fails);
                write_stencil_masked(view, idx, stored, s.fail_op.apply(stored, s.reference), s.write_mask);
                return false;
            }
            stencil_stored = Some(stored);
        }
    }

    // Depth test. An absent depth plane passes.
    if state.depth_test {
        if let Some(stored) = view.read_depth(idx) {
            if !state.depth_func.passes_f32(depth, stored) {
                count_call!(FUNCTION_COUNTERS.depth_test_fails);
                if let Some(stencil) = stencil_stored {
                    let s = state.stencil;
                    write_stencil_masked(view, idx, stencil, s.zfail_op.apply(stencil, s.reference), s.write_mask);
                }
                return false;
            }
        }
    }

    if let Some(stencil) = stencil_stored {
        let s = state.stencil;
        write_stencil_masked(view, idx, stencil, s.pass_op.apply(stencil, s.reference), s.write_mask);
    }

    if state.depth_write {
        view.write_depth(idx, depth);
    }

    let out = if state.blend {
        match view.read_color(idx) {
            Some(stored) => blend_colors(color, unpack_color(stored), state),
            None => color,
        }
    } else {
        color
    };

    view.mark_covered(idx);
    write_color_masked(view, idx, out, state.color_mask);
    count_call!(FUNCTION_COUNTERS.samples_written);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::{
        BlendFactor, CompareFunc, ScissorRect, StencilOp, StencilState,
    };
    use crate::pipeline::target::{PlaneMask, RenderTarget};

    fn target() -> RenderTarget {
        let mut t = RenderTarget::new(4, 4, PlaneMask::ALL, 1);
        t.clear(PlaneMask::ALL, 0);
        t
    }

    #[test]
    fn scissor_shares_result_across_pixel() {
        let mut state = DrawState::default();
        state.scissor = Some(ScissorRect { x0: 1, y0: 1, x1: 3, y1: 3 });
        assert!(scissor_rejects(0, 0, &state));
        assert!(!scissor_rejects(1, 1, &state));
        assert!(scissor_rejects(3, 1, &state));
    }

    #[test]
    fn depth_less_rejects_equal_depth() {
        let mut t = target();
        let mut view = t.tile_view(0, 0, 4, 4);
        let idx = view.sample_index(0, 0, 0, 0).unwrap();
        let state = DrawState::default();

        assert!(write_sample(&mut view, idx, 0.5, Vec4::ONE, &state));
        // Same depth must fail under LESS, leaving the depth value alone.
        assert!(!write_sample(&mut view, idx, 0.5, Vec4::ZERO, &state));
        assert_eq!(view.read_depth(idx), Some(0.5));
    }

    #[test]
    fn depth_write_can_be_disabled_independently() {
        let mut t = target();
        let mut view = t.tile_view(0, 0, 4, 4);
        let idx = view.sample_index(1, 1, 0, 0).unwrap();
        let mut state = DrawState::default();
        state.depth_write = false;

        assert!(write_sample(&mut view, idx, 0.25, Vec4::ONE, &state));
        assert_eq!(view.read_depth(idx), Some(1.0), "depth plane untouched");
        assert!(view.is_covered(idx));
    }

    #[test]
    fn alpha_test_discards_before_stencil_update() {
        let mut t = target();
        let mut view = t.tile_view(0, 0, 4, 4);
        let idx = view.sample_index(0, 0, 0, 0).unwrap();
        let mut state = DrawState::default();
        state.alpha_test = true;
        state.stencil_test = true;
        state.stencil = StencilState {
            fail_op: StencilOp::Replace,
            reference: 7,
            ..StencilState::default()
        };

        assert!(!write_sample(&mut view, idx, 0.5, Vec4::new(1.0, 1.0, 1.0, 0.1), &state));
        assert_eq!(view.read_stencil(idx), Some(0), "discarded fragments never touch stencil");
    }

    #[test]
    fn stencil_fail_op_applies_through_write_mask() {
        let mut t = target();
        let mut view = t.tile_view(0, 0, 4, 4);
        let idx = view.sample_index(0, 0, 0, 0).unwrap();
        let mut state = DrawState::default();
        state.stencil_test = true;
        state.stencil = StencilState {
            func: CompareFunc::Never,
            fail_op: StencilOp::Replace,
            reference: 0xFF,
            write_mask: 0x0F,
            ..StencilState::default()
        };

        assert!(!write_sample(&mut view, idx, 0.5, Vec4::ONE, &state));
        assert_eq!(view.read_stencil(idx), Some(0x0F));
        assert!(!view.is_covered(idx), "stencil-failed sample writes no color");
    }

    #[test]
    fn stencil_zfail_and_pass_ops() {
        let mut t = target();
        let mut view = t.tile_view(0, 0, 4, 4);
        let idx = view.sample_index(0, 0, 0, 0).unwrap();
        let mut state = DrawState::default();
        state.stencil_test = true;
        state.stencil = StencilState {
            pass_op: StencilOp::Increment,
            zfail_op: StencilOp::Increment,
            ..StencilState::default()
        };

        // Pass path increments.
        assert!(write_sample(&mut view, idx, 0.5, Vec4::ONE, &state));
        assert_eq!(view.read_stencil(idx), Some(1));
        // Depth fail path also increments, via the zfail op.
        assert!(!write_sample(&mut view, idx, 0.9, Vec4::ONE, &state));
        assert_eq!(view.read_stencil(idx), Some(2));
    }

    #[test]
    fn src_alpha_blend_mixes_with_destination() {
        let mut t = target();
        let mut view = t.tile_view(0, 0, 4, 4);
        let idx = view.sample_index(0, 0, 0, 0).unwrap();
        let state = DrawState::default();

        // Opaque red, then half-transparent blue blended on top.
        assert!(write_sample(&mut view, idx, 0.5, Vec4::new(1.0, 0.0, 0.0, 1.0), &state));
        let mut blended = state;
        blended.blend = true;
        blended.depth_func = CompareFunc::LessEqual;
        assert!(write_sample(&mut view, idx, 0.5, Vec4::new(0.0, 0.0, 1.0, 0.5), &blended));

        let c = unpack_color(view.read_color(idx).unwrap());
        assert!((c.x - 0.5).abs() < 0.01);
        assert!((c.z - 0.5).abs() < 0.01);
    }

    #[test]
    fn color_mask_preserves_disabled_channels() {
        let mut t = target();
        let mut view = t.tile_view(0, 0, 4, 4);
        let idx = view.sample_index(0, 0, 0, 0).unwrap();
        let state = DrawState::default();
        assert!(write_sample(&mut view, idx, 0.6, Vec4::new(0.0, 1.0, 0.0, 1.0), &state));

        let mut masked = state;
        masked.color_mask = ColorMask(ColorMask::R);
        masked.depth_func = CompareFunc::LessEqual;
        assert!(write_sample(&mut view, idx, 0.6, Vec4::new(1.0, 0.0, 0.0, 0.0), &masked));

        let c = unpack_color(view.read_color(idx).unwrap());
        assert!((c.x - 1.0).abs() < 0.01, "red channel written");
        assert!((c.y - 1.0).abs() < 0.01, "green channel preserved");
    }

    #[test]
    fn early_z_only_when_eligible() {
        let mut t = target();
        let mut view = t.tile_view(0, 0, 4, 4);
        let idx = view.sample_index(0, 0, 0, 0).unwrap();
        view.write_depth(idx, 0.3);

        let state = DrawState::default();
        assert!(early_z_rejects(&view, idx, 0.8, &state));
        assert!(!early_z_rejects(&view, idx, 0.1, &state));

        let mut with_alpha = state;
        with_alpha.alpha_test = true;
        assert!(
            !early_z_rejects(&view, idx, 0.8, &with_alpha),
            "alpha test forbids early depth rejection"
        );
    }
}
