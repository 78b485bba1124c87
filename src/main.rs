/// Main application entry point
/// Handles window creation, input, and the render loop of the demo scene
use glam::{Mat4, Vec2, Vec3, Vec4};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    event::*,
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use softpipe::pipeline::state::{BlendFactor, CullFace, ShadingFrequency};
use softpipe::{GraphicsDevice, PlaneMask, Shader, Vertex, FUNCTION_COUNTERS};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Softpipe - CPU Rasterization Demo ===");
    println!("Controls:");
    println!("  M   - Toggle MSAA");
    println!("  1-4 - Subsample count per axis");
    println!("  F   - Toggle pixel/sample shading frequency");
    println!("  P   - Print pipeline counters");
    println!("  ESC - Exit");
    println!();

    let event_loop = EventLoop::new().unwrap();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Softpipe")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720))
            .build(&event_loop)
            .unwrap(),
    );

    let context = softbuffer::Context::new(window.clone()).unwrap();
    let mut surface = softbuffer::Surface::new(&context, window.clone()).unwrap();

    let window_size = window.inner_size();
    let mut device =
        GraphicsDevice::new(window_size.width as usize, window_size.height as usize);
    device.set_clear_color(Vec4::new(0.53, 0.81, 0.92, 1.0)); // Sky blue
    device.set_subsample_count(2);

    let start_time = Instant::now();
    let mut frame_count = 0u32;
    let mut fps_timer = Instant::now();
    let mut frequency = ShadingFrequency::Pixel;

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        elwt.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        device.set_viewport(new_size.width as usize, new_size.height as usize);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        let pressed = event.state == ElementState::Pressed;
                        if let PhysicalKey::Code(keycode) = event.physical_key {
                            match keycode {
                                KeyCode::KeyM if pressed => {
                                    let enabled = !device.msaa_enabled();
                                    device.set_msaa_enabled(enabled);
                                    println!("MSAA: {}", if enabled { "ON" } else { "OFF" });
                                }
                                KeyCode::Digit1 if pressed => device.set_subsample_count(1),
                                KeyCode::Digit2 if pressed => device.set_subsample_count(2),
                                KeyCode::Digit3 if pressed => device.set_subsample_count(3),
                                KeyCode::Digit4 if pressed => device.set_subsample_count(4),
                                KeyCode::KeyF if pressed => {
                                    frequency = match frequency {
                                        ShadingFrequency::Pixel => ShadingFrequency::Sample,
                                        ShadingFrequency::Sample => ShadingFrequency::Pixel,
                                    };
                                    device.set_shading_frequency(frequency);
                                    println!("Shading frequency: {frequency:?}");
                                }
                                KeyCode::KeyP if pressed => {
                                    FUNCTION_COUNTERS.snapshot().print_report();
                                }
                                KeyCode::Escape if pressed => {
                                    elwt.exit();
                                }
                                _ => {}
                            }
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        let t = start_time.elapsed().as_secs_f32();
                        render_frame(&mut device, t);

                        let (width, height) = (device.width(), device.height());
                        surface
                            .resize(
                                NonZeroU32::new(width as u32).unwrap(),
                                NonZeroU32::new(height as u32).unwrap(),
                            )
                            .unwrap();
                        let mut buffer = surface.buffer_mut().unwrap();
                        buffer.copy_from_slice(device.display_plane());
                        buffer.present().unwrap();

                        frame_count += 1;
                        if fps_timer.elapsed().as_secs() >= 1 {
                            let stats = device.frame_stats();
                            println!(
                                "FPS: {frame_count} | clip+bin {:.0}us | raster {:.0}us | resolve {:.0}us",
                                stats.clip_bin_us, stats.raster_us, stats.resolve_us
                            );
                            frame_count = 0;
                            fps_timer = Instant::now();
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .unwrap();
}

/// Demo scene: a checkered floor, a spinning Lambert-shaded cube and a
/// translucent blended quad in front of it.
fn render_frame(device: &mut GraphicsDevice, t: f32) {
    device.clear_buffer(PlaneMask::ALL);

    let aspect = device.width() as f32 / device.height() as f32;
    let proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 100.0);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 6.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y);
    let view_proj = proj * view;

    submit_floor(device, &view_proj);
    submit_cube(device, &view_proj, Mat4::from_rotation_y(t) * Mat4::from_rotation_x(t * 0.3));
    submit_glass_quad(device, &view_proj, t);

    device.fence_primitives();
    device.fence_pixels();
}

fn transform_vertex(view_proj: &Mat4, model: &Mat4, local: Vec3, normal: Vec3, uv: Vec2) -> Vertex {
    let world = model.transform_point3(local);
    let world_normal = model.transform_vector3(normal).normalize_or_zero();
    let mut v = Vertex {
        position: *view_proj * world.extend(1.0),
        world_pos: world,
        normal: world_normal,
        uv,
        color: Vec4::ONE,
        ..Vertex::default()
    };
    v.derive_rhw();
    v
}

fn submit_floor(device: &mut GraphicsDevice, view_proj: &Mat4) {
    let shader = Shader::Checker {
        scale: 2.0,
        color_a: Vec4::new(0.85, 0.85, 0.85, 1.0),
        color_b: Vec4::new(0.25, 0.3, 0.35, 1.0),
    };
    let model = Mat4::IDENTITY;
    let half = 8.0;
    let corners = [
        (Vec3::new(-half, 0.0, -half), Vec2::new(0.0, 0.0)),
        (Vec3::new(half, 0.0, -half), Vec2::new(1.0, 0.0)),
        (Vec3::new(half, 0.0, half), Vec2::new(1.0, 1.0)),
        (Vec3::new(-half, 0.0, half), Vec2::new(0.0, 1.0)),
    ];
    let vx = |i: usize| transform_vertex(view_proj, &model, corners[i].0, Vec3::Y, corners[i].1);

    device.set_cull_face(CullFace::None);
    device.submit_primitive(shader, vx(0), vx(2), vx(1));
    device.submit_primitive(shader, vx(0), vx(3), vx(2));
    device.set_cull_face(CullFace::Back);
}

fn submit_cube(device: &mut GraphicsDevice, view_proj: &Mat4, spin: Mat4) {
    let model = Mat4::from_translation(Vec3::new(0.0, 1.2, 0.0)) * spin;

    // Each face: outward normal and 4 corners, CCW seen from outside.
    let faces: [(Vec3, [Vec3; 4]); 6] = [
        (Vec3::Z, [
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ]),
        (Vec3::NEG_Z, [
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
        ]),
        (Vec3::X, [
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(0.5, 0.5, 0.5),
        ]),
        (Vec3::NEG_X, [
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, -0.5),
        ]),
        (Vec3::Y, [
            Vec3::new(-0.5, 0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
        ]),
        (Vec3::NEG_Y, [
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(-0.5, -0.5, 0.5),
        ]),
    ];

    let shader = Shader::Lambert;
    for (normal, corners) in &faces {
        let uv = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let vx =
            |i: usize| transform_vertex(view_proj, &model, corners[i], *normal, uv[i]);
        device.submit_primitive(shader, vx(0), vx(1), vx(2));
        device.submit_primitive(shader, vx(0), vx(2), vx(3));
    }
}

fn submit_glass_quad(device: &mut GraphicsDevice, view_proj: &Mat4, t: f32) {
    let model = Mat4::from_translation(Vec3::new((t * 0.7).sin() * 1.5, 1.0, 2.0));
    let shader = Shader::Flat {
        color: Vec4::new(0.3, 0.5, 1.0, 0.45),
    };
    let corners = [
        Vec3::new(-0.8, -0.8, 0.0),
        Vec3::new(0.8, -0.8, 0.0),
        Vec3::new(0.8, 0.8, 0.0),
        Vec3::new(-0.8, 0.8, 0.0),
    ];
    let vx = |i: usize| transform_vertex(view_proj, &model, corners[i], Vec3::Z, Vec2::ZERO);

    device.set_blend_enabled(true);
    device.set_blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
    device.set_depth_write(false);
    device.set_cull_face(CullFace::None);
    device.submit_primitive(shader, vx(0), vx(1), vx(2));
    device.submit_primitive(shader, vx(0), vx(2), vx(3));
    device.set_cull_face(CullFace::Back);
    device.set_depth_write(true);
    device.set_blend_enabled(false);
}
