//! Headless rendering example
//!
//! Demonstrates:
//! - Creating an offscreen wgpu device (no window required)
//! - Renderer setup with the default shader set
//! - Shadow-casting lights authored three ways: by hand, from
//!   attenuation terms, and as a sun direction
//! - Drawing the three primitives over a few frames
//!
//! Run from the workspace root so `shaders/` resolves:
//! `cargo run -p candela_wgpu --example headless`

use candela_render::{Camera, DirectionalLight, Light, PointLight, Renderer, RendererConfig};
use candela_wgpu::{WgpuConfig, WgpuDevice};
use glam::{Vec2, Vec3};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting headless renderer example");

    let device = WgpuDevice::create_blocking(WgpuConfig::default())
        .expect("Failed to create wgpu device");

    let mut renderer = Renderer::new(device, RendererConfig::default());
    renderer.init().expect("Failed to initialize renderer");

    let camera = Camera::default();
    renderer.set_view_matrix(camera.view_matrix());
    renderer.set_projection_matrix(camera.projection_matrix());
    renderer.set_clear_color([0.05, 0.05, 0.08, 1.0]);

    // A hand-placed key light, a fill light converted from
    // OpenGL-style attenuation terms, and a distant sun.
    renderer
        .add_light(Light::new(
            Vec3::new(2.0, 6.0, 3.0),
            Vec3::new(1.0, 0.95, 0.85),
            1.2,
            30.0,
        ))
        .expect("Failed to add key light");

    let fill = PointLight {
        position: Vec3::new(-4.0, 3.0, -1.0),
        color: Vec3::new(0.4, 0.5, 0.9),
        intensity: 0.6,
        ..Default::default()
    };
    renderer
        .add_light(Light::from(fill))
        .expect("Failed to add fill light");

    let sun = DirectionalLight {
        direction: Vec3::new(-0.3, -1.0, -0.2),
        color: Vec3::new(1.0, 0.98, 0.9),
        intensity: 0.8,
    };
    renderer
        .add_light(Light::from(sun))
        .expect("Failed to add sun light");

    for frame in 0..3u32 {
        let sway = frame as f32 * 0.25;

        renderer.clear().expect("Failed to clear frame");
        renderer
            .draw_rectangle(Vec3::new(0.0, -0.5, 0.0), Vec2::new(6.0, 4.0))
            .expect("Failed to draw rectangle");
        renderer
            .draw_triangle(Vec3::new(-1.0 + sway, 0.5, 0.5), 1.0)
            .expect("Failed to draw triangle");
        renderer
            .draw_circle(Vec3::new(1.2, 0.6, -0.3), 0.5)
            .expect("Failed to draw circle");

        let stats = renderer.stats();
        log::info!(
            "frame {}: {} draws, {} shadow passes, {} triangles",
            frame,
            stats.draw_calls,
            stats.shadow_passes,
            stats.triangles
        );
    }

    renderer.cleanup();
    log::info!("Done");
}
