//! Renderer integration tests
//!
//! Drives the public surface the way a host application would: a
//! camera and authored scene lights, a multi-frame loop with light
//! churn in between, and configuration arriving as JSON. The tracking
//! NullDevice supplies the event trace the ordering assertions read.

use candela_render::{
    Camera, DeviceEvent, DirectionalLight, Light, LightError, NullDevice, PointLight, RenderError,
    Renderer, RendererConfig, ShaderSet, MAX_LIGHTS,
};
use glam::{Vec2, Vec3};

const BASIC_WGSL: &str = include_str!("../../../shaders/basic.wgsl");
const SHADOW_WGSL: &str = include_str!("../../../shaders/shadow.wgsl");

fn inline_config() -> RendererConfig {
    RendererConfig {
        shaders: ShaderSet::Inline {
            basic: BASIC_WGSL.to_string(),
            shadow: SHADOW_WGSL.to_string(),
        },
        ..Default::default()
    }
}

fn ready_renderer() -> Renderer<NullDevice> {
    let mut renderer = Renderer::new(NullDevice::new(), inline_config());
    renderer.init().unwrap();
    renderer
}

#[test]
fn test_one_light_one_draw_sequencing() {
    let mut renderer = ready_renderer();
    renderer
        .add_light(Light::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ONE, 1.0, 10.0))
        .unwrap();
    renderer.device_mut().clear_events();

    renderer.draw_triangle(Vec3::ZERO, 1.0).unwrap();

    // Exactly one depth pass, fully closed before the color pass
    // opens, and the draw lands inside the color pass.
    let events = renderer.device().events();
    let depth_begin = events
        .iter()
        .position(|e| matches!(e, DeviceEvent::DepthPassBegun { .. }))
        .expect("depth pass should run");
    let depth_end = events[depth_begin..]
        .iter()
        .position(|e| matches!(e, DeviceEvent::PassEnded))
        .map(|i| depth_begin + i)
        .expect("depth pass should end");
    let color_begin = events
        .iter()
        .position(|e| matches!(e, DeviceEvent::ColorPassBegun))
        .expect("color pass should run");
    let color_draw = events
        .iter()
        .rposition(|e| matches!(e, DeviceEvent::Drawn { .. }))
        .expect("color draw should be issued");

    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::DepthPassBegun { .. }))
            .count(),
        1
    );
    assert!(depth_end < color_begin);
    assert!(color_begin < color_draw);

    assert_eq!(renderer.stats().shadow_passes, 1);
    assert_eq!(renderer.stats().draw_calls, 1);
    assert_eq!(renderer.stats().uniform_skips, 0);
}

#[test]
fn test_multi_frame_loop_with_scene_lights() {
    let mut renderer = ready_renderer();

    let camera = Camera::default();
    renderer.set_view_matrix(camera.view_matrix());
    renderer.set_projection_matrix(camera.projection_matrix());

    renderer
        .add_light(Light::new(Vec3::new(2.0, 6.0, 3.0), Vec3::ONE, 1.2, 30.0))
        .unwrap();
    renderer
        .add_light(Light::from(PointLight {
            position: Vec3::new(-4.0, 3.0, -1.0),
            ..Default::default()
        }))
        .unwrap();
    let sun = renderer
        .add_light(Light::from(DirectionalLight::default()))
        .unwrap();

    for frame in 0..3 {
        renderer.clear().unwrap();
        renderer
            .draw_rectangle(Vec3::new(0.0, -0.5, 0.0), Vec2::new(6.0, 4.0))
            .unwrap();
        renderer.draw_triangle(Vec3::new(-1.0, 0.5, 0.5), 1.0).unwrap();
        renderer.draw_circle(Vec3::new(1.2, 0.6, -0.3), 0.5).unwrap();

        let stats = renderer.stats();
        assert_eq!(stats.draw_calls, 3, "frame {frame}");
        assert_eq!(stats.shadow_passes, 3 * renderer.light_count() as u32);
        assert_eq!(stats.uniform_skips, 0);
    }

    // Churn between frames: drop the sun, nudge the key light, keep
    // drawing.
    renderer.remove_light(sun).unwrap();
    renderer
        .update_light(0, Light::new(Vec3::new(2.0, 7.0, 3.0), Vec3::ONE, 1.2, 30.0))
        .unwrap();

    renderer.clear().unwrap();
    renderer.draw_triangle(Vec3::ZERO, 1.0).unwrap();
    assert_eq!(renderer.stats().shadow_passes, 2);
    assert_eq!(renderer.stats().lights, 2);
}

#[test]
fn test_light_errors_propagate_unchanged() {
    let mut renderer = ready_renderer();

    match renderer.update_light(3, Light::new(Vec3::ZERO, Vec3::ONE, 1.0, 5.0)) {
        Err(RenderError::Light(LightError::IndexOutOfRange { index: 3, len: 0 })) => {}
        other => panic!("expected IndexOutOfRange, got {other:?}"),
    }

    for i in 0..MAX_LIGHTS {
        renderer
            .add_light(Light::new(Vec3::new(i as f32, 4.0, 0.0), Vec3::ONE, 1.0, 20.0))
            .unwrap();
    }
    match renderer.add_light(Light::new(Vec3::ZERO, Vec3::ONE, 1.0, 20.0)) {
        Err(RenderError::Light(LightError::CapacityExceeded { capacity })) => {
            assert_eq!(capacity, MAX_LIGHTS);
        }
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
}

#[test]
fn test_config_from_json_drives_init() {
    let json = format!(
        r#"{{
            "shaders": {{
                "mode": "inline",
                "basic": {basic:?},
                "shadow": {shadow:?}
            }},
            "clear_color": [0.0, 0.0, 0.0, 1.0],
            "circle_segments": 12
        }}"#,
        basic = BASIC_WGSL,
        shadow = SHADOW_WGSL,
    );
    let config: RendererConfig = serde_json::from_str(&json).unwrap();

    let mut renderer = Renderer::new(NullDevice::new(), config);
    renderer.init().unwrap();
    renderer.device_mut().clear_events();

    renderer.draw_circle(Vec3::ZERO, 1.0).unwrap();
    assert!(renderer
        .device()
        .events()
        .iter()
        .any(|e| matches!(e, DeviceEvent::Drawn { vertices: 36 })));
}

#[test]
fn test_draw_without_lights_skips_shadow_phase() {
    let mut renderer = ready_renderer();
    renderer.device_mut().clear_events();

    renderer.draw_rectangle(Vec3::ZERO, Vec2::ONE).unwrap();

    assert!(!renderer
        .device()
        .events()
        .iter()
        .any(|e| matches!(e, DeviceEvent::DepthPassBegun { .. })));
    assert_eq!(renderer.stats().shadow_passes, 0);
    assert_eq!(renderer.stats().draw_calls, 1);
}
