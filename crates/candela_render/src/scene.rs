//! Scene-side helpers.
//!
//! The renderer itself only consumes matrices and [`Light`] values;
//! these types produce them from a more conventional description.

use glam::{Mat4, Vec3};

use crate::lighting::Light;

/// Perspective camera.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: std::f32::consts::FRAC_PI_3,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Point light described by constant/linear/quadratic attenuation.
#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub position: Vec3,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 5.0, 0.0),
            color: Vec3::ONE,
            intensity: 1.0,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

impl PointLight {
    /// Distance at which the attenuated brightness of the strongest
    /// channel falls below 5/256, solved from the attenuation
    /// quadratic.
    pub fn influence_radius(&self) -> f32 {
        let max_channel = self.color.max_element().max(1e-3) * self.intensity;
        let threshold = max_channel * 256.0 / 5.0;

        if self.quadratic > 1e-6 {
            let discriminant =
                self.linear * self.linear - 4.0 * self.quadratic * (self.constant - threshold);
            if discriminant > 0.0 {
                return (-self.linear + discriminant.sqrt()) / (2.0 * self.quadratic);
            }
        }
        if self.linear > 1e-6 {
            return ((threshold - self.constant) / self.linear).max(0.01);
        }
        // No falloff terms at all; cap the lit volume.
        100.0
    }
}

impl From<PointLight> for Light {
    fn from(point: PointLight) -> Self {
        Light::new(
            point.position,
            point.color,
            point.intensity,
            point.influence_radius(),
        )
    }
}

/// Sun-style light authored as a direction rather than a position.
#[derive(Clone, Copy, Debug)]
pub struct DirectionalLight {
    /// Direction the light travels, world space. Normalized on use.
    pub direction: Vec3,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.4, -1.0, -0.3),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    /// Stands the light `distance` units against its own direction so
    /// the positional shadow path applies. The radius reaches the same
    /// distance past the origin, keeping the scene inside the shadow
    /// frustum.
    pub fn at_distance(&self, distance: f32) -> Light {
        let distance = distance.max(1.0);
        let travel = self.direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        Light::new(-travel * distance, self.color, self.intensity, distance * 2.0)
    }
}

impl From<DirectionalLight> for Light {
    fn from(sun: DirectionalLight) -> Self {
        // Far enough that shadow rays are near parallel across a
        // room-sized scene.
        sun.at_distance(25.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_matrix_centers_eye() {
        let camera = Camera::default();
        let eye = camera.view_matrix() * camera.position.extend(1.0);
        assert!(eye.truncate().length() < 1e-5);
    }

    #[test]
    fn test_projection_is_finite() {
        let camera = Camera::default();
        let m = camera.view_projection().to_cols_array();
        assert!(m.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_stronger_falloff_shrinks_radius() {
        let gentle = PointLight {
            quadratic: 0.01,
            ..Default::default()
        };
        let harsh = PointLight {
            quadratic: 0.5,
            ..Default::default()
        };
        assert!(harsh.influence_radius() < gentle.influence_radius());
        assert!(harsh.influence_radius() > 0.0);
    }

    #[test]
    fn test_point_light_conversion() {
        let point = PointLight {
            position: Vec3::new(1.0, 2.0, 3.0),
            color: Vec3::new(1.0, 0.5, 0.0),
            ..Default::default()
        };
        let light = Light::from(point);
        assert_eq!(light.position, point.position);
        assert_eq!(light.color, point.color);
        assert!((light.influence_radius - point.influence_radius()).abs() < 1e-6);
    }

    #[test]
    fn test_directional_light_stands_against_direction() {
        let sun = DirectionalLight {
            direction: Vec3::new(0.0, -1.0, 0.0),
            ..Default::default()
        };
        let light = sun.at_distance(30.0);
        assert!((light.position - Vec3::new(0.0, 30.0, 0.0)).length() < 1e-5);
        assert!(light.influence_radius > 30.0);
    }

    #[test]
    fn test_directional_light_zero_direction_falls_back() {
        let sun = DirectionalLight {
            direction: Vec3::ZERO,
            ..Default::default()
        };
        let light = Light::from(sun);
        assert!(light.position.y > 0.0);
        assert!(light.position.is_finite());
    }
}
