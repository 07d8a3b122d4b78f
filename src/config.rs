//! Scene-wide settings with the demo's defaults.

use std::f32::consts::{FRAC_PI_2, PI};

use crate::math::{Matrix4, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneConfig {
    /// Vertical field of view, radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Used until the first resize reports the real target size.
    pub aspect: f32,
    pub clear_colour: wgpu::Color,
    pub camera_position: Vector3,
    pub camera_pitch: f32,
    pub camera_yaw: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fov: FRAC_PI_2,
            near: 0.5,
            far: 100.0,
            aspect: 1.0,
            clear_colour: wgpu::Color {
                r: 0.800,
                g: 0.839,
                b: 0.902,
                a: 1.0,
            },
            camera_position: Vector3::new(3.5, 0.0, 0.0),
            camera_pitch: 0.0,
            camera_yaw: PI,
        }
    }
}

impl SceneConfig {
    pub fn projection(&self, aspect: f32) -> Matrix4 {
        Matrix4::perspective(cgmath::Rad(self.fov), aspect, self.near, self.far)
    }
}
