//! Free-look camera driven by an [`InputSnapshot`].
//!
//! Key types:
//! - [`Camera`] holds position, pitch, yaw and the projection matrix
//!
//! The world is Z-up. Yaw turns around `+Z` and is kept in `[0, 2π)`,
//! pitch tilts towards `+Z` and is clamped to `[-π/2, π/2]`.

use std::f32::consts::{FRAC_PI_2, TAU};

use cgmath::Rad;

use crate::{
    input::InputSnapshot,
    math::{Matrix4, Vector3},
};

/// Movement speed in world units per second.
pub const SPEED: f32 = 2.0;
/// Fraction of a full turn per unit of pointer delta.
pub const LOOK_SENSITIVITY: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    position: Vector3,
    pitch: f32,
    yaw: f32,
    projection: Matrix4,
}

impl Camera {
    /// Creates a camera at `position` looking along `yaw`/`pitch`.
    ///
    /// # Arguments
    ///
    /// * `pitch` and `yaw` accept `Deg` or `Rad`; they are clamped and wrapped
    /// * `projection` is pushed to camera dependent programs as-is
    pub fn new<V: Into<Vector3>, P: Into<Rad<f32>>, Y: Into<Rad<f32>>>(
        position: V,
        pitch: P,
        yaw: Y,
        projection: Matrix4,
    ) -> Self {
        let mut camera = Self {
            position: position.into(),
            pitch: 0.0,
            yaw: 0.0,
            projection,
        };
        camera.set_pitch(pitch);
        camera.set_yaw(yaw);
        camera
    }

    /// Advances the camera by one frame of input.
    ///
    /// Nothing happens while the window is unfocused. In look mode the pointer
    /// deltas turn the camera first, then the held direction keys move it by
    /// `SPEED * delta` in the turned frame.
    pub fn update(&mut self, input: &InputSnapshot, delta: f32) {
        if !input.focused {
            return;
        }

        if input.capture_cursor {
            self.pitch = clamp_pitch(self.pitch - input.mouse_y * LOOK_SENSITIVITY * TAU);
            self.yaw = wrap_yaw(self.yaw - input.mouse_x * LOOK_SENSITIVITY * TAU);
        }

        let axis = |pos: bool, neg: bool| pos as i8 as f32 - neg as i8 as f32;
        let direction = Vector3::new(
            axis(input.forward, input.backward),
            axis(input.right, input.left),
            axis(input.up, input.down),
        );
        self.move_relative(direction.normalized() * (SPEED * delta));
    }

    /// Moves by `offset` given in the camera's ground frame.
    ///
    /// `x` goes along the yaw heading, `y` to its right and `z` along world up.
    /// Pitch has no influence, so looking down does not slow down walking.
    pub fn move_relative(&mut self, offset: Vector3) {
        let forward = Vector3::new(self.yaw.cos(), self.yaw.sin(), 0.0);
        let right = Vector3::new((self.yaw - FRAC_PI_2).cos(), (self.yaw - FRAC_PI_2).sin(), 0.0);
        self.position += forward * offset.x + right * offset.y + Vector3::up() * offset.z;
    }

    /// Unit look direction.
    pub fn forward(&self) -> Vector3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vector3::new(cy * cp, sy * cp, sp).normalized()
    }

    /// The view matrix, rebuilt from the current pose.
    pub fn transform(&self) -> Matrix4 {
        Matrix4::look_to(self.position, self.forward(), Vector3::up())
    }

    pub fn projection(&self) -> Matrix4 {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Matrix4) {
        self.projection = projection;
    }

    pub fn position(&self) -> Vector3 {
        self.position
    }

    pub fn set_position<V: Into<Vector3>>(&mut self, position: V) {
        self.position = position.into();
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn set_pitch<P: Into<Rad<f32>>>(&mut self, pitch: P) {
        self.pitch = clamp_pitch(pitch.into().0);
    }

    pub fn set_yaw<Y: Into<Rad<f32>>>(&mut self, yaw: Y) {
        self.yaw = wrap_yaw(yaw.into().0);
    }
}

fn clamp_pitch(pitch: f32) -> f32 {
    pitch.clamp(-FRAC_PI_2, FRAC_PI_2)
}

fn wrap_yaw(yaw: f32) -> f32 {
    let wrapped = yaw.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::Deg;
    use std::f32::consts::PI;

    fn camera() -> Camera {
        Camera::new((3.5, 0.0, 0.0), Rad(0.0f32), Rad(PI), Matrix4::identity())
    }

    fn looking() -> InputSnapshot {
        InputSnapshot {
            capture_cursor: true,
            ..InputSnapshot::default()
        }
    }

    #[test]
    fn pitch_clamps_exactly_at_quarter_turn() {
        let mut cam = camera();
        let input = InputSnapshot {
            mouse_y: -1000.0,
            ..looking()
        };
        cam.update(&input, 0.016);
        assert_eq!(cam.pitch(), FRAC_PI_2);

        let input = InputSnapshot {
            mouse_y: 1000.0,
            ..looking()
        };
        cam.update(&input, 0.016);
        assert_eq!(cam.pitch(), -FRAC_PI_2);
    }

    #[test]
    fn yaw_wraps_into_one_turn() {
        let mut cam = camera();
        for dx in [-37.0, 512.0, -9999.5, 0.001] {
            let input = InputSnapshot {
                mouse_x: dx,
                ..looking()
            };
            cam.update(&input, 0.0);
            assert!((0.0..TAU).contains(&cam.yaw()), "yaw {} out of range", cam.yaw());
        }
        cam.set_yaw(Rad(-1e-9));
        assert!(cam.yaw() < TAU);
    }

    #[test]
    fn more_than_a_full_turn_lands_on_the_remainder() {
        let theta = 0.7;
        let mut cam = Camera::new(Vector3::zero(), Rad(0.0f32), Rad(0.0f32), Matrix4::identity());
        // negative pointer motion turns left, i.e. increases yaw
        let total = -(TAU + theta) / (LOOK_SENSITIVITY * TAU);
        for _ in 0..4 {
            let input = InputSnapshot {
                mouse_x: total / 4.0,
                ..looking()
            };
            cam.update(&input, 0.0);
        }
        assert_relative_eq!(cam.yaw(), theta, epsilon = 1e-4);
    }

    #[test]
    fn pointer_is_ignored_outside_look_mode() {
        let mut cam = camera();
        let input = InputSnapshot {
            mouse_x: 5.0,
            mouse_y: 5.0,
            ..InputSnapshot::default()
        };
        cam.update(&input, 0.1);
        assert_eq!(cam.yaw(), PI);
        assert_eq!(cam.pitch(), 0.0);
    }

    #[test]
    fn unfocused_window_freezes_camera() {
        let mut cam = camera();
        let input = InputSnapshot {
            forward: true,
            focused: false,
            mouse_x: 3.0,
            ..looking()
        };
        let before = cam;
        cam.update(&input, 1.0);
        assert_eq!(cam, before);
    }

    #[test]
    fn walking_forward_follows_heading() {
        // yaw π looks down -X towards the origin
        let mut cam = camera();
        let input = InputSnapshot {
            forward: true,
            ..InputSnapshot::default()
        };
        cam.update(&input, 0.5);
        assert_relative_eq!(cam.position().x, 2.5, epsilon = 1e-5);
        assert_relative_eq!(cam.position().y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn diagonal_movement_is_normalized() {
        let mut cam = camera();
        let input = InputSnapshot {
            forward: true,
            right: true,
            up: true,
            ..InputSnapshot::default()
        };
        let start = cam.position();
        cam.update(&input, 1.0);
        assert_relative_eq!((cam.position() - start).norm(), SPEED, epsilon = 1e-5);
    }

    #[test]
    fn opposite_keys_cancel_out() {
        let mut cam = camera();
        let input = InputSnapshot {
            left: true,
            right: true,
            ..InputSnapshot::default()
        };
        cam.update(&input, 1.0);
        assert_eq!(cam.position(), Vector3::new(3.5, 0.0, 0.0));
    }

    #[test]
    fn view_transform_moves_eye_to_origin_and_looks_down_minus_z() {
        let cam = Camera::new((1.0, 2.0, 3.0), Deg(20.0f32), Deg(75.0f32), Matrix4::identity());
        let view = cam.transform();
        let eye = view.transform_point(cam.position());
        assert_relative_eq!(eye.norm(), 0.0, epsilon = 1e-5);
        let ahead = view.transform_point(cam.position() + cam.forward());
        assert_relative_eq!(ahead.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ahead.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ahead.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn constructor_accepts_degrees() {
        let cam = Camera::new(Vector3::zero(), Deg(120.0f32), Deg(-90.0f32), Matrix4::identity());
        assert_eq!(cam.pitch(), FRAC_PI_2);
        assert_relative_eq!(cam.yaw(), 1.5 * PI, epsilon = 1e-5);
    }
}
