//! Per-frame input snapshot consumed by the camera.
//!
//! The window loop stays outside of this crate. It feeds raw `winit` events
//! into an [`InputSnapshot`], hands the snapshot to the scene once per update
//! and then calls [`InputSnapshot::end_frame`] to clear the pointer deltas.

use winit::{
    event::{DeviceEvent, ElementState, KeyEvent, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Raw mouse motion is divided by this before it reaches the camera.
pub const POINTER_SCALE: f64 = 10.0;

/// Directional intent, pointer motion and window state for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSnapshot {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    /// Look mode; while set, pointer deltas rotate the camera.
    pub capture_cursor: bool,
    pub focused: bool,
    pub mouse_x: f32,
    pub mouse_y: f32,
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self {
            forward: false,
            backward: false,
            left: false,
            right: false,
            up: false,
            down: false,
            capture_cursor: false,
            focused: true,
            mouse_x: 0.0,
            mouse_y: 0.0,
        }
    }
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a key transition. Returns whether the key is one the camera uses.
    ///
    /// W/S/A/D move on the ground plane, Space and Left Shift move along the
    /// up axis and a press of C toggles look mode.
    pub fn handle_key(&mut self, code: KeyCode, state: ElementState) -> bool {
        let pressed = state.is_pressed();
        match code {
            KeyCode::KeyW => self.forward = pressed,
            KeyCode::KeyS => self.backward = pressed,
            KeyCode::KeyA => self.left = pressed,
            KeyCode::KeyD => self.right = pressed,
            KeyCode::Space => self.up = pressed,
            KeyCode::ShiftLeft => self.down = pressed,
            KeyCode::KeyC => {
                if pressed {
                    self.capture_cursor = !self.capture_cursor;
                    log::debug!("look mode {}", if self.capture_cursor { "on" } else { "off" });
                }
            }
            _ => return false,
        }
        true
    }

    /// Feeds a window event. Returns `true` if the event changed the snapshot.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(*code, *state),
            WindowEvent::Focused(focused) => {
                self.focused = *focused;
                if !focused {
                    self.release_all();
                }
                true
            }
            _ => false,
        }
    }

    /// Feeds a device event. Mouse motion accumulates until [`end_frame`](Self::end_frame).
    pub fn handle_device_event(&mut self, event: &DeviceEvent) -> bool {
        match event {
            DeviceEvent::MouseMotion { delta: (dx, dy) } => {
                self.add_pointer_delta(*dx, *dy);
                true
            }
            _ => false,
        }
    }

    pub fn add_pointer_delta(&mut self, dx: f64, dy: f64) {
        self.mouse_x += (dx / POINTER_SCALE) as f32;
        self.mouse_y += (dy / POINTER_SCALE) as f32;
    }

    /// Clears the pointer deltas once the frame has consumed them.
    pub fn end_frame(&mut self) {
        self.mouse_x = 0.0;
        self.mouse_y = 0.0;
    }

    fn release_all(&mut self) {
        self.forward = false;
        self.backward = false;
        self.left = false;
        self.right = false;
        self.up = false;
        self.down = false;
    }
}
