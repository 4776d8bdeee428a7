// Controller input
//
// Provides:
// - Controller state snapshot (six axes, button states)
// - Input source trait implemented by each backend
// - Keyboard backend (terminal) and gamepad backend (feature "gamepad")

use std::sync::{Arc, RwLock};
use std::time::Duration;

#[cfg(feature = "gamepad")]
mod gamepad;
mod keyboard;

#[cfg(feature = "gamepad")]
pub use gamepad::GamepadInput;
pub use keyboard::KeyboardInput;

pub const NUM_AXES: usize = 6;
pub const NUM_BUTTONS: usize = 16;

/// Axis indices, Xbox layout
pub mod axis {
    pub const LEFT_X: usize = 0;
    pub const LEFT_Y: usize = 1;
    pub const RIGHT_X: usize = 2;
    pub const RIGHT_Y: usize = 3;
    pub const LEFT_TRIGGER: usize = 4;
    pub const RIGHT_TRIGGER: usize = 5;
}

/// Resting value of a trigger axis
pub const TRIGGER_REST: f32 = -1.0;

/// Error types for controller input
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("No controller detected")]
    NoController,

    #[error("Input backend unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discrete input events the event loop reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    ButtonDown(usize),
}

/// Point-in-time controller state
///
/// Axes are in [-1, 1]. Triggers rest at -1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSnapshot {
    axes: [f32; NUM_AXES],
    buttons: [bool; NUM_BUTTONS],
}

impl Default for ControllerSnapshot {
    fn default() -> Self {
        let mut axes = [0.0; NUM_AXES];
        axes[axis::LEFT_TRIGGER] = TRIGGER_REST;
        axes[axis::RIGHT_TRIGGER] = TRIGGER_REST;
        Self {
            axes,
            buttons: [false; NUM_BUTTONS],
        }
    }
}

impl ControllerSnapshot {
    /// Axis value, 0.0 for an unknown index
    pub fn axis(&self, index: usize) -> f32 {
        self.axes.get(index).copied().unwrap_or(0.0)
    }

    /// Button state, false for an unknown index
    pub fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    pub fn set_axis(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.axes.get_mut(index) {
            *slot = value;
        }
    }

    pub fn set_button(&mut self, index: usize, pressed: bool) {
        if let Some(slot) = self.buttons.get_mut(index) {
            *slot = pressed;
        }
    }

    pub fn with_axis(mut self, index: usize, value: f32) -> Self {
        self.set_axis(index, value);
        self
    }
}

/// A source of controller state and events
pub trait InputSource {
    /// Human-readable device name
    fn name(&self) -> &str;

    /// Wait up to `timeout` for the next event
    fn poll_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>, InputError>;

    /// Current controller state
    fn snapshot(&self) -> ControllerSnapshot;
}

/// Latest controller state, shared between the event loop and the rate loops
///
/// Readers always get a whole snapshot copied out under the lock.
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot(Arc<RwLock<ControllerSnapshot>>);

impl SharedSnapshot {
    pub fn new(initial: ControllerSnapshot) -> Self {
        Self(Arc::new(RwLock::new(initial)))
    }

    pub fn publish(&self, snapshot: ControllerSnapshot) {
        // A poisoned lock still holds a complete snapshot
        let mut guard = self.0.write().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot;
    }

    pub fn current(&self) -> ControllerSnapshot {
        *self.0.read().unwrap_or_else(|e| e.into_inner())
    }
}
