//! Controller input types and the device capability

use serde::{Deserialize, Serialize};

/// Physical controller slot index
pub type Slot = usize;

/// A position in tracking space, in meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// One gamepad button as reported by the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepadButton {
    pub pressed: bool,
    pub touched: bool,
    /// Analog value in [0, 1]
    pub value: f32,
}

impl GamepadButton {
    pub fn analog(value: f32) -> Self {
        Self {
            pressed: value > 0.0,
            touched: value > 0.0,
            value,
        }
    }
}

/// Per-frame snapshot of one controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerSample {
    pub position: Vec3,
    #[serde(default)]
    pub buttons: Vec<GamepadButton>,
}

impl ControllerSample {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            buttons: Vec::new(),
        }
    }

    /// Set the analog value of button `index`, growing the array as needed
    pub fn with_button(mut self, index: usize, value: f32) -> Self {
        if self.buttons.len() <= index {
            self.buttons.resize(index + 1, GamepadButton::default());
        }
        self.buttons[index] = GamepadButton::analog(value);
        self
    }

    /// Analog value of button `index`; missing buttons read as released
    pub fn button_value(&self, index: usize) -> f32 {
        self.buttons.get(index).map(|b| b.value).unwrap_or(0.0)
    }

    pub fn is_pressed(&self, index: usize) -> bool {
        self.buttons.get(index).map(|b| b.pressed).unwrap_or(false)
    }
}

/// Discrete controller events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A device appeared in `slot`, reporting its hardware profiles
    Connected { slot: Slot, profiles: Vec<String> },
    Disconnected { slot: Slot },
    /// Primary action pressed
    SelectStart { slot: Slot },
    /// Primary action released
    SelectEnd { slot: Slot },
}

impl ControllerEvent {
    pub fn slot(&self) -> Slot {
        match self {
            ControllerEvent::Connected { slot, .. }
            | ControllerEvent::Disconnected { slot }
            | ControllerEvent::SelectStart { slot }
            | ControllerEvent::SelectEnd { slot } => *slot,
        }
    }
}

/// Source of controller events and per-frame snapshots
pub trait InputDevice {
    /// Events raised since the previous call, in order
    fn poll_events(&mut self) -> Vec<ControllerEvent>;

    /// Current snapshot of the controller in `slot`, if it is tracked
    fn sample(&self, slot: Slot) -> Option<ControllerSample>;
}
