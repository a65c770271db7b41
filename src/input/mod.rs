//! Controller input module
//!
//! Discrete events (connect, disconnect, select) are delivered as
//! [`ControllerEvent`] values; buttons and pose are polled per frame through
//! the [`InputDevice`] capability.

mod device;
mod scripted;

pub use device::{ControllerEvent, ControllerSample, GamepadButton, InputDevice, Slot, Vec3};
pub use scripted::{ScriptedInput, Trace, TraceError, TraceFrame};
