//! Stroke input module
//!
//! Binds stylus controllers by hardware profile and forwards their pose to a
//! [`DrawingSurface`] while the pen is down.

mod canvas;
mod controller;
mod surface;
mod tube;

pub use canvas::PixelCanvas;
pub use controller::{ParsePolicyError, SlotState, StrokeController, StrokeSession, TriggerPolicy};
pub use surface::{DrawingSurface, SurfaceStats};
pub use tube::TubePainter;
