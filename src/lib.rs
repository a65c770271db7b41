//! xr-painter: stylus stroke input and speech-gated voice capture
//!
//! Two frame-driven state machines sit behind trait seams so they can run
//! against real devices or scripted input:
//! - [`recorder::Recorder`] records microphone audio while the user speaks
//! - [`stroke::StrokeController`] turns stylus input into drawing strokes
//!
//! [`app::AppContext`] runs both once per display frame.

pub mod app;
pub mod audio;
pub mod clock;
pub mod config;
pub mod events;
pub mod input;
pub mod lifecycle;
pub mod recorder;
pub mod stroke;

pub use app::AppContext;
pub use config::Config;
pub use events::{AppEvent, StopReason};
