//! Audio module: backend contract, device ownership, level metering
//!
//! The recorder only talks to [`RecorderDevice`]; backends plug in behind
//! the [`AudioBackend`] trait.

mod backend;
mod device;
pub mod encode;
pub mod level;
mod simulated;

#[cfg(feature = "cpal")]
mod cpal_backend;

pub use backend::{
    AcquisitionError, AudioBackend, AudioClip, AudioError, CaptureOptions, CaptureState,
    ChunkSink,
};
pub use device::RecorderDevice;
pub use level::{LevelReading, VoiceActivityDetector};
pub use simulated::{SimulatedBackend, SimulatedProbe};

#[cfg(feature = "cpal")]
pub use cpal_backend::CpalBackend;
