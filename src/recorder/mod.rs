//! Speech-gated recorder module
//!
//! A recording session moves through:
//! - Idle: no session
//! - Armed: session opened, capture stream being attached
//! - Recording: chunks buffering, level monitor running
//! - Stopping: deadlines cancelled, chunks being handed off
//!
//! Recording ends on an explicit stop, after the configured silence
//! following the last speech frame, or at the hard duration limit.

mod deadline;
mod indicator;
mod machine;
mod session;

pub use deadline::Deadline;
pub use indicator::{IndicatorColor, StatusIndicator};
pub use machine::{CapturedAudio, Recorder};
pub use session::{RecorderSession, SessionState};
