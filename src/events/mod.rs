//! Events module for recorder and stroke transitions
//!
//! Provides structured event types broadcast to anything observing the
//! frame loop (status overlays, logs, tests).

use serde::{Deserialize, Serialize};

use crate::input::Slot;

/// Why a recording session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop_recording` called by the host
    Manual,
    /// No speech for the configured silence duration
    Silence,
    /// Hard recording limit reached
    MaxDuration,
    /// Recorder disposed while recording
    Disposed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Manual => write!(f, "manual"),
            StopReason::Silence => write!(f, "silence"),
            StopReason::MaxDuration => write!(f, "max_duration"),
            StopReason::Disposed => write!(f, "disposed"),
        }
    }
}

/// Events emitted by the recorder and stroke controller during transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// Microphone capture began
    RecordingStarted,

    /// Microphone capture ended
    RecordingStopped {
        reason: StopReason,
        /// Duration in milliseconds that the session was open
        duration_ms: u64,
    },

    /// Speech first detected in the current session
    SpeechDetected,

    /// A session was finalized and handed off
    AudioCaptured {
        /// Size of the encoded payload in bytes
        byte_size: usize,
    },

    PlaybackStarted,
    PlaybackFinished,

    /// A device with the accepted profile was bound
    ControllerBound { slot: Slot, profile: String },

    /// A bound device went away
    ControllerUnbound { slot: Slot },

    /// Pen down
    StrokeStarted { slot: Slot },

    /// Pen up
    StrokeFinished {
        slot: Slot,
        /// Number of points in the stroke, including the first
        points: usize,
    },
}

impl std::fmt::Display for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEvent::RecordingStarted => write!(f, "RECORDING_STARTED"),
            AppEvent::RecordingStopped {
                reason,
                duration_ms,
            } => write!(f, "RECORDING_STOPPED ({}, {}ms)", reason, duration_ms),
            AppEvent::SpeechDetected => write!(f, "SPEECH_DETECTED"),
            AppEvent::AudioCaptured { byte_size } => {
                write!(f, "AUDIO_CAPTURED ({} bytes)", byte_size)
            }
            AppEvent::PlaybackStarted => write!(f, "PLAYBACK_STARTED"),
            AppEvent::PlaybackFinished => write!(f, "PLAYBACK_FINISHED"),
            AppEvent::ControllerBound { slot, profile } => {
                write!(f, "CONTROLLER_BOUND (slot {}, {})", slot, profile)
            }
            AppEvent::ControllerUnbound { slot } => {
                write!(f, "CONTROLLER_UNBOUND (slot {})", slot)
            }
            AppEvent::StrokeStarted { slot } => write!(f, "STROKE_STARTED (slot {})", slot),
            AppEvent::StrokeFinished { slot, points } => {
                write!(f, "STROKE_FINISHED (slot {}, {} points)", slot, points)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AppEvent::RecordingStopped {
            reason: StopReason::Silence,
            duration_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("recording_stopped"));
        assert!(json.contains("silence"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"stroke_started","slot":1}"#;
        let event: AppEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, AppEvent::StrokeStarted { slot: 1 });
    }

    #[test]
    fn test_display() {
        let event = AppEvent::AudioCaptured { byte_size: 44 };
        assert_eq!(event.to_string(), "AUDIO_CAPTURED (44 bytes)");
    }
}
