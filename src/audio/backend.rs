//! Audio I/O backend contract
//!
//! A backend owns the physical microphone line, an analysis tap that
//! exposes the most recent time-domain window, a capture stream that
//! delivers PCM blocks into a [`ChunkSink`], and a playback path.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RecorderConfig;

/// Options requested when acquiring the input line
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Analyser FFT size
    pub fft_size: usize,
    /// Analyser smoothing time constant. Only frequency-domain analysis uses
    /// it; the level monitor reads raw time-domain samples, so the shipped
    /// backends record it without applying it.
    pub smoothing: f32,
}

impl CaptureOptions {
    /// Number of samples in one time-domain analysis read
    pub fn window_len(&self) -> usize {
        self.fft_size / 2
    }
}

impl From<&RecorderConfig> for CaptureOptions {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            auto_gain_control: config.auto_gain_control,
            fft_size: config.fft_size,
            smoothing: config.smoothing,
        }
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from(&RecorderConfig::default())
    }
}

/// The input line could not be acquired
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquisitionError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no audio input device available")]
    NoInputDevice,

    #[error("audio backend failure: {0}")]
    Backend(String),
}

/// Failures after the line was acquired
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio device is not initialized")]
    NotInitialized,

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("failed to encode recording: {0}")]
    Encode(#[from] hound::Error),
}

/// State of the backend's capture stream as the backend reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Inactive,
    Recording,
}

/// Decoded mono audio ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

#[derive(Debug, Default)]
struct SinkInner {
    chunks: Vec<Vec<f32>>,
    closed: bool,
}

/// Shared, append-only chunk list fed by the capture callback
///
/// The capture callback may run on an audio thread; every append goes
/// through the mutex. Once [`ChunkSink::close`] has been called further
/// appends are dropped, so a late callback cannot reach a later session.
#[derive(Debug, Clone, Default)]
pub struct ChunkSink {
    inner: Arc<Mutex<SinkInner>>,
}

impl ChunkSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one captured block. Empty blocks are ignored.
    ///
    /// Returns whether the block was stored.
    pub fn push(&self, block: &[f32]) -> bool {
        if block.is_empty() {
            return false;
        }
        match self.inner.lock() {
            Ok(mut inner) if !inner.closed => {
                inner.chunks.push(block.to_vec());
                true
            }
            _ => false,
        }
    }

    /// Number of chunks captured so far
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.chunks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().map(|inner| inner.closed).unwrap_or(true)
    }

    /// Close the sink and take every chunk captured so far
    pub fn close(&self) -> Vec<Vec<f32>> {
        match self.inner.lock() {
            Ok(mut inner) => {
                inner.closed = true;
                std::mem::take(&mut inner.chunks)
            }
            Err(poisoned) => {
                let mut inner = poisoned.into_inner();
                inner.closed = true;
                std::mem::take(&mut inner.chunks)
            }
        }
    }
}

/// Microphone/speaker backend
///
/// Implementations:
/// - `SimulatedBackend`: scripted levels, for tests and headless runs
/// - `CpalBackend`: default system devices (`cpal` feature)
#[async_trait(?Send)]
pub trait AudioBackend {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Acquire the exclusive input line and set up the analysis tap
    async fn acquire(&mut self, options: &CaptureOptions) -> Result<(), AcquisitionError>;

    /// Sample rate of captured audio
    fn sample_rate(&self) -> u32;

    /// Fill `out` with the most recent time-domain samples
    fn read_time_domain(&mut self, out: &mut [f32]);

    /// Begin delivering captured blocks into `sink`
    fn start_capture(&mut self, sink: ChunkSink) -> Result<(), AudioError>;

    /// Stop delivering captured blocks
    fn stop_capture(&mut self);

    fn capture_state(&self) -> CaptureState;

    /// Start playing `clip`, replacing anything currently playing
    fn start_playback(&mut self, clip: &AudioClip) -> Result<(), AudioError>;

    fn stop_playback(&mut self);

    fn is_playing(&self) -> bool;

    /// Release the input line and its tracks
    fn release(&mut self);
}
