//! Scripted audio backend for headless runs and tests
//!
//! Levels are queued in dBFS; each analysis read consumes one level and
//! produces a constant-amplitude window at that level. While capture is
//! active the same window is delivered to the capture sink, as a live line
//! would.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::backend::{
    AcquisitionError, AudioBackend, AudioClip, AudioError, CaptureOptions, CaptureState,
    ChunkSink,
};
use super::level::amplitude_for_db;

const SIMULATED_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Default)]
struct ProbeState {
    fail_with: Option<AcquisitionError>,
    options: Option<CaptureOptions>,
    acquired: bool,
    acquire_calls: usize,
    release_calls: usize,
    levels: VecDeque<f32>,
    held_level: Option<f32>,
    reads: usize,
    capturing: bool,
    capture_stops: usize,
    /// Block still in flight when capture stops
    tail: Option<Vec<f32>>,
    playing: bool,
    playback_starts: usize,
    last_clip_len: usize,
}

/// Shared handle for scripting and observing a [`SimulatedBackend`]
#[derive(Debug, Clone, Default)]
pub struct SimulatedProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl SimulatedProbe {
    fn state(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next acquisitions fail with `err`
    pub fn fail_acquire(&self, err: AcquisitionError) {
        self.state().fail_with = Some(err);
    }

    /// Let acquisitions succeed again
    pub fn allow_acquire(&self) {
        self.state().fail_with = None;
    }

    /// Queue one level per analysis read, in dBFS
    pub fn push_levels<I: IntoIterator<Item = f32>>(&self, levels: I) {
        self.state().levels.extend(levels);
    }

    /// Level used once the queue is drained; `None` is digital silence
    pub fn hold_level(&self, db: Option<f32>) {
        self.state().held_level = db;
    }

    /// Simulate the capture stream dying underneath the recorder
    pub fn drop_capture(&self) {
        self.state().capturing = false;
    }

    /// Deliver `block` to the sink while the capture stream is stopping
    pub fn flush_on_stop(&self, block: Vec<f32>) {
        self.state().tail = Some(block);
    }

    /// Simulate the end of the current playback
    pub fn finish_playback(&self) {
        self.state().playing = false;
    }

    pub fn options(&self) -> Option<CaptureOptions> {
        self.state().options.clone()
    }

    pub fn acquire_calls(&self) -> usize {
        self.state().acquire_calls
    }

    pub fn release_calls(&self) -> usize {
        self.state().release_calls
    }

    pub fn is_acquired(&self) -> bool {
        self.state().acquired
    }

    pub fn reads(&self) -> usize {
        self.state().reads
    }

    pub fn is_capturing(&self) -> bool {
        self.state().capturing
    }

    pub fn capture_stops(&self) -> usize {
        self.state().capture_stops
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    pub fn playback_starts(&self) -> usize {
        self.state().playback_starts
    }

    pub fn last_clip_len(&self) -> usize {
        self.state().last_clip_len
    }
}

/// Backend driven entirely by its [`SimulatedProbe`]
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    probe: SimulatedProbe,
    sink: Option<ChunkSink>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> SimulatedProbe {
        self.probe.clone()
    }
}

#[async_trait(?Send)]
impl AudioBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn acquire(&mut self, options: &CaptureOptions) -> Result<(), AcquisitionError> {
        let mut state = self.probe.state();
        state.acquire_calls += 1;
        if let Some(err) = state.fail_with.clone() {
            return Err(err);
        }
        state.acquired = true;
        state.options = Some(options.clone());
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        SIMULATED_SAMPLE_RATE
    }

    fn read_time_domain(&mut self, out: &mut [f32]) {
        let capturing = {
            let mut state = self.probe.state();
            state.reads += 1;
            let level = state.levels.pop_front().or(state.held_level);
            let amplitude = level.map(amplitude_for_db).unwrap_or(0.0);
            out.fill(amplitude);
            state.capturing
        };

        if capturing {
            if let Some(sink) = &self.sink {
                sink.push(out);
            }
        }
    }

    fn start_capture(&mut self, sink: ChunkSink) -> Result<(), AudioError> {
        let mut state = self.probe.state();
        if !state.acquired {
            return Err(AudioError::NotInitialized);
        }
        state.capturing = true;
        self.sink = Some(sink);
        Ok(())
    }

    fn stop_capture(&mut self) {
        let tail = {
            let mut state = self.probe.state();
            state.capturing = false;
            state.capture_stops += 1;
            state.tail.take()
        };
        if let (Some(sink), Some(block)) = (self.sink.take(), tail) {
            sink.push(&block);
        }
    }

    fn capture_state(&self) -> CaptureState {
        if self.probe.state().capturing {
            CaptureState::Recording
        } else {
            CaptureState::Inactive
        }
    }

    fn start_playback(&mut self, clip: &AudioClip) -> Result<(), AudioError> {
        let mut state = self.probe.state();
        if !state.acquired {
            return Err(AudioError::NotInitialized);
        }
        state.playing = true;
        state.playback_starts += 1;
        state.last_clip_len = clip.samples.len();
        Ok(())
    }

    fn stop_playback(&mut self) {
        self.probe.state().playing = false;
    }

    fn is_playing(&self) -> bool {
        self.probe.state().playing
    }

    fn release(&mut self) {
        let mut state = self.probe.state();
        state.acquired = false;
        state.capturing = false;
        state.playing = false;
        state.release_calls += 1;
        self.sink = None;
        debug!("simulated line released");
    }
}
