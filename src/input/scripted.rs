//! Replayable controller traces
//!
//! A trace is a JSON document listing frames; each frame carries the events
//! raised before it and any controller snapshots that changed. Snapshots
//! persist until replaced or until the slot disconnects.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::device::{ControllerEvent, ControllerSample, InputDevice, Slot};

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse trace: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One frame of a trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceFrame {
    pub events: Vec<ControllerEvent>,
    pub controllers: BTreeMap<Slot, ControllerSample>,
}

impl TraceFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, event: ControllerEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn sample(mut self, slot: Slot, sample: ControllerSample) -> Self {
        self.controllers.insert(slot, sample);
        self
    }
}

/// Whole trace file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trace {
    pub frames: Vec<TraceFrame>,
    /// Microphone levels in dBFS, one per analysis read, for simulated audio
    pub levels_db: Vec<f32>,
    /// Button the trace presses to toggle recording
    pub record_button: Option<usize>,
}

impl Trace {
    pub fn from_json(json: &str) -> Result<Self, TraceError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}

/// Input device replaying a [`Trace`] one frame per [`ScriptedInput::advance`]
#[derive(Debug, Default)]
pub struct ScriptedInput {
    frames: VecDeque<TraceFrame>,
    current: HashMap<Slot, ControllerSample>,
    pending: Vec<ControllerEvent>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_trace(trace: Trace) -> Self {
        Self {
            frames: trace.frames.into(),
            ..Self::default()
        }
    }

    pub fn push_frame(&mut self, frame: TraceFrame) {
        self.frames.push_back(frame);
    }

    /// Frames not yet replayed
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Load the next frame. Returns false once the trace is exhausted.
    pub fn advance(&mut self) -> bool {
        let Some(frame) = self.frames.pop_front() else {
            return false;
        };

        for event in &frame.events {
            if let ControllerEvent::Disconnected { slot } = event {
                self.current.remove(slot);
            }
        }
        self.current.extend(frame.controllers);
        self.pending.extend(frame.events);
        true
    }
}

impl InputDevice for ScriptedInput {
    fn poll_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.pending)
    }

    fn sample(&self, slot: Slot) -> Option<ControllerSample> {
        self.current.get(&slot).cloned()
    }
}
