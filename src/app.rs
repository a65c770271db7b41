//! Per-frame application context
//!
//! Owns both state machines, the drawing surface and the input device, and
//! runs them in a fixed order once per display frame.

use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::audio::AudioBackend;
use crate::config::Config;
use crate::events::AppEvent;
use crate::input::InputDevice;
use crate::recorder::{CapturedAudio, Recorder};
use crate::stroke::{DrawingSurface, StrokeController};

pub struct AppContext<S, I> {
    recorder: Recorder,
    strokes: StrokeController,
    surface: S,
    input: I,
    /// Button that toggles recording, with its state on the previous frame
    record_button: Option<usize>,
    record_held: bool,
    frames: u64,
    disposed: bool,
}

impl<S: DrawingSurface, I: InputDevice> AppContext<S, I> {
    pub fn new(
        config: &Config,
        backend: Box<dyn AudioBackend>,
        surface: S,
        input: I,
        event_tx: broadcast::Sender<AppEvent>,
        audio_tx: mpsc::UnboundedSender<CapturedAudio>,
    ) -> Self {
        Self {
            recorder: Recorder::new(config.recorder.clone(), backend, event_tx.clone(), audio_tx),
            strokes: StrokeController::new(config.stroke.clone(), event_tx),
            surface,
            input,
            record_button: config.record_button,
            record_held: false,
            frames: 0,
            disposed: false,
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    pub fn strokes(&self) -> &StrokeController {
        &self.strokes
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    /// Frames run so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one display frame at time `now`
    pub async fn frame(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.frames += 1;

        for event in self.input.poll_events() {
            self.strokes
                .handle_event(event, &self.input, &mut self.surface);
        }
        self.strokes.update(&self.input, &mut self.surface);

        if self.record_toggled() {
            if self.recorder.is_recording() {
                self.recorder.stop_recording(now);
            } else {
                self.recorder.start_recording(now).await;
            }
        }

        self.recorder.update(now);
        self.recorder.update_icon_animation();
    }

    /// Dispose the recorder. Later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.recorder.dispose();
        info!(frames = self.frames, "application context shut down");
    }

    /// Rising edge of the record button on any bound stylus
    fn record_toggled(&mut self) -> bool {
        let Some(button) = self.record_button else {
            return false;
        };

        let held = self
            .strokes
            .bound_slots()
            .into_iter()
            .filter_map(|slot| self.input.sample(slot))
            .any(|sample| sample.is_pressed(button));
        let rising = held && !self.record_held;
        self.record_held = held;

        if rising {
            debug!(button, "record button pressed");
        }
        rising
    }
}
