//! Configuration loading and management
//!
//! Defaults are overlaid by an optional JSON file (`XR_PAINTER_CONFIG`) and
//! then by individual `XR_PAINTER_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::input::Trace;
use crate::stroke::TriggerPolicy;

/// Environment variable naming an optional JSON config file
pub const CONFIG_ENV: &str = "XR_PAINTER_CONFIG";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderConfig,
    pub stroke: StrokeConfig,
    pub surface: SurfaceConfig,
    /// Gamepad button on a bound stylus that toggles recording
    pub record_button: Option<usize>,
    /// Scripted controller trace replayed by the binary
    pub trace_path: Option<PathBuf>,
}

/// Speech-gated recorder tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Level above which a frame counts as speech, in dBFS
    pub silence_threshold_db: f32,
    /// Quiet time after the last speech frame before recording stops
    pub silence_duration_ms: u64,
    /// Hard cap on a single recording
    pub max_recording_ms: u64,
    /// Analyser FFT size; the time-domain window is half of this
    pub fft_size: usize,
    /// Analyser smoothing time constant in [0, 1]; handed to the backend,
    /// not applied by the time-domain level monitor
    pub smoothing: f32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            silence_threshold_db: -50.0,
            silence_duration_ms: 1000,
            max_recording_ms: 30_000,
            fft_size: 2048,
            smoothing: 0.8,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

impl RecorderConfig {
    pub fn silence_duration(&self) -> Duration {
        Duration::from_millis(self.silence_duration_ms)
    }

    pub fn max_recording(&self) -> Duration {
        Duration::from_millis(self.max_recording_ms)
    }
}

/// Controller binding and drawing-intent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeConfig {
    /// Profile string a device must report to be treated as a stylus
    pub accepted_profile: String,
    pub trigger_policy: TriggerPolicy,
    /// Gamepad button whose analog value drives axis drawing
    pub trigger_button: usize,
    /// Axis values strictly above this count as pressed
    pub trigger_threshold: f32,
    /// Log pressed/touched buttons every frame at trace level
    pub debug_buttons: bool,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            accepted_profile: "logitech-mx-ink".to_string(),
            trigger_policy: TriggerPolicy::Both,
            trigger_button: 5,
            trigger_threshold: 0.0,
            debug_buttons: false,
        }
    }
}

/// Which drawing surface the binary paints on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    Tube,
    Canvas,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub kind: SurfaceKind,
    pub tube_size: f32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub pixels_per_meter: f32,
    pub brush_width: f32,
    /// RGBA
    pub brush_color: [u8; 4],
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            kind: SurfaceKind::Tube,
            tube_size: 0.1,
            canvas_width: 512,
            canvas_height: 512,
            pixels_per_meter: 256.0,
            brush_width: 5.0,
            brush_color: [0xff, 0x00, 0x00, 0xff],
        }
    }
}

impl Config {
    /// Load configuration from the process environment and defaults
    pub fn load() -> Result<Self> {
        let file = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::from_sources(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build configuration from an optional file and an environment lookup
    pub fn from_sources<F>(file: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                serde_json::from_str(&data)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env("XR_PAINTER_SILENCE_THRESHOLD_DB") {
            self.recorder.silence_threshold_db =
                v.parse().context("XR_PAINTER_SILENCE_THRESHOLD_DB")?;
        }
        if let Some(v) = env("XR_PAINTER_SILENCE_DURATION_MS") {
            self.recorder.silence_duration_ms =
                v.parse().context("XR_PAINTER_SILENCE_DURATION_MS")?;
        }
        if let Some(v) = env("XR_PAINTER_MAX_RECORDING_MS") {
            self.recorder.max_recording_ms = v.parse().context("XR_PAINTER_MAX_RECORDING_MS")?;
        }
        if let Some(v) = env("XR_PAINTER_PROFILE") {
            self.stroke.accepted_profile = v;
        }
        if let Some(v) = env("XR_PAINTER_TRIGGER_POLICY") {
            self.stroke.trigger_policy = v.parse()?;
        }
        if let Some(v) = env("XR_PAINTER_RECORD_BUTTON") {
            self.record_button = Some(v.parse().context("XR_PAINTER_RECORD_BUTTON")?);
        }
        if let Some(v) = env("XR_PAINTER_TRACE") {
            self.trace_path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Take settings a trace declares for itself unless already configured
    pub fn apply_trace(&mut self, trace: &Trace) {
        if self.record_button.is_none() {
            self.record_button = trace.record_button;
        }
    }

    /// Reject settings the recorder or analyser cannot run with
    pub fn validate(&self) -> Result<()> {
        let r = &self.recorder;
        if !r.fft_size.is_power_of_two() || !(32..=32_768).contains(&r.fft_size) {
            bail!("fft_size must be a power of two in 32..=32768, got {}", r.fft_size);
        }
        if !(0.0..=1.0).contains(&r.smoothing) {
            bail!("smoothing must be within [0, 1], got {}", r.smoothing);
        }
        if r.silence_duration_ms == 0 || r.max_recording_ms == 0 {
            bail!("recording durations must be non-zero");
        }
        if self.stroke.accepted_profile.is_empty() {
            bail!("accepted_profile must not be empty");
        }
        Ok(())
    }
}
