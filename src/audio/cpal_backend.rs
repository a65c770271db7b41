//! System audio devices via cpal
//!
//! The input stream runs from acquisition until release and feeds the
//! analysis ring; captured blocks only reach a sink while one is installed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, Stream};
use tracing::{debug, error, info, warn};

use super::backend::{
    AcquisitionError, AudioBackend, AudioClip, AudioError, CaptureOptions, CaptureState,
    ChunkSink,
};

/// Default input and output devices of the default host
pub struct CpalBackend {
    input: Option<Stream>,
    output: Option<Stream>,
    sample_rate: u32,
    window_len: usize,
    analysis: Arc<Mutex<VecDeque<f32>>>,
    sink: Arc<Mutex<Option<ChunkSink>>>,
    playing: Arc<AtomicBool>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            input: None,
            output: None,
            sample_rate: 0,
            window_len: 0,
            analysis: Arc::new(Mutex::new(VecDeque::new())),
            sink: Arc::new(Mutex::new(None)),
            playing: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn map_build_error(err: BuildStreamError) -> AcquisitionError {
    match err {
        BuildStreamError::DeviceNotAvailable => AcquisitionError::NoInputDevice,
        other => AcquisitionError::Backend(other.to_string()),
    }
}

#[async_trait(?Send)]
impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    async fn acquire(&mut self, options: &CaptureOptions) -> Result<(), AcquisitionError> {
        if self.input.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AcquisitionError::NoInputDevice)?;
        let supported = device
            .default_input_config()
            .map_err(|e| AcquisitionError::Backend(e.to_string()))?;

        let channels = supported.channels().max(1) as usize;
        let config = supported.config();
        self.sample_rate = config.sample_rate.0;
        self.window_len = options.window_len();

        if options.echo_cancellation || options.noise_suppression || options.auto_gain_control {
            debug!("input processing flags are not supported by cpal and are ignored");
        }

        let analysis = Arc::clone(&self.analysis);
        let sink = Arc::clone(&self.sink);
        let window_len = self.window_len;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono: Vec<f32> = data
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                        .collect();

                    if let Ok(mut ring) = analysis.lock() {
                        ring.extend(mono.iter().copied());
                        while ring.len() > window_len {
                            ring.pop_front();
                        }
                    }
                    if let Ok(slot) = sink.lock() {
                        if let Some(sink) = slot.as_ref() {
                            sink.push(&mono);
                        }
                    }
                },
                |err| error!(error = %err, "audio input stream error"),
                None,
            )
            .map_err(map_build_error)?;

        stream
            .play()
            .map_err(|e| AcquisitionError::Backend(e.to_string()))?;
        self.input = Some(stream);

        info!(
            device = device.name().unwrap_or_default(),
            sample_rate = self.sample_rate,
            channels,
            "microphone acquired"
        );
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_time_domain(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let Ok(ring) = self.analysis.lock() else {
            return;
        };
        let n = ring.len().min(out.len());
        let offset = out.len() - n;
        for (dst, src) in out[offset..].iter_mut().zip(ring.iter().skip(ring.len() - n)) {
            *dst = *src;
        }
    }

    fn start_capture(&mut self, sink: ChunkSink) -> Result<(), AudioError> {
        if self.input.is_none() {
            return Err(AudioError::NotInitialized);
        }
        let mut slot = self
            .sink
            .lock()
            .map_err(|e| AudioError::Capture(e.to_string()))?;
        *slot = Some(sink);
        Ok(())
    }

    fn stop_capture(&mut self) {
        if let Ok(mut slot) = self.sink.lock() {
            slot.take();
        }
    }

    fn capture_state(&self) -> CaptureState {
        match self.sink.lock() {
            Ok(slot) if slot.is_some() => CaptureState::Recording,
            _ => CaptureState::Inactive,
        }
    }

    fn start_playback(&mut self, clip: &AudioClip) -> Result<(), AudioError> {
        self.stop_playback();
        if clip.samples.is_empty() || clip.sample_rate == 0 {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::Playback("no output device".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Playback(e.to_string()))?;
        let channels = supported.channels().max(1) as usize;
        let config = supported.config();

        // Nearest-sample resampling to the device rate
        let step = clip.sample_rate as f64 / config.sample_rate.0 as f64;
        let samples = Arc::new(clip.samples.clone());
        let playing = Arc::clone(&self.playing);
        let mut position = 0f64;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let index = position as usize;
                        let value = match samples.get(index) {
                            Some(v) => *v,
                            None => {
                                playing.store(false, Ordering::SeqCst);
                                0.0
                            }
                        };
                        frame.fill(value);
                        position += step;
                    }
                },
                |err| error!(error = %err, "audio output stream error"),
                None,
            )
            .map_err(|e| AudioError::Playback(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Playback(e.to_string()))?;
        self.playing.store(true, Ordering::SeqCst);
        self.output = Some(stream);
        Ok(())
    }

    fn stop_playback(&mut self) {
        if self.output.take().is_some() {
            debug!("playback stream dropped");
        }
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn release(&mut self) {
        self.stop_capture();
        self.stop_playback();
        if self.input.take().is_none() {
            warn!("release called without an active input stream");
        }
        if let Ok(mut ring) = self.analysis.lock() {
            ring.clear();
        }
        info!("microphone released");
    }
}
