//! Exclusive ownership of the microphone line and its analysis tap

use tracing::{debug, info};

use super::backend::{AcquisitionError, AudioBackend, CaptureOptions, CaptureState};

/// Owns the audio backend and the analysis window read each tick
///
/// Constructed inert; [`RecorderDevice::initialize`] acquires the line.
pub struct RecorderDevice {
    backend: Box<dyn AudioBackend>,
    options: CaptureOptions,
    window: Vec<f32>,
    initialized: bool,
}

impl RecorderDevice {
    pub fn new(backend: Box<dyn AudioBackend>, options: CaptureOptions) -> Self {
        Self {
            backend,
            options,
            window: Vec::new(),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// Acquire the input line. A second call while initialized succeeds
    /// without touching the hardware.
    pub async fn initialize(&mut self) -> Result<(), AcquisitionError> {
        if self.initialized {
            debug!(backend = self.backend.name(), "audio device already initialized");
            return Ok(());
        }

        self.backend.acquire(&self.options).await?;
        self.window = vec![0.0; self.options.window_len()];
        self.initialized = true;

        info!(
            backend = self.backend.name(),
            sample_rate = self.backend.sample_rate(),
            fft_size = self.options.fft_size,
            "audio system initialized"
        );
        Ok(())
    }

    /// Read the current time-domain window from the analyser
    ///
    /// Returns an empty slice when the device was never initialized.
    pub fn analyse(&mut self) -> &[f32] {
        if !self.initialized {
            return &[];
        }
        self.backend.read_time_domain(&mut self.window);
        &self.window
    }

    pub fn backend(&self) -> &dyn AudioBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn AudioBackend {
        self.backend.as_mut()
    }

    /// Release the line and tear down the analyser. Safe when never
    /// initialized.
    pub fn dispose(&mut self) {
        if !self.initialized {
            debug!("audio device never initialized, nothing to release");
            return;
        }

        if self.backend.capture_state() != CaptureState::Inactive {
            self.backend.stop_capture();
        }
        if self.backend.is_playing() {
            self.backend.stop_playback();
        }
        self.backend.release();
        self.window.clear();
        self.initialized = false;

        info!(backend = self.backend.name(), "audio system released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SimulatedBackend;
    use crate::config::RecorderConfig;

    #[test]
    fn test_initialize_is_idempotent() {
        let backend = SimulatedBackend::new();
        let probe = backend.probe();
        let mut device = RecorderDevice::new(Box::new(backend), CaptureOptions::default());

        tokio_test::block_on(device.initialize()).unwrap();
        tokio_test::block_on(device.initialize()).unwrap();

        assert!(device.is_initialized());
        assert_eq!(probe.acquire_calls(), 1);
        assert_eq!(device.analyse().len(), 1024);
    }

    #[test]
    fn test_acquire_receives_requested_options() {
        let backend = SimulatedBackend::new();
        let probe = backend.probe();
        let config = RecorderConfig {
            fft_size: 512,
            smoothing: 0.5,
            ..RecorderConfig::default()
        };
        let mut device = RecorderDevice::new(Box::new(backend), CaptureOptions::from(&config));

        assert_eq!(probe.options(), None);
        tokio_test::block_on(device.initialize()).unwrap();

        let options = probe.options().unwrap();
        assert!(options.echo_cancellation);
        assert!(options.noise_suppression);
        assert!(options.auto_gain_control);
        assert_eq!(options.fft_size, 512);
        assert_eq!(options.smoothing, 0.5);
        assert_eq!(device.analyse().len(), 256);
    }

    #[test]
    fn test_initialize_failure_leaves_device_inert() {
        let backend = SimulatedBackend::new();
        let probe = backend.probe();
        probe.fail_acquire(AcquisitionError::PermissionDenied);
        let mut device = RecorderDevice::new(Box::new(backend), CaptureOptions::default());

        let err = tokio_test::block_on(device.initialize()).unwrap_err();
        assert_eq!(err, AcquisitionError::PermissionDenied);
        assert!(!device.is_initialized());
        assert!(device.analyse().is_empty());
    }

    #[test]
    fn test_dispose_before_initialize() {
        let backend = SimulatedBackend::new();
        let probe = backend.probe();
        let mut device = RecorderDevice::new(Box::new(backend), CaptureOptions::default());

        device.dispose();
        assert_eq!(probe.release_calls(), 0);
    }

    #[test]
    fn test_dispose_releases_line() {
        let backend = SimulatedBackend::new();
        let probe = backend.probe();
        let mut device = RecorderDevice::new(Box::new(backend), CaptureOptions::default());

        tokio_test::block_on(device.initialize()).unwrap();
        device.dispose();
        assert_eq!(probe.release_calls(), 1);
        assert!(!probe.is_acquired());
        assert!(!device.is_initialized());
    }
}
