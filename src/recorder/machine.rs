//! Speech-gated recorder
//!
//! Owns the recorder device, at most one [`RecorderSession`], and the status
//! indicator. The host drives it once per frame through [`Recorder::update`];
//! deadlines are polled there, before the level read of the same tick.

use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, trace, warn};

use crate::audio::encode::{concat_chunks, samples_to_wav};
use crate::audio::{
    AudioBackend, AudioClip, CaptureOptions, CaptureState, LevelReading, RecorderDevice,
    VoiceActivityDetector,
};
use crate::config::RecorderConfig;
use crate::events::{AppEvent, StopReason};

use super::indicator::{IndicatorColor, StatusIndicator};
use super::session::{RecorderSession, SessionState};

/// A finalized recording handed to the single downstream consumer
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    /// Mono 16-bit PCM WAV
    pub wav: Vec<u8>,
    pub byte_size: usize,
    pub sample_rate: u32,
    pub sample_count: usize,
    /// Time the session was open
    pub duration_ms: u64,
    pub reason: StopReason,
}

/// Speech-gated audio recorder
pub struct Recorder {
    config: RecorderConfig,
    device: RecorderDevice,
    vad: VoiceActivityDetector,
    session: Option<RecorderSession>,
    next_session_id: u64,
    indicator: StatusIndicator,
    playing: bool,
    last_tick: Option<Instant>,
    event_tx: broadcast::Sender<AppEvent>,
    audio_tx: mpsc::UnboundedSender<CapturedAudio>,
}

impl Recorder {
    /// Create an inert recorder; no hardware is touched until
    /// [`Recorder::initialize`] or [`Recorder::start_recording`]
    pub fn new(
        config: RecorderConfig,
        backend: Box<dyn AudioBackend>,
        event_tx: broadcast::Sender<AppEvent>,
        audio_tx: mpsc::UnboundedSender<CapturedAudio>,
    ) -> Self {
        let options = CaptureOptions::from(&config);
        Self {
            vad: VoiceActivityDetector::new(config.silence_threshold_db),
            device: RecorderDevice::new(backend, options),
            config,
            session: None,
            next_session_id: 1,
            indicator: StatusIndicator::default(),
            playing: false,
            last_tick: None,
            event_tx,
            audio_tx,
        }
    }

    /// True between a successful start and the next stop
    pub fn is_recording(&self) -> bool {
        matches!(
            self.session.as_ref().map(RecorderSession::state),
            Some(SessionState::Recording)
        )
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_initialized()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn session(&self) -> Option<&RecorderSession> {
        self.session.as_ref()
    }

    pub fn indicator(&self) -> &StatusIndicator {
        &self.indicator
    }

    /// Acquire the audio hardware and analysis pipeline
    ///
    /// Idempotent. Failure is logged and reported as `false`.
    pub async fn initialize(&mut self) -> bool {
        match self.device.initialize().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "error initializing audio system");
                false
            }
        }
    }

    /// Open a new session and start buffering audio
    ///
    /// Initializes the device first when needed; a failed initialization
    /// makes this a no-op, as does an already running recording.
    pub async fn start_recording(&mut self, now: Instant) {
        self.last_tick = Some(now);
        if self.session.is_some() {
            debug!("recording already active");
            return;
        }
        if !self.initialize().await {
            warn!("recording unavailable, audio system not initialized");
            return;
        }

        let id = self.next_session_id;
        self.next_session_id += 1;
        let mut session = RecorderSession::open(id, now, self.config.max_recording());

        if let Err(e) = self.device.backend_mut().start_capture(session.sink()) {
            error!(error = %e, session = id, "failed to start capture");
            return;
        }
        session.mark_recording();
        self.session = Some(session);

        self.indicator.show_recording();
        info!(
            session = id,
            max_ms = self.config.max_recording_ms,
            "recording started"
        );
        self.emit(AppEvent::RecordingStarted);
    }

    /// Stop the active recording and hand off the captured audio
    ///
    /// No-op when nothing is recording.
    pub fn stop_recording(&mut self, now: Instant) {
        self.last_tick = Some(now);
        self.finish(now, StopReason::Manual);
    }

    /// Fire any due deadline
    pub fn poll_timers(&mut self, now: Instant) {
        let reason = match self.session.as_mut() {
            Some(session) => session.poll_deadlines(now),
            None => None,
        };
        if let Some(reason) = reason {
            debug!(%reason, "recording deadline reached");
            self.finish(now, reason);
        }
    }

    /// One level-monitor tick; does nothing unless recording
    pub fn monitor_audio_levels(&mut self, now: Instant) {
        if !self.is_recording() {
            return;
        }

        let reading = LevelReading::measure(self.device.analyse());
        trace!(rms = reading.rms, db = reading.db, "audio level");

        if !self.vad.is_speech(&reading) {
            return;
        }
        let silence = self.config.silence_duration();
        let first = match self.session.as_mut() {
            Some(session) => session.note_speech(now, silence),
            None => return,
        };
        if first {
            debug!(db = reading.db, "speech detected");
            self.emit(AppEvent::SpeechDetected);
        }
    }

    /// Per-frame tick: deadlines, level monitor, playback completion
    pub fn update(&mut self, now: Instant) {
        self.last_tick = Some(now);
        self.poll_timers(now);
        self.monitor_audio_levels(now);
        self.poll_playback();
    }

    /// Play a decoded clip, cancelling any playback still running
    pub fn play_audio_response(&mut self, clip: &AudioClip) {
        if !self.device.is_initialized() {
            error!("error playing audio: audio system not initialized");
            return;
        }

        let backend = self.device.backend_mut();
        if self.playing || backend.is_playing() {
            debug!("cancelling previous playback");
            backend.stop_playback();
        }

        match backend.start_playback(clip) {
            Ok(()) => {
                self.playing = true;
                self.indicator.set_color(IndicatorColor::Playing);
                debug!(samples = clip.samples.len(), "playback started");
                self.emit(AppEvent::PlaybackStarted);
            }
            Err(e) => {
                self.playing = false;
                error!(error = %e, "error playing audio");
            }
        }
    }

    /// Cosmetic pulse, only while recording
    pub fn update_icon_animation(&mut self) {
        if !self.is_recording() {
            return;
        }
        self.indicator.pulse();
    }

    /// Stop any recording and release the hardware line
    ///
    /// Safe to call when the device was never initialized.
    pub fn dispose(&mut self) {
        let now = self.last_tick.unwrap_or_else(Instant::now);
        self.finish(now, StopReason::Disposed);

        if self.playing {
            self.device.backend_mut().stop_playback();
            self.playing = false;
        }
        self.device.dispose();
    }

    fn poll_playback(&mut self) {
        if self.playing && !self.device.backend().is_playing() {
            self.playing = false;
            self.indicator.set_color(IndicatorColor::Idle);
            debug!("playback finished");
            self.emit(AppEvent::PlaybackFinished);
        }
    }

    fn finish(&mut self, now: Instant, reason: StopReason) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.begin_stop();
        self.indicator.hide();

        let backend = self.device.backend_mut();
        if backend.capture_state() != CaptureState::Inactive {
            backend.stop_capture();
        } else {
            debug!(session = session.id(), "capture stream already inactive");
        }
        let sample_rate = backend.sample_rate();
        let chunks = session.take_chunks();

        let duration_ms = now
            .saturating_duration_since(session.started_at())
            .as_millis() as u64;
        info!(
            session = session.id(),
            %reason,
            duration_ms,
            chunks = chunks.len(),
            "recording stopped"
        );
        self.emit(AppEvent::RecordingStopped {
            reason,
            duration_ms,
        });

        let samples = concat_chunks(&chunks);
        match samples_to_wav(&samples, sample_rate) {
            Ok(wav) => {
                let byte_size = wav.len();
                info!(size = byte_size, "audio recording complete");
                let captured = CapturedAudio {
                    wav,
                    byte_size,
                    sample_rate,
                    sample_count: samples.len(),
                    duration_ms,
                    reason,
                };
                if self.audio_tx.send(captured).is_err() {
                    warn!("no consumer for captured audio");
                }
                self.emit(AppEvent::AudioCaptured { byte_size });
            }
            Err(e) => {
                error!(error = %e, "failed to finalize recording");
            }
        }

        session.finish();
    }

    fn emit(&self, event: AppEvent) {
        debug!(%event, "emitting recorder event");
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::audio::{AcquisitionError, SimulatedBackend, SimulatedProbe};
    use crate::clock::FRAME;

    struct Harness {
        recorder: Recorder,
        probe: SimulatedProbe,
        events: broadcast::Receiver<AppEvent>,
        audio: mpsc::UnboundedReceiver<CapturedAudio>,
    }

    fn harness() -> Harness {
        harness_with(RecorderConfig::default())
    }

    fn harness_with(config: RecorderConfig) -> Harness {
        let backend = SimulatedBackend::new();
        let probe = backend.probe();
        let (event_tx, events) = broadcast::channel(256);
        let (audio_tx, audio) = mpsc::unbounded_channel();
        Harness {
            recorder: Recorder::new(config, Box::new(backend), event_tx, audio_tx),
            probe,
            events,
            audio,
        }
    }

    fn drain(events: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_start_initializes_and_records() {
        let mut h = harness();
        let t0 = Instant::now();

        tokio_test::block_on(h.recorder.start_recording(t0));

        assert!(h.recorder.is_initialized());
        assert!(h.recorder.is_recording());
        assert!(h.probe.is_capturing());
        assert!(h.recorder.indicator().visible);
        assert_eq!(
            h.recorder.session().unwrap().hard_deadline(),
            Some(t0 + ms(30_000))
        );
        assert_eq!(drain(&mut h.events), vec![AppEvent::RecordingStarted]);
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut h = harness();
        let t0 = Instant::now();

        tokio_test::block_on(h.recorder.start_recording(t0));
        let first = h.recorder.session().unwrap().id();
        tokio_test::block_on(h.recorder.start_recording(t0 + ms(100)));

        assert_eq!(h.recorder.session().unwrap().id(), first);
        assert_eq!(h.probe.acquire_calls(), 1);
        assert_eq!(drain(&mut h.events), vec![AppEvent::RecordingStarted]);
    }

    #[test]
    fn test_start_without_hardware_is_noop() {
        let mut h = harness();
        h.probe.fail_acquire(AcquisitionError::NoInputDevice);

        assert!(!tokio_test::block_on(h.recorder.initialize()));
        tokio_test::block_on(h.recorder.start_recording(Instant::now()));

        assert!(!h.recorder.is_recording());
        assert!(h.recorder.session().is_none());
        assert!(drain(&mut h.events).is_empty());
    }

    #[test]
    fn test_initialize_recovers_after_permission_granted() {
        let mut h = harness();
        h.probe.fail_acquire(AcquisitionError::PermissionDenied);
        assert!(!tokio_test::block_on(h.recorder.initialize()));

        h.probe.allow_acquire();
        assert!(tokio_test::block_on(h.recorder.initialize()));
        assert!(tokio_test::block_on(h.recorder.initialize()));
        assert_eq!(h.probe.acquire_calls(), 2);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let mut h = harness();
        h.recorder.stop_recording(Instant::now());

        assert!(h.recorder.session().is_none());
        assert!(drain(&mut h.events).is_empty());
        assert!(h.audio.try_recv().is_err());
    }

    #[test]
    fn test_stop_hands_off_once() {
        let mut h = harness();
        let t0 = Instant::now();
        h.probe.hold_level(Some(-30.0));

        tokio_test::block_on(h.recorder.start_recording(t0));
        for i in 1..=3 {
            h.recorder.update(t0 + FRAME * i);
        }
        h.recorder.stop_recording(t0 + ms(250));
        h.recorder.stop_recording(t0 + ms(300));

        assert!(!h.recorder.is_recording());
        assert!(!h.recorder.indicator().visible);
        assert!(!h.probe.is_capturing());

        let captured = h.audio.try_recv().unwrap();
        assert_eq!(captured.reason, StopReason::Manual);
        assert_eq!(captured.duration_ms, 250);
        assert_eq!(captured.sample_count, 3 * 1024);
        assert_eq!(captured.byte_size, captured.wav.len());
        assert_eq!(captured.byte_size, 44 + 3 * 1024 * 2);
        assert!(h.audio.try_recv().is_err());

        let events = drain(&mut h.events);
        assert_eq!(
            events,
            vec![
                AppEvent::RecordingStarted,
                AppEvent::SpeechDetected,
                AppEvent::RecordingStopped {
                    reason: StopReason::Manual,
                    duration_ms: 250
                },
                AppEvent::AudioCaptured {
                    byte_size: captured.byte_size
                },
            ]
        );
    }

    #[test]
    fn test_at_most_one_session_across_sequences() {
        let mut h = harness();
        let t0 = Instant::now();
        let ops = [true, true, false, false, true, false, true, true, false];

        for (i, start) in ops.iter().enumerate() {
            let now = t0 + ms(10 * i as u64);
            if *start {
                let was_recording = h.recorder.is_recording();
                tokio_test::block_on(h.recorder.start_recording(now));
                assert!(h.recorder.is_recording());
                if !was_recording {
                    assert_eq!(h.recorder.session().unwrap().chunk_count(), 0);
                }
            } else {
                h.recorder.stop_recording(now);
                assert!(!h.recorder.is_recording());
                assert!(h.recorder.session().is_none());
            }
        }

        let mut handoffs = 0;
        while h.audio.try_recv().is_ok() {
            handoffs += 1;
        }
        assert_eq!(handoffs, 3);
    }

    #[test]
    fn test_silence_stops_exactly_after_last_speech() {
        let mut h = harness();
        let t0 = Instant::now();
        h.probe.push_levels([-30.0]);

        tokio_test::block_on(h.recorder.start_recording(t0));
        let speech_at = t0 + ms(40);
        h.recorder.update(speech_at);
        assert_eq!(
            h.recorder.session().unwrap().silence_deadline(),
            Some(speech_at + ms(1000))
        );

        h.recorder.update(speech_at + ms(500));
        h.recorder.update(speech_at + ms(999));
        assert!(h.recorder.is_recording());

        h.recorder.update(speech_at + ms(1000));
        assert!(!h.recorder.is_recording());
        assert_eq!(h.audio.try_recv().unwrap().reason, StopReason::Silence);
    }

    #[test]
    fn test_quiet_session_runs_to_hard_deadline() {
        let mut h = harness();
        let t0 = Instant::now();
        h.probe.hold_level(Some(-70.0));

        tokio_test::block_on(h.recorder.start_recording(t0));
        h.recorder.update(t0 + ms(29_999));
        assert!(h.recorder.is_recording());
        assert!(!h.recorder.session().unwrap().speech_detected());

        h.recorder.update(t0 + ms(30_000));
        assert!(!h.recorder.is_recording());
        assert_eq!(h.audio.try_recv().unwrap().reason, StopReason::MaxDuration);
    }

    #[test]
    fn test_continuous_speech_hits_max_duration() {
        let mut h = harness_with(RecorderConfig {
            max_recording_ms: 2_000,
            ..RecorderConfig::default()
        });
        let t0 = Instant::now();
        h.probe.hold_level(Some(-20.0));

        tokio_test::block_on(h.recorder.start_recording(t0));
        let mut frame = 1;
        while t0 + FRAME * frame < t0 + ms(2_000) {
            h.recorder.update(t0 + FRAME * frame);
            assert!(h.recorder.is_recording(), "stopped early at frame {}", frame);
            frame += 1;
        }

        h.recorder.update(t0 + ms(2_000));
        assert!(!h.recorder.is_recording());
        let captured = h.audio.try_recv().unwrap();
        assert_eq!(captured.reason, StopReason::MaxDuration);
        assert_eq!(captured.duration_ms, 2_000);
    }

    #[test]
    fn test_level_trace_scenario() {
        let mut h = harness();
        let t0 = Instant::now();
        h.probe.push_levels([-60.0, -60.0, -40.0, -60.0]);
        h.probe.hold_level(Some(-60.0));

        tokio_test::block_on(h.recorder.start_recording(t0));
        for frame in 0..2 {
            h.recorder.update(t0 + FRAME * frame);
            assert_eq!(h.recorder.session().unwrap().silence_deadline(), None);
        }

        let frame2 = t0 + FRAME * 2;
        h.recorder.update(frame2);
        assert_eq!(
            h.recorder.session().unwrap().silence_deadline(),
            Some(frame2 + ms(1000))
        );

        for frame in 3..=61 {
            h.recorder.update(t0 + FRAME * frame);
            assert!(h.recorder.is_recording(), "stopped early at frame {}", frame);
        }
        let mut stopped_at = None;
        for frame in 62..=64 {
            h.recorder.update(t0 + FRAME * frame);
            if !h.recorder.is_recording() {
                stopped_at = Some(frame);
                break;
            }
        }
        let stopped_at = stopped_at.expect("recording should stop after silence");
        assert!((60..=61).contains(&(stopped_at - 2)));
        assert_eq!(h.audio.try_recv().unwrap().reason, StopReason::Silence);
    }

    #[test]
    fn test_deadline_fires_before_same_tick_speech() {
        let mut h = harness();
        let t0 = Instant::now();
        h.probe.push_levels([-30.0]);
        h.probe.hold_level(None);

        tokio_test::block_on(h.recorder.start_recording(t0));
        h.recorder.update(t0);

        h.probe.push_levels([-30.0]);
        h.recorder.update(t0 + ms(1000));
        assert!(!h.recorder.is_recording());
        assert_eq!(h.audio.try_recv().unwrap().reason, StopReason::Silence);
    }

    #[test]
    fn test_stale_deadline_after_stop_is_noop() {
        let mut h = harness();
        let t0 = Instant::now();
        h.probe.push_levels([-30.0]);

        tokio_test::block_on(h.recorder.start_recording(t0));
        h.recorder.update(t0);
        h.recorder.stop_recording(t0 + ms(10));
        let _ = drain(&mut h.events);

        h.recorder.poll_timers(t0 + ms(5_000));
        h.recorder.update(t0 + ms(40_000));
        assert!(drain(&mut h.events).is_empty());
        assert!(h.audio.try_recv().is_ok());
        assert!(h.audio.try_recv().is_err());
    }

    #[test]
    fn test_stop_tolerates_dead_capture_stream() {
        let mut h = harness();
        let t0 = Instant::now();

        tokio_test::block_on(h.recorder.start_recording(t0));
        h.probe.drop_capture();
        h.recorder.stop_recording(t0 + ms(100));

        assert_eq!(h.probe.capture_stops(), 0);
        assert!(h.audio.try_recv().is_ok());
    }

    #[test]
    fn test_stop_keeps_block_flushed_by_stopping_stream() {
        let mut h = harness();
        let t0 = Instant::now();

        tokio_test::block_on(h.recorder.start_recording(t0));
        h.probe.flush_on_stop(vec![0.5; 256]);
        h.recorder.stop_recording(t0 + ms(100));

        let captured = h.audio.try_recv().unwrap();
        assert_eq!(captured.sample_count, 256);
        assert_eq!(captured.byte_size, 44 + 256 * 2);
    }

    #[test]
    fn test_no_monitoring_while_idle() {
        let mut h = harness();
        assert!(tokio_test::block_on(h.recorder.initialize()));
        h.recorder.update(Instant::now());
        h.recorder.monitor_audio_levels(Instant::now());
        assert_eq!(h.probe.reads(), 0);
    }

    #[test]
    fn test_icon_animates_only_while_recording() {
        let mut h = harness();
        let t0 = Instant::now();
        h.recorder.update_icon_animation();
        assert_eq!(h.recorder.indicator().scale, 1.0);

        tokio_test::block_on(h.recorder.start_recording(t0));
        h.recorder.update_icon_animation();
        assert!(h.recorder.indicator().scale > 1.0);
    }

    #[test]
    fn test_playback_toggles_indicator_color() {
        let mut h = harness();
        assert!(tokio_test::block_on(h.recorder.initialize()));

        h.recorder
            .play_audio_response(&AudioClip::new(vec![0.1; 160], 16_000));
        assert!(h.recorder.is_playing());
        assert_eq!(h.recorder.indicator().color, IndicatorColor::Playing);

        h.recorder.update(Instant::now());
        assert_eq!(h.recorder.indicator().color, IndicatorColor::Playing);

        h.probe.finish_playback();
        h.recorder.update(Instant::now());
        assert!(!h.recorder.is_playing());
        assert_eq!(h.recorder.indicator().color, IndicatorColor::Idle);
        assert_eq!(
            drain(&mut h.events),
            vec![AppEvent::PlaybackStarted, AppEvent::PlaybackFinished]
        );
    }

    #[test]
    fn test_newer_playback_replaces_running_one() {
        let mut h = harness();
        assert!(tokio_test::block_on(h.recorder.initialize()));

        h.recorder.play_audio_response(&AudioClip::new(vec![0.1; 100], 16_000));
        h.recorder.play_audio_response(&AudioClip::new(vec![0.1; 300], 16_000));

        assert_eq!(h.probe.playback_starts(), 2);
        assert_eq!(h.probe.last_clip_len(), 300);
        assert!(h.recorder.is_playing());
    }

    #[test]
    fn test_playback_before_initialize_is_logged_noop() {
        let mut h = harness();
        h.recorder.play_audio_response(&AudioClip::new(vec![0.1; 100], 16_000));
        assert!(!h.recorder.is_playing());
        assert_eq!(h.probe.playback_starts(), 0);
    }

    #[test]
    fn test_dispose_before_initialize() {
        let mut h = harness();
        h.recorder.dispose();
        assert_eq!(h.probe.release_calls(), 0);
        assert!(drain(&mut h.events).is_empty());
    }

    #[test]
    fn test_dispose_stops_recording_and_releases() {
        let mut h = harness();
        let t0 = Instant::now();

        tokio_test::block_on(h.recorder.start_recording(t0));
        h.recorder.update(t0 + ms(500));
        h.recorder.dispose();

        assert!(!h.recorder.is_recording());
        assert!(!h.recorder.is_initialized());
        assert_eq!(h.probe.release_calls(), 1);
        let captured = h.audio.try_recv().unwrap();
        assert_eq!(captured.reason, StopReason::Disposed);
        assert_eq!(captured.duration_ms, 500);
    }
}
