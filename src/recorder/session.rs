//! One audio capture lifecycle

use std::time::{Duration, Instant};

use crate::audio::ChunkSink;
use crate::events::StopReason;

use super::deadline::Deadline;

/// Lifecycle state of a [`RecorderSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Opened, capture stream not yet delivering
    Armed,
    Recording,
    /// Deadlines cancelled, chunks being finalized
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Armed => write!(f, "Armed"),
            SessionState::Recording => write!(f, "Recording"),
            SessionState::Stopping => write!(f, "Stopping"),
        }
    }
}

/// A single recording, from start to hand-off
#[derive(Debug)]
pub struct RecorderSession {
    id: u64,
    state: SessionState,
    sink: ChunkSink,
    started_at: Instant,
    silence_deadline: Deadline,
    hard_deadline: Deadline,
    speech_detected: bool,
}

impl RecorderSession {
    /// Open a session; the hard deadline is fixed here for good
    pub(crate) fn open(id: u64, now: Instant, max_recording: Duration) -> Self {
        Self {
            id,
            state: SessionState::Armed,
            sink: ChunkSink::new(),
            started_at: now,
            silence_deadline: Deadline::default(),
            hard_deadline: Deadline::at(now + max_recording),
            speech_detected: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Number of chunks captured so far
    pub fn chunk_count(&self) -> usize {
        self.sink.len()
    }

    pub fn speech_detected(&self) -> bool {
        self.speech_detected
    }

    pub fn silence_deadline(&self) -> Option<Instant> {
        self.silence_deadline.due()
    }

    pub fn hard_deadline(&self) -> Option<Instant> {
        self.hard_deadline.due()
    }

    /// Sink handed to the capture stream
    pub(crate) fn sink(&self) -> ChunkSink {
        self.sink.clone()
    }

    pub(crate) fn mark_recording(&mut self) {
        self.state = SessionState::Recording;
    }

    /// Record speech at `now`: the silence deadline restarts from here.
    ///
    /// Returns true for the first speech frame of the session.
    pub(crate) fn note_speech(&mut self, now: Instant, silence: Duration) -> bool {
        self.silence_deadline.arm(now + silence);
        let first = !self.speech_detected;
        self.speech_detected = true;
        first
    }

    /// Fire whichever deadline is due; the hard limit wins a tie
    pub(crate) fn poll_deadlines(&mut self, now: Instant) -> Option<StopReason> {
        if self.state != SessionState::Recording {
            return None;
        }
        if self.hard_deadline.fire_if_due(now) {
            return Some(StopReason::MaxDuration);
        }
        if self.silence_deadline.fire_if_due(now) {
            return Some(StopReason::Silence);
        }
        None
    }

    /// Cancel both deadlines; the sink stays open for the final block
    pub(crate) fn begin_stop(&mut self) {
        self.state = SessionState::Stopping;
        self.silence_deadline.cancel();
        self.hard_deadline.cancel();
    }

    /// Close the sink and take the captured chunks. Call after the capture
    /// stream has stopped.
    pub(crate) fn take_chunks(&mut self) -> Vec<Vec<f32>> {
        self.sink.close()
    }

    pub(crate) fn finish(&mut self) {
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: Duration = Duration::from_secs(30);
    const SILENCE: Duration = Duration::from_millis(1000);

    #[test]
    fn test_open_sets_fixed_hard_deadline() {
        let t0 = Instant::now();
        let session = RecorderSession::open(1, t0, MAX);
        assert_eq!(session.state(), SessionState::Armed);
        assert_eq!(session.hard_deadline(), Some(t0 + MAX));
        assert_eq!(session.silence_deadline(), None);
        assert_eq!(session.chunk_count(), 0);
    }

    #[test]
    fn test_deadlines_ignored_until_recording() {
        let t0 = Instant::now();
        let mut session = RecorderSession::open(1, t0, MAX);
        assert_eq!(session.poll_deadlines(t0 + MAX), None);

        session.mark_recording();
        assert_eq!(session.poll_deadlines(t0 + MAX), Some(StopReason::MaxDuration));
    }

    #[test]
    fn test_speech_resets_silence_deadline() {
        let t0 = Instant::now();
        let mut session = RecorderSession::open(1, t0, MAX);
        session.mark_recording();

        assert!(session.note_speech(t0, SILENCE));
        assert!(!session.note_speech(t0 + Duration::from_millis(500), SILENCE));
        assert_eq!(
            session.silence_deadline(),
            Some(t0 + Duration::from_millis(1500))
        );
        assert_eq!(session.poll_deadlines(t0 + Duration::from_millis(1499)), None);
        assert_eq!(
            session.poll_deadlines(t0 + Duration::from_millis(1500)),
            Some(StopReason::Silence)
        );
    }

    #[test]
    fn test_begin_stop_cancels_and_drains() {
        let t0 = Instant::now();
        let mut session = RecorderSession::open(1, t0, MAX);
        session.mark_recording();
        session.note_speech(t0, SILENCE);
        session.sink().push(&[0.25; 4]);

        session.begin_stop();
        assert_eq!(session.state(), SessionState::Stopping);
        assert_eq!(session.silence_deadline(), None);
        assert_eq!(session.hard_deadline(), None);
        assert_eq!(session.poll_deadlines(t0 + MAX), None);

        // still open until the stream has stopped
        assert!(session.sink().push(&[0.5; 2]));
        let chunks = session.take_chunks();
        assert_eq!(chunks.len(), 2);
        assert!(!session.sink().push(&[0.5; 2]));
    }
}
