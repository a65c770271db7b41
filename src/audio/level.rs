//! Loudness measurement for voice activity detection

/// Root-mean-square amplitude of `samples`; zero for an empty buffer
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Convert an RMS amplitude to dBFS. Silence maps to negative infinity.
pub fn to_decibels(rms: f32) -> f32 {
    20.0 * rms.log10()
}

/// One level-monitor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReading {
    pub rms: f32,
    pub db: f32,
}

impl LevelReading {
    pub fn measure(samples: &[f32]) -> Self {
        let rms = rms(samples);
        Self {
            rms,
            db: to_decibels(rms),
        }
    }
}

/// Threshold detector deciding whether a reading is speech
#[derive(Debug, Clone, Copy)]
pub struct VoiceActivityDetector {
    threshold_db: f32,
}

impl VoiceActivityDetector {
    pub fn new(threshold_db: f32) -> Self {
        Self { threshold_db }
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Strictly above the threshold counts as speech
    pub fn is_speech(&self, reading: &LevelReading) -> bool {
        reading.db > self.threshold_db
    }
}

/// Constant amplitude whose RMS equals `db` dBFS
pub fn amplitude_for_db(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_constant_signal() {
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert!((rms(&[-0.5, 0.5, -0.5, 0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_silence_is_negative_infinity() {
        let reading = LevelReading::measure(&[0.0; 32]);
        assert_eq!(reading.rms, 0.0);
        assert!(reading.db.is_infinite() && reading.db < 0.0);
        assert!(!VoiceActivityDetector::new(-50.0).is_speech(&reading));
    }

    #[test]
    fn test_empty_buffer_is_not_speech() {
        let reading = LevelReading::measure(&[]);
        assert!(!VoiceActivityDetector::new(-50.0).is_speech(&reading));
    }

    #[test]
    fn test_threshold_is_strict() {
        let vad = VoiceActivityDetector::new(-50.0);
        let loud = LevelReading::measure(&[amplitude_for_db(-40.0); 1024]);
        let quiet = LevelReading::measure(&[amplitude_for_db(-60.0); 1024]);
        assert!((loud.db + 40.0).abs() < 0.01);
        assert!(vad.is_speech(&loud));
        assert!(!vad.is_speech(&quiet));
        assert!(!vad.is_speech(&LevelReading { rms: 0.0, db: -50.0 }));
    }
}
