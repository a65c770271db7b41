//! Visual status indicator consumed by the render loop

use serde::Serialize;

/// Indicator colours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorColor {
    Recording,
    Playing,
    Idle,
}

impl IndicatorColor {
    /// 0xRRGGBB
    pub fn hex(self) -> u32 {
        match self {
            IndicatorColor::Recording => 0xff0000,
            IndicatorColor::Playing => 0x0000ff,
            IndicatorColor::Idle => 0x00ff00,
        }
    }
}

const PULSE_STEP: f32 = 0.05;
const PULSE_MAX: f32 = 1.2;
const PULSE_MIN: f32 = 0.8;

/// A small disc placed relative to the camera
#[derive(Debug, Clone, Serialize)]
pub struct StatusIndicator {
    pub visible: bool,
    pub color: IndicatorColor,
    pub scale: f32,
    direction: f32,
    /// Camera-relative position
    pub position: [f32; 3],
    pub radius: f32,
    pub opacity: f32,
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self {
            visible: false,
            color: IndicatorColor::Recording,
            scale: 1.0,
            direction: 1.0,
            position: [0.2, 0.2, -0.5],
            radius: 0.05,
            opacity: 0.8,
        }
    }
}

impl StatusIndicator {
    pub fn show_recording(&mut self) {
        self.visible = true;
        self.color = IndicatorColor::Recording;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn set_color(&mut self, color: IndicatorColor) {
        self.color = color;
    }

    /// Advance the pulse one frame, reversing at either bound
    pub fn pulse(&mut self) {
        self.scale += PULSE_STEP * self.direction;
        if self.scale > PULSE_MAX {
            self.direction = -1.0;
        }
        if self.scale < PULSE_MIN {
            self.direction = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_stays_near_bounds() {
        let mut indicator = StatusIndicator::default();
        let mut max_seen = f32::MIN;
        let mut min_seen = f32::MAX;
        for _ in 0..200 {
            indicator.pulse();
            max_seen = max_seen.max(indicator.scale);
            min_seen = min_seen.min(indicator.scale);
        }
        assert!(max_seen > 1.2 && max_seen < 1.2 + PULSE_STEP + 1e-4);
        assert!(min_seen < 0.8 && min_seen > 0.8 - PULSE_STEP - 1e-4);
    }

    #[test]
    fn test_pulse_reverses_direction() {
        let mut indicator = StatusIndicator::default();
        for _ in 0..5 {
            indicator.pulse();
        }
        let peak = indicator.scale;
        indicator.pulse();
        assert!(indicator.scale < peak);
    }

    #[test]
    fn test_colors() {
        assert_eq!(IndicatorColor::Playing.hex(), 0x0000ff);
        assert_eq!(IndicatorColor::Idle.hex(), 0x00ff00);
    }
}
