//! Sine tones with a linear gain envelope

use std::f32::consts::TAU;
use std::time::Duration;

/// A single beep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration: Duration,
    /// Peak gain, 0..1
    pub gain: f32,
    /// Ramp up from silence
    pub attack: Duration,
    /// Ramp down to silence at the end
    pub release: Duration,
}

impl Tone {
    /// Gain applied at `t` into the tone
    pub fn envelope(&self, t: Duration) -> f32 {
        if t >= self.duration {
            return 0.0;
        }
        let mut level = self.gain;
        if !self.attack.is_zero() && t < self.attack {
            level *= t.as_secs_f32() / self.attack.as_secs_f32();
        }
        let remaining = self.duration - t;
        if !self.release.is_zero() && remaining < self.release {
            level *= remaining.as_secs_f32() / self.release.as_secs_f32();
        }
        level
    }

    /// Render mono samples at `sample_rate`
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let count = (self.duration.as_secs_f64() * sample_rate as f64).round() as usize;
        let rate = sample_rate as f32;
        (0..count)
            .map(|i| {
                let secs = i as f32 / rate;
                let env = self.envelope(Duration::from_secs_f32(secs));
                env * (TAU * self.frequency_hz * secs).sin()
            })
            .collect()
    }
}
