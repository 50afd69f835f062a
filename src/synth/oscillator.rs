// Oscillator - Saw and square sources for the voice

use serde::{Deserialize, Serialize};

pub trait Oscillator {
    fn next_sample(&mut self) -> f32;
    fn set_frequency(&mut self, freq: f32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaveformType {
    #[default]
    Saw,
    Square,
}

/// PolyBLEP residual, smooths the discontinuity of a naive waveform
#[inline]
fn poly_blep(phase: f32, increment: f32) -> f32 {
    if increment <= 0.0 {
        return 0.0;
    }
    if phase < increment {
        let t = phase / increment;
        t + t - t * t - 1.0
    } else if phase > 1.0 - increment {
        let t = (phase - 1.0) / increment;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

pub struct SimpleOscillator {
    waveform: WaveformType,
    phase: f32,
    phase_increment: f32,
    sample_rate: f32,
}

impl SimpleOscillator {
    pub fn new(waveform: WaveformType, sample_rate: f32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            phase_increment: 0.0,
            sample_rate,
        }
    }

    /// Change the waveform without resetting the phase
    pub fn set_waveform(&mut self, waveform: WaveformType) {
        self.waveform = waveform;
    }

    pub fn waveform(&self) -> WaveformType {
        self.waveform
    }
}

impl Oscillator for SimpleOscillator {
    fn next_sample(&mut self) -> f32 {
        let dt = self.phase_increment;
        let sample = match self.waveform {
            WaveformType::Saw => (self.phase * 2.0 - 1.0) - poly_blep(self.phase, dt),
            WaveformType::Square => {
                let naive = if self.phase < 0.5 { 1.0 } else { -1.0 };
                let mut shifted = self.phase + 0.5;
                if shifted >= 1.0 {
                    shifted -= 1.0;
                }
                naive + poly_blep(self.phase, dt) - poly_blep(shifted, dt)
            }
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        sample
    }

    fn set_frequency(&mut self, freq: f32) {
        let increment = freq / self.sample_rate;
        // Keep the phase accumulator usable for non-finite or out-of-range input
        self.phase_increment = if increment.is_finite() {
            increment.clamp(0.0, 0.5)
        } else {
            0.0
        };
    }
}
