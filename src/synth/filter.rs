// Filter - Resonant low-pass State Variable Filter (Chamberlin)
//
// 2-pole digital SVF. Only the low-pass output is used by the voice; cutoff and
// Q come from the voice's automated parameters every sample, so the filter
// itself keeps no smoothing state.
//
// References:
// - Hal Chamberlin's "Musical Applications of Microprocessors" (1985)
// - https://www.earlevel.com/main/2003/03/02/the-digital-state-variable-filter/
//
// Characteristics:
// - 12dB/octave slope
// - Runs twice per input sample; the structure is stable up to a sixth of the
//   internal rate, so usable cutoff reaches Fs/3 (16kHz @ 48kHz)

use std::f32::consts::PI;

use crate::audio::dsp_utils::flush_denormals_to_zero;

pub const MIN_CUTOFF_HZ: f32 = 20.0;
/// Keeps `f^2 + 2fq < 4` at the highest cutoff, where `f = 1`
pub const MIN_Q: f32 = 0.707;
pub const MAX_Q: f32 = 20.0;

/// Internal iterations per input sample
const OVERSAMPLING: usize = 2;

pub struct StateVariableFilter {
    sample_rate: f32,

    // State variables
    low: f32,
    band: f32,

    // Coefficients, cached for the last cutoff/Q pair
    f: f32,
    q: f32,
    last_cutoff: f32,
    last_resonance: f32,
    /// Cutoff actually in use after clamping
    effective_cutoff: f32,
}

impl StateVariableFilter {
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            sample_rate,
            low: 0.0,
            band: 0.0,
            f: 0.0,
            q: 0.0,
            last_cutoff: f32::NAN,
            last_resonance: f32::NAN,
            effective_cutoff: MIN_CUTOFF_HZ,
        };
        filter.update_coefficients(1000.0, 0.707);
        filter
    }

    /// Highest usable cutoff for this sample rate
    pub fn max_cutoff(&self) -> f32 {
        self.sample_rate * OVERSAMPLING as f32 / 6.0
    }

    /// Cutoff (Hz) the last `process` call filtered with
    pub fn effective_cutoff(&self) -> f32 {
        self.effective_cutoff
    }

    /// - `f = 2 * sin(pi * fc / (Fs * OVERSAMPLING))`
    /// - `q = 1 / Q`
    fn update_coefficients(&mut self, cutoff: f32, resonance: f32) {
        if cutoff == self.last_cutoff && resonance == self.last_resonance {
            return;
        }
        self.last_cutoff = cutoff;
        self.last_resonance = resonance;

        self.effective_cutoff = if cutoff.is_finite() {
            cutoff.clamp(MIN_CUTOFF_HZ, self.max_cutoff())
        } else {
            MIN_CUTOFF_HZ
        };
        let internal_rate = self.sample_rate * OVERSAMPLING as f32;
        self.f = 2.0 * (PI * self.effective_cutoff / internal_rate).sin();

        let q_factor = if resonance.is_finite() {
            resonance.clamp(MIN_Q, MAX_Q)
        } else {
            MIN_Q
        };
        self.q = (1.0 / q_factor).clamp(0.01, 2.0);
    }

    /// Filter one sample with the given cutoff (Hz) and Q
    #[inline]
    pub fn process(&mut self, input: f32, cutoff: f32, resonance: f32) -> f32 {
        self.update_coefficients(cutoff, resonance);

        for _ in 0..OVERSAMPLING {
            let high = input - self.low - self.q * self.band;
            self.band = flush_denormals_to_zero(self.band + self.f * high);
            self.low = flush_denormals_to_zero(self.low + self.f * self.band);
        }

        self.low
    }
}
