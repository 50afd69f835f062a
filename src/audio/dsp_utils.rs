// DSP utilities - Sample hygiene for the render path
//
// Everything here runs per sample on the audio thread; nothing allocates.

/// Values below this magnitude are treated as silence
pub const DENORMAL_THRESHOLD: f32 = 1e-15;

/// Replace near-zero values with exact zero
///
/// Exponential tails (releases, filter state, automation approaches) creep
/// towards zero through the denormal range, which is slow on x86 without
/// FTZ/DAZ set.
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < DENORMAL_THRESHOLD { 0.0 } else { x }
}

/// tanh saturation into [-1, 1]
///
/// Accented notes with high resonance overshoot unity; this rounds the peaks
/// off instead of wrapping or hard clipping them.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// First-order smoother for control values read on the audio thread
///
/// Follows its target with an exact exponential response, so the value has
/// covered 63% of a step after `time_constant_ms`.
pub struct OnePoleSmoother {
    value: f32,
    coefficient: f32,
}

impl OnePoleSmoother {
    /// ```
    /// use acidstep::audio::dsp_utils::OnePoleSmoother;
    /// let volume = OnePoleSmoother::new(0.7, 20.0, 48000.0);
    /// assert_eq!(volume.value(), 0.7);
    /// ```
    pub fn new(initial: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        let samples = time_constant_ms * 0.001 * sample_rate;
        let coefficient = if samples.is_finite() && samples > 1.0 {
            1.0 - (-1.0 / samples).exp()
        } else {
            1.0
        };
        Self {
            value: initial,
            coefficient,
        }
    }

    /// Move one sample towards `target` and return the new value
    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.value = flush_denormals_to_zero(self.value + self.coefficient * (target - self.value));
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}
