// Format conversion - Mono voice output to device and file formats
//
// The voice renders mono f32. Output devices want interleaved frames in their
// preferred sample type (F32, I16, U16) and the WAV exporter wants 16-bit PCM.
// All conversions are allocation-free and safe to call from the callback.

use cpal::{FromSample, Sample};

/// Convert f32 sample to i16
///
/// Maps [-1.0, 1.0] to [i16::MIN, i16::MAX], clamping anything outside.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    };

    if clamped >= 0.0 {
        (clamped * i16::MAX as f32) as i16
    } else {
        (clamped * -(i16::MIN as f32)) as i16
    }
}

/// Write one mono sample to every channel of an interleaved frame
///
/// # Arguments
/// * `internal_sample` - The mono f32 sample to write
/// * `output_frame` - One frame of the device buffer (e.g. [L, R] for stereo)
#[inline]
pub fn write_mono_to_interleaved_frame<T>(internal_sample: f32, output_frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    for channel_sample in output_frame.iter_mut() {
        *channel_sample = Sample::from_sample::<f32>(internal_sample);
    }
}
