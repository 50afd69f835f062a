// Audio Export - Offline rendering of a pattern to WAV
//
// The same `Scheduler` that drives real-time playback is driven here by a
// `ManualClock` set to the render position before each block. The voice is
// owned directly (no command queue), and audio is produced as fast as the CPU
// allows.

use std::path::Path;
use std::sync::Arc;

use hound::{WavSpec, WavWriter};
use thiserror::Error;

use super::clock::ManualClock;
use super::format_conversion::f32_to_i16;
use crate::midi::bridge::MidiBridge;
use crate::sequencer::pattern::{Pattern, PatternError, PatternStore, STEP_COUNT};
use crate::sequencer::scheduler::{Scheduler, SchedulerTiming};
use crate::sequencer::transport::{SharedTransport, clamp_tempo, step_duration};
use crate::synth::params::{SharedSynthParams, SynthParams};
use crate::synth::voice::MonoVoice;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("Invalid render settings: {0}")]
    InvalidSettings(String),

    #[error("WAV write failed: {0}")]
    Wav(#[from] hound::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub sample_rate: u32,
    pub tempo: f32,
    /// Number of full passes through the 16 steps
    pub loops: usize,
    /// Extra time rendered after the last step so releases ring out (seconds)
    pub tail: f64,
    /// Frames rendered between scheduler ticks
    pub block_size: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            tempo: 120.0,
            loops: 1,
            tail: 0.5,
            block_size: 256,
        }
    }
}

impl RenderSettings {
    fn validate(&self) -> ExportResult<f32> {
        if self.sample_rate == 0 {
            return Err(ExportError::InvalidSettings("sample rate must be > 0".into()));
        }
        if self.block_size == 0 {
            return Err(ExportError::InvalidSettings("block size must be > 0".into()));
        }
        if !self.tail.is_finite() || self.tail < 0.0 {
            return Err(ExportError::InvalidSettings(format!("tail {}", self.tail)));
        }
        clamp_tempo(self.tempo)
            .ok_or_else(|| ExportError::InvalidSettings(format!("tempo {}", self.tempo)))
    }
}

/// Render `loops` passes of `pattern` into mono f32 samples
pub fn render_pattern(
    pattern: &Pattern,
    params: SynthParams,
    settings: &RenderSettings,
) -> ExportResult<Vec<f32>> {
    let tempo = settings.validate()?;
    let sample_rate = settings.sample_rate as f64;

    let store = PatternStore::new();
    store.replace(*pattern)?;

    let clock = Arc::new(ManualClock::new(0.0));
    let step = step_duration(tempo);
    // At most one step per block, so the step count can stop the scheduler exactly
    let block_size = settings.block_size.min((step * sample_rate) as usize).max(1);
    let block_seconds = block_size as f64 / sample_rate;

    let mut scheduler = Scheduler::new(
        clock.clone(),
        store,
        SharedTransport::new(tempo),
        SharedSynthParams::new(params),
        MonoVoice::new(settings.sample_rate as f32),
        MidiBridge::new(clock.clone(), clock.clone()),
    )
    .with_timing(SchedulerTiming {
        schedule_ahead: block_seconds,
        lead_in: 0.0,
    });

    let total_steps = settings.loops * STEP_COUNT;
    let total_seconds = total_steps as f64 * step + settings.tail;
    let total_frames = (total_seconds * sample_rate).ceil() as usize;

    let mut output = vec![0.0f32; total_frames];
    let mut scheduled = 0;
    let mut position = 0;

    if total_steps > 0 {
        scheduler.start();
    }

    while position < total_frames {
        clock.set(position as f64 / sample_rate);
        if scheduled < total_steps {
            scheduled += scheduler.tick();
        }

        let end = (position + block_size).min(total_frames);
        scheduler.voice_mut().render(&mut output[position..end]);
        position = end;
    }

    log::debug!(
        "Rendered {} steps into {} frames at {} Hz",
        scheduled,
        total_frames,
        settings.sample_rate
    );
    Ok(output)
}

/// Write mono f32 samples as a 16-bit PCM WAV file
pub fn export_wav(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> ExportResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for &sample in samples {
        writer.write_sample(f32_to_i16(sample))?;
    }
    writer.finalize()?;

    log::info!(
        "Exported {:.2}s to {}",
        samples.len() as f64 / sample_rate as f64,
        path.as_ref().display()
    );
    Ok(())
}
