// Audio engine - Real-time cpal callback hosting the voice
//
// # Format Support
//
// The engine accepts the device's preferred sample format:
// - **F32**: native, no conversion
// - **I16**: common on Windows/WASAPI
// - **U16**: rare
//
// The voice always renders f32; conversion to the device type happens while
// writing the interleaved frame, without allocation.
//
// # Timing
//
// The callback owns the voice and advances the shared `SampleClock` by the
// number of frames it rendered. The scheduler reads that clock, so audio time
// is exactly "frames played so far / sample rate" on both sides.
//
// # Stream Limitations
//
// On macOS (CoreAudio) the `Stream` is not Send, so the engine must stay on the
// thread that created it.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};

use super::clock::SampleClock;
use super::device::AudioDeviceManager;
use super::dsp_utils::{OnePoleSmoother, flush_denormals_to_zero};
use super::format_conversion::write_mono_to_interleaved_frame;
use super::parameters::AtomicF32;
use super::{AudioError, AudioResult};
use crate::connection::status::OutputHealth;
use crate::messaging::channels::{CommandConsumer, drain_commands};
use crate::synth::voice::MonoVoice;

/// Master volume smoothing (ms)
const VOLUME_SMOOTHING_MS: f32 = 10.0;

/// State moved into the callback
struct CallbackState {
    voice: MonoVoice,
    commands: CommandConsumer,
    volume: AtomicF32,
    smoother: OnePoleSmoother,
    clock: SampleClock,
    channels: usize,
}

impl CallbackState {
    fn render<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        // ========== SACRED ZONE ==========
        // No allocations, no I/O, no blocking locks
        drain_commands(&mut self.commands, &mut self.voice);

        let mut frames = 0;
        for frame in data.chunks_mut(self.channels) {
            let gain = self.smoother.process(self.volume.get());
            let sample = flush_denormals_to_zero(self.voice.next_sample()) * gain;
            write_mono_to_interleaved_frame(sample, frame);
            frames += 1;
        }

        self.clock.advance(frames);
        // ========== SACRED ZONE END ==========
    }
}

pub struct AudioEngine {
    _stream: Stream,
    device_name: String,
    sample_rate: f32,
    channels: usize,
    clock: SampleClock,
    volume: AtomicF32,
    health: OutputHealth,
}

impl AudioEngine {
    /// Open the output device and start rendering
    ///
    /// `device_name` of `None` selects the host default.
    pub fn new(
        device_name: Option<&str>,
        commands: CommandConsumer,
        master_volume: f32,
    ) -> AudioResult<Self> {
        let device = AudioDeviceManager::new().output_device(device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Audio device: {}", name);

        let supported_config = device.default_output_config()?;
        let sample_format = supported_config.sample_format();
        log::debug!("Audio config: {:?}", supported_config);

        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        let master_volume = master_volume.clamp(0.0, 1.0);
        let volume = AtomicF32::new(master_volume);
        let clock = SampleClock::new(sample_rate);
        let health = OutputHealth::new();

        let state = CallbackState {
            voice: MonoVoice::new(sample_rate),
            commands,
            volume: volume.clone(),
            smoother: OnePoleSmoother::new(master_volume, VOLUME_SMOOTHING_MS, sample_rate),
            clock: clock.clone(),
            channels,
        };

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, state, health.clone()),
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, state, health.clone()),
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, state, health.clone()),
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        stream.play()?;
        health.mark_running();
        log::info!(
            "Audio engine started: {} Hz, {} channels, {:?}",
            sample_rate,
            channels,
            sample_format
        );

        Ok(Self {
            _stream: stream,
            device_name: name,
            sample_rate,
            channels,
            clock,
            volume,
            health,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Audio clock advanced by the callback
    pub fn clock(&self) -> SampleClock {
        self.clock.clone()
    }

    /// Stream state and error count, updated by the error callback
    pub fn health(&self) -> &OutputHealth {
        &self.health
    }

    /// Set master volume (0..1), smoothed in the callback
    pub fn set_volume(&self, volume: f32) {
        if volume.is_finite() {
            self.volume.set(volume.clamp(0.0, 1.0));
        }
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut state: CallbackState,
        health: OutputHealth,
    ) -> AudioResult<Stream>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| state.render(data),
            move |err| {
                // Runs outside the audio callback, I/O is fine here
                log::error!("Audio stream error: {}", err);
                health.mark_fault();
            },
            None,
        )?;
        Ok(stream)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.health.mark_closed();
        log::debug!("Audio engine on '{}' closed", self.device_name);
    }
}
