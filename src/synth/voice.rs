// Voice - The single monophonic signal chain
//
// One oscillator -> one resonant low-pass -> one amplifier, alive for the whole
// session. Notes never allocate a new chain: `trigger` rewrites the parameter
// schedules of the existing one, which is what makes the voice strictly
// monophonic and what lets a slide note glide out of the previous note.

use super::automation::AutomatedParam;
use super::filter::StateVariableFilter;
use super::oscillator::{Oscillator, SimpleOscillator, WaveformType};
use super::params::SynthParams;
use super::pitch::{PITCH_COUNT, PITCH_TABLE, note_to_frequency};
use crate::audio::dsp_utils::soft_clip;

// Pitch
pub const SLIDE_TIME: f64 = 0.1;

// Filter envelope
pub const CUTOFF_FLOOR_HZ: f32 = 50.0;
pub const CUTOFF_RANGE_HZ: f32 = 4950.0;
pub const ENV_RANGE_HZ: f32 = 4000.0;
pub const ACCENT_ENV_BOOST: f32 = 1.5;
pub const FILTER_ATTACK: f64 = 0.01;
pub const DECAY_FLOOR: f64 = 0.1;
pub const DECAY_RANGE: f64 = 1.9;
pub const Q_MIN: f32 = 0.707;
pub const Q_MAX: f32 = 18.0;

// Amplifier
pub const AMP_ATTACK: f64 = 0.005;
pub const ACCENT_GAIN_BOOST: f32 = 1.5;
pub const SLIDE_HOLD_TIME_CONSTANT: f64 = 0.005;
pub const RELEASE_POINT: f64 = 0.9;
pub const RELEASE_TIME_CONSTANT: f64 = 0.01;
pub const SLIDE_RELEASE_POINT: f64 = 1.1;
pub const SLIDE_RELEASE_TIME_CONSTANT: f64 = 0.03;
pub const SILENCE_TIME_CONSTANT: f64 = 0.005;

// Live knob movement
pub const PARAM_SMOOTHING_TIME_CONSTANT: f64 = 0.01;

/// Headroom between the summed gain stages and the soft clipper
const OUTPUT_GAIN: f32 = 0.4;

/// Filter cutoff (Hz) with no envelope applied
pub fn base_cutoff(cutoff: f32) -> f32 {
    CUTOFF_FLOOR_HZ + (cutoff / 100.0) * CUTOFF_RANGE_HZ
}

/// Envelope excursion above the base cutoff (Hz)
pub fn env_amount(env_mod: f32, accent: bool) -> f32 {
    let amount = (env_mod / 100.0) * ENV_RANGE_HZ;
    if accent { amount * ACCENT_ENV_BOOST } else { amount }
}

/// Time for the filter envelope to fall back to the base cutoff
pub fn decay_time(decay: f32) -> f64 {
    DECAY_FLOOR + (decay as f64 / 100.0) * DECAY_RANGE
}

pub fn resonance_to_q(resonance: f32) -> f32 {
    Q_MIN + (resonance / 100.0) * (Q_MAX - Q_MIN)
}

/// Sustained amplifier level for a note
pub fn note_level(accent: bool) -> f32 {
    if accent { ACCENT_GAIN_BOOST } else { 1.0 }
}

/// One note event for the voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteTrigger {
    /// Index into the pitch table, must be below `PITCH_COUNT`
    pub pitch_index: usize,
    /// Audio-clock time at which the note starts
    pub at: f64,
    /// Nominal note length (one step)
    pub duration: f64,
    pub slide: bool,
    pub accent: bool,
    pub params: SynthParams,
}

/// State that survives note boundaries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceState {
    pub is_sounding: bool,
    pub current_pitch_hz: f64,
}

impl Default for VoiceState {
    fn default() -> Self {
        Self {
            is_sounding: false,
            current_pitch_hz: note_to_frequency(PITCH_TABLE[0]),
        }
    }
}

/// Anything the scheduler can play notes on
///
/// Implemented by `MonoVoice` itself (offline rendering, tests) and by the
/// command queue that forwards to the voice living in the audio callback.
pub trait VoiceTarget {
    fn trigger(&mut self, note: NoteTrigger);
    /// Continuous knob update, applied smoothly from "now"
    fn update_params(&mut self, params: &SynthParams);
    /// Fade out and forget everything scheduled from `at` on
    fn silence(&mut self, at: f64);
}

pub struct MonoVoice {
    oscillator: SimpleOscillator,
    filter: StateVariableFilter,
    frequency: AutomatedParam,
    cutoff: AutomatedParam,
    q: AutomatedParam,
    gain: AutomatedParam,
    /// Waveform change waiting for its note to start
    pending_waveform: Option<(f64, WaveformType)>,
    state: VoiceState,
    sample_rate: f32,
    frames_rendered: u64,
}

impl MonoVoice {
    pub fn new(sample_rate: f32) -> Self {
        let params = SynthParams::default();
        let state = VoiceState::default();
        Self {
            oscillator: SimpleOscillator::new(params.waveform, sample_rate),
            filter: StateVariableFilter::new(sample_rate),
            frequency: AutomatedParam::new(state.current_pitch_hz as f32),
            cutoff: AutomatedParam::new(base_cutoff(params.cutoff)),
            q: AutomatedParam::new(resonance_to_q(params.resonance)),
            gain: AutomatedParam::new(0.0),
            pending_waveform: None,
            state,
            sample_rate,
            frames_rendered: 0,
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Audio time of the next sample to be rendered
    pub fn time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn waveform(&self) -> WaveformType {
        self.oscillator.waveform()
    }

    /// Last evaluated amplifier gain
    pub fn current_gain(&self) -> f32 {
        self.gain.current()
    }

    /// Last evaluated filter cutoff in Hz
    pub fn current_cutoff(&self) -> f32 {
        self.cutoff.current()
    }

    /// Cutoff the filter ran at for the last sample, after its own clamping
    pub fn filter_cutoff(&self) -> f32 {
        self.filter.effective_cutoff()
    }

    /// Last evaluated oscillator frequency in Hz
    pub fn current_frequency(&self) -> f32 {
        self.frequency.current()
    }

    /// Schedule a note on the chain
    ///
    /// # Panics
    /// If `note.pitch_index` is outside the pitch table. Callers validate steps
    /// before they reach the voice; an invalid index here is a programming error.
    pub fn trigger(&mut self, note: NoteTrigger) {
        assert!(
            note.pitch_index < PITCH_COUNT,
            "pitch index {} outside pitch table",
            note.pitch_index
        );
        let at = note.at;
        let params = note.params.clamped();
        let target_hz = note_to_frequency(PITCH_TABLE[note.pitch_index]);
        let gliding = note.slide && self.state.is_sounding;

        // Pitch. A glide still running at `at` is cut where it is and the
        // new one starts from there.
        if gliding {
            self.frequency.cancel_and_hold_at_time(at);
            self.frequency
                .exponential_ramp_to(target_hz as f32, at + SLIDE_TIME);
        } else {
            self.frequency.cancel_scheduled_values(at);
            self.frequency.set_value_at(target_hz as f32, at);
            self.pending_waveform = Some((at, params.waveform));
        }

        // Filter envelope, restarted from the base cutoff
        let base = base_cutoff(params.cutoff);
        let peak = base + env_amount(params.env_mod, note.accent);
        self.cutoff.cancel_and_hold_at_time(at);
        self.cutoff.set_value_at(base, at);
        self.cutoff.linear_ramp_to(peak, at + FILTER_ATTACK);
        self.cutoff
            .exponential_ramp_to(base, at + FILTER_ATTACK + decay_time(params.decay));

        self.q.cancel_scheduled_values(at);
        self.q.set_value_at(resonance_to_q(params.resonance), at);

        // Amplifier
        let level = note_level(note.accent);
        self.gain.cancel_scheduled_values(at);
        if note.slide {
            // Legato: no attack, settle on the sustain level from wherever the gain is
            self.gain.set_target_at(level, at, SLIDE_HOLD_TIME_CONSTANT);
            self.gain.set_target_at(
                0.0,
                at + note.duration * SLIDE_RELEASE_POINT,
                SLIDE_RELEASE_TIME_CONSTANT,
            );
        } else {
            self.gain.set_value_at(0.0, at);
            self.gain.linear_ramp_to(level, at + AMP_ATTACK);
            self.gain.set_target_at(
                0.0,
                at + note.duration * RELEASE_POINT,
                RELEASE_TIME_CONSTANT,
            );
        }

        self.state = VoiceState {
            is_sounding: true,
            current_pitch_hz: target_hz,
        };
    }

    /// Smoothly move cutoff and Q to new knob values, switch waveform at once
    pub fn update_params(&mut self, params: &SynthParams) {
        let params = params.clamped();
        let now = self.time();
        self.cutoff
            .set_target_at(base_cutoff(params.cutoff), now, PARAM_SMOOTHING_TIME_CONSTANT);
        self.q
            .set_target_at(resonance_to_q(params.resonance), now, PARAM_SMOOTHING_TIME_CONSTANT);
        self.oscillator.set_waveform(params.waveform);
        self.pending_waveform = None;
    }

    /// Cancel everything from `at`, fade the amplifier out, forget the last note
    pub fn silence(&mut self, at: f64) {
        let at = at.max(self.time());
        self.frequency.cancel_scheduled_values(at);
        self.cutoff.cancel_scheduled_values(at);
        self.q.cancel_scheduled_values(at);
        self.gain.cancel_scheduled_values(at);
        self.gain.set_target_at(0.0, at, SILENCE_TIME_CONSTANT);
        self.pending_waveform = None;
        self.state.is_sounding = false;
    }

    pub fn next_sample(&mut self) -> f32 {
        let t = self.time();
        self.frames_rendered += 1;

        if let Some((when, waveform)) = self.pending_waveform {
            if when <= t {
                self.oscillator.set_waveform(waveform);
                self.pending_waveform = None;
            }
        }

        let frequency = self.frequency.value_at(t);
        let cutoff = self.cutoff.value_at(t);
        let q = self.q.value_at(t);
        let gain = self.gain.value_at(t);

        self.oscillator.set_frequency(frequency);
        let raw = self.oscillator.next_sample();
        let filtered = self.filter.process(raw, cutoff, q);

        soft_clip(filtered * gain * OUTPUT_GAIN)
    }

    /// Render consecutive samples into `output`
    pub fn render(&mut self, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

impl VoiceTarget for MonoVoice {
    fn trigger(&mut self, note: NoteTrigger) {
        MonoVoice::trigger(self, note);
    }

    fn update_params(&mut self, params: &SynthParams) {
        MonoVoice::update_params(self, params);
    }

    fn silence(&mut self, at: f64) {
        MonoVoice::silence(self, at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48000.0;

    fn note(pitch_index: usize, at: f64, slide: bool, accent: bool) -> NoteTrigger {
        NoteTrigger {
            pitch_index,
            at,
            duration: 0.125,
            slide,
            accent,
            params: SynthParams::default(),
        }
    }

    /// Render until audio time `t`, returning per-sample gains
    fn run_until(voice: &mut MonoVoice, t: f64) -> Vec<f32> {
        let mut gains = Vec::new();
        while voice.time() < t {
            voice.next_sample();
            gains.push(voice.current_gain());
        }
        gains
    }

    #[test]
    fn test_voice_starts_silent() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        assert!(!voice.state().is_sounding);
        for _ in 0..1000 {
            assert_eq!(voice.next_sample(), 0.0);
        }
    }

    #[test]
    fn test_trigger_updates_state() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        voice.trigger(note(9, 0.0, false, false));

        let state = voice.state();
        assert!(state.is_sounding);
        assert!((state.current_pitch_hz - note_to_frequency(45)).abs() < 1e-9);
    }

    #[test]
    fn test_attack_reaches_level() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        voice.trigger(note(0, 0.01, false, false));

        run_until(&mut voice, 0.01 + AMP_ATTACK + 0.001);
        assert!((voice.current_gain() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_slide_jumps_pitch() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        voice.trigger(note(0, 0.0, false, false));
        voice.trigger(note(12, 0.125, false, false));

        run_until(&mut voice, 0.126);
        let expected = note_to_frequency(48) as f32;
        assert!((voice.current_frequency() - expected).abs() < 0.01);
    }

    #[test]
    fn test_slide_glides_pitch() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        voice.trigger(note(0, 0.0, false, false));
        voice.trigger(note(12, 0.125, true, false));

        let start = note_to_frequency(36) as f32;
        let end = note_to_frequency(48) as f32;

        run_until(&mut voice, 0.125 + SLIDE_TIME / 2.0);
        let mid = voice.current_frequency();
        assert!(mid > start && mid < end, "mid-glide frequency {}", mid);
        // Exponential glide: halfway in time is the geometric mean
        assert!((mid - (start * end).sqrt()).abs() < 1.0);

        run_until(&mut voice, 0.125 + SLIDE_TIME + 0.001);
        assert!((voice.current_frequency() - end).abs() < 0.01);
    }

    #[test]
    fn test_slide_from_silence_does_not_glide() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        voice.trigger(note(12, 0.0, true, false));

        run_until(&mut voice, 0.001);
        let expected = note_to_frequency(48) as f32;
        assert!((voice.current_frequency() - expected).abs() < 0.01);
    }

    #[test]
    fn test_filter_envelope_shape() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        let params = SynthParams::default();
        voice.trigger(note(0, 0.0, false, false));

        let base = base_cutoff(params.cutoff);
        let peak = base + env_amount(params.env_mod, false);

        run_until(&mut voice, 0.0001);
        assert!((voice.current_cutoff() - base).abs() < 100.0);

        run_until(&mut voice, FILTER_ATTACK + 0.0001);
        assert!((voice.current_cutoff() - peak).abs() < 10.0);

        run_until(&mut voice, FILTER_ATTACK + decay_time(params.decay) + 0.001);
        assert!((voice.current_cutoff() - base).abs() < 1.0);
    }

    #[test]
    fn test_silence_fades_and_resets_state() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        let mut slide = note(0, 0.0, true, false);
        slide.duration = 10.0;
        voice.trigger(slide);
        run_until(&mut voice, 0.05);
        assert!(voice.current_gain() > 0.5);

        voice.silence(0.05);
        assert!(!voice.state().is_sounding);
        run_until(&mut voice, 0.1);
        assert!(voice.current_gain() < 1e-3);
    }

    #[test]
    fn test_update_params_moves_cutoff_smoothly() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        run_until(&mut voice, 0.01);
        let before = voice.current_cutoff();

        let mut params = SynthParams::default();
        params.cutoff = 100.0;
        params.waveform = WaveformType::Square;
        voice.update_params(&params);
        assert_eq!(voice.waveform(), WaveformType::Square);

        voice.next_sample();
        let first = voice.current_cutoff();
        assert!(first < base_cutoff(100.0), "no hard jump");
        run_until(&mut voice, 0.2);
        assert!(voice.current_cutoff() > before);
        assert!((voice.current_cutoff() - base_cutoff(100.0)).abs() < 1.0);
    }

    #[test]
    fn test_waveform_applied_at_note_start() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        let mut n = note(0, 0.05, false, false);
        n.params.waveform = WaveformType::Square;
        voice.trigger(n);

        run_until(&mut voice, 0.04);
        assert_eq!(voice.waveform(), WaveformType::Saw);
        run_until(&mut voice, 0.051);
        assert_eq!(voice.waveform(), WaveformType::Square);
    }

    #[test]
    #[should_panic(expected = "outside pitch table")]
    fn test_invalid_pitch_index_panics() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        voice.trigger(note(PITCH_COUNT, 0.0, false, false));
    }

    #[test]
    fn test_output_is_bounded() {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        let mut n = note(0, 0.0, false, true);
        n.params.resonance = 100.0;
        n.params.env_mod = 100.0;
        voice.trigger(n);
        let mut buffer = vec![0.0f32; 4800];
        voice.render(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        assert!(buffer.iter().any(|s| s.abs() > 0.01));
    }
}
