//! Monophonic voice behaviour tests
//!
//! Renders the voice sample by sample and inspects its automated gain, cutoff
//! and frequency to check slides, accents and the silence path.

use acidstep::synth::pitch::{PITCH_TABLE, note_to_frequency};
use acidstep::synth::voice::{base_cutoff, decay_time, env_amount};
use acidstep::{MonoVoice, NoteTrigger, SynthParams, WaveformType};

const SAMPLE_RATE: f32 = 48000.0;
const STEP: f64 = 0.125;

fn note(pitch_index: usize, at: f64, slide: bool, accent: bool) -> NoteTrigger {
    NoteTrigger {
        pitch_index,
        at,
        duration: STEP,
        slide,
        accent,
        params: SynthParams::default(),
    }
}

fn frames(seconds: f64) -> usize {
    (seconds * SAMPLE_RATE as f64).round() as usize
}

/// Per-sample (gain, cutoff, frequency) trace
fn trace(voice: &mut MonoVoice, count: usize) -> Vec<(f32, f32, f32)> {
    (0..count)
        .map(|_| {
            let sample = voice.next_sample();
            assert!(sample.is_finite());
            (
                voice.current_gain(),
                voice.current_cutoff(),
                voice.current_frequency(),
            )
        })
        .collect()
}

fn max_gain_jump(trace: &[(f32, f32, f32)]) -> f32 {
    trace
        .windows(2)
        .map(|w| (w[1].0 - w[0].0).abs())
        .fold(0.0, f32::max)
}

/// A slid note keeps the amplifier open and glides the pitch
#[test]
fn test_slide_is_legato() {
    let mut voice = MonoVoice::new(SAMPLE_RATE);
    voice.trigger(note(0, 0.0, false, false));
    voice.trigger(note(3, STEP, true, false));

    let samples = trace(&mut voice, frames(0.3));
    let boundary = frames(STEP);

    // Gain never drops to zero across the boundary
    let around = &samples[boundary - frames(0.01)..boundary + frames(0.1)];
    let min_gain = around.iter().map(|s| s.0).fold(f32::MAX, f32::min);
    assert!(min_gain > 0.2, "gain fell to {}", min_gain);
    assert!(max_gain_jump(&samples[frames(0.01)..]) < 0.01);

    // Pitch starts from the previous note and reaches the new one after the glide
    let from = note_to_frequency(PITCH_TABLE[0]) as f32;
    let to = note_to_frequency(PITCH_TABLE[3]) as f32;
    assert!((samples[boundary].2 - from).abs() < 0.01);
    let mid = samples[boundary + frames(0.05)].2;
    assert!(mid > from + 0.5 && mid < to - 0.5, "mid-glide {}", mid);
    assert!((samples[boundary + frames(0.11)].2 - to).abs() < 0.01);
}

/// Without slide the next note re-attacks from silence and jumps in pitch
#[test]
fn test_non_slide_retriggers() {
    let mut voice = MonoVoice::new(SAMPLE_RATE);
    voice.trigger(note(0, 0.0, false, false));
    voice.trigger(note(3, STEP, false, false));

    let samples = trace(&mut voice, frames(0.2));
    let boundary = frames(STEP);

    assert!(samples[boundary - 1].0 > 0.2);
    assert_eq!(samples[boundary].0, 0.0);
    assert!(max_gain_jump(&samples[boundary - 2..boundary + 2]) > 0.2);
    assert!(samples[boundary + frames(0.006)].0 > 0.99);

    let to = note_to_frequency(PITCH_TABLE[3]) as f32;
    assert!((samples[boundary].2 - to).abs() < 0.01);
}

/// Accent deepens the filter sweep and raises the level by at least half
#[test]
fn test_accent_boosts_envelope_and_gain() {
    let peak = |accent: bool| {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        voice.trigger(note(0, 0.0, false, accent));
        let samples = trace(&mut voice, frames(0.05));
        let gain = samples.iter().map(|s| s.0).fold(0.0, f32::max);
        let cutoff = samples.iter().map(|s| s.1).fold(0.0, f32::max);
        (gain, cutoff)
    };

    let base = base_cutoff(SynthParams::default().cutoff);
    let (plain_gain, plain_cutoff) = peak(false);
    let (accent_gain, accent_cutoff) = peak(true);

    let excursion_ratio = (accent_cutoff - base) / (plain_cutoff - base);
    assert!(excursion_ratio >= 1.49, "excursion ratio {}", excursion_ratio);
    assert!(accent_gain >= 1.49 * plain_gain, "{} vs {}", accent_gain, plain_gain);
}

/// Longer decay keeps the cutoff open longer
#[test]
fn test_decay_lengthens_filter_sweep() {
    let cutoff_at = |decay: f32, t: f64| {
        let mut voice = MonoVoice::new(SAMPLE_RATE);
        let mut trigger = note(0, 0.0, false, false);
        trigger.params.decay = decay;
        voice.trigger(trigger);
        trace(&mut voice, frames(t)).last().map(|s| s.1).unwrap()
    };

    let short = cutoff_at(0.0, 0.08);
    let long = cutoff_at(100.0, 0.08);
    assert!(long > short + 100.0, "long {} short {}", long, short);

    // After its decay the short envelope is back at the base cutoff
    let settled = cutoff_at(0.0, decay_time(0.0) + 0.05);
    assert!((settled - base_cutoff(50.0)).abs() < 1.0);
}

/// Silence fades out and forgets the last pitch, so a slide cannot glide from it
#[test]
fn test_silence_breaks_legato() {
    let mut voice = MonoVoice::new(SAMPLE_RATE);
    voice.trigger(note(0, 0.0, false, false));
    voice.silence(0.05);
    assert!(!voice.state().is_sounding);

    voice.trigger(note(5, 0.2, true, false));
    let samples = trace(&mut voice, frames(0.25));

    assert!(samples[frames(0.15)].0 < 0.01);
    let target = note_to_frequency(PITCH_TABLE[5]) as f32;
    assert!((samples[frames(0.2)].2 - target).abs() < 0.01);
}

/// Knob moves between notes are smoothed, not stepped
#[test]
fn test_param_update_is_smoothed() {
    let mut voice = MonoVoice::new(SAMPLE_RATE);
    let mut trigger = note(0, 0.0, false, false);
    trigger.params.decay = 0.0;
    voice.trigger(trigger);
    trace(&mut voice, frames(0.2));

    let mut params = SynthParams::default();
    params.cutoff = 100.0;
    params.waveform = WaveformType::Square;
    voice.update_params(&params);
    assert_eq!(voice.waveform(), WaveformType::Square);

    let samples = trace(&mut voice, frames(0.1));
    assert!(samples[0].1 < base_cutoff(50.0) + 100.0);
    assert!((samples[samples.len() - 1].1 - base_cutoff(100.0)).abs() < 1.0);
}

/// Waveform changes carried by a note switch the oscillator when it starts
#[test]
fn test_waveform_switches_on_note_start() {
    let mut voice = MonoVoice::new(SAMPLE_RATE);
    let mut trigger = note(0, 0.1, false, false);
    trigger.params.waveform = WaveformType::Square;
    voice.trigger(trigger);

    trace(&mut voice, frames(0.05));
    assert_eq!(voice.waveform(), WaveformType::Saw);
    trace(&mut voice, frames(0.1));
    assert_eq!(voice.waveform(), WaveformType::Square);
}

/// At 300 BPM each glide is still running when the next slide starts; the
/// pitch keeps moving continuously from wherever the previous glide got to
#[test]
fn test_consecutive_slides_at_fastest_tempo() {
    let step = 15.0 / 300.0;
    let fast = |pitch_index: usize, index: usize, slide: bool| NoteTrigger {
        duration: step,
        ..note(pitch_index, index as f64 * step, slide, false)
    };

    let mut voice = MonoVoice::new(SAMPLE_RATE);
    voice.trigger(fast(0, 0, false));
    voice.trigger(fast(12, 1, true));
    voice.trigger(fast(0, 2, true));
    voice.trigger(fast(7, 3, true));

    let samples = trace(&mut voice, frames(0.3));
    let low = note_to_frequency(PITCH_TABLE[0]) as f32;
    let high = note_to_frequency(PITCH_TABLE[12]) as f32;

    let max_jump = samples
        .windows(2)
        .map(|w| (w[1].2 - w[0].2).abs())
        .fold(0.0, f32::max);
    assert!(max_jump < 0.1, "pitch jumped by {} Hz", max_jump);

    // Halfway up the octave (in time) when the second slide takes over
    let turn = samples[frames(2.0 * step) - 1].2;
    assert!(turn > low + 1.0 && turn < high - 1.0, "pitch at turn {}", turn);
    assert!((turn - (low * high).sqrt()).abs() < 1.0);

    // Rising into the turn, falling after it
    let rising = &samples[frames(step) + 1..frames(2.0 * step)];
    assert!(rising.windows(2).all(|w| w[1].2 >= w[0].2));
    let falling = &samples[frames(2.0 * step) + 1..frames(3.0 * step)];
    assert!(falling.windows(2).all(|w| w[1].2 <= w[0].2));
    assert!(samples[frames(3.0 * step) - 1].2 > low);

    // The last glide completes on its own target
    let last = note_to_frequency(PITCH_TABLE[7]) as f32;
    assert!((samples[frames(0.29)].2 - last).abs() < 0.01);
}

/// A retrigger cuts the running filter decay instead of dropping it
#[test]
fn test_filter_decays_between_fast_notes() {
    let step = 15.0 / 300.0;
    let mut params = SynthParams::default();
    params.decay = 0.0;
    params.env_mod = 100.0;

    let mut voice = MonoVoice::new(SAMPLE_RATE);
    for i in 0..2 {
        voice.trigger(NoteTrigger {
            duration: step,
            params,
            ..note(0, i as f64 * step, false, false)
        });
    }

    let samples = trace(&mut voice, frames(2.0 * step));
    let peak = base_cutoff(params.cutoff) + env_amount(params.env_mod, false);
    let before_retrigger = samples[frames(step) - 1].1;
    assert!(
        before_retrigger < peak - 500.0,
        "cutoff stuck at {} before the next note",
        before_retrigger
    );
    assert!(before_retrigger > base_cutoff(params.cutoff));
    assert!((samples[frames(step)].1 - base_cutoff(params.cutoff)).abs() < 1.0);
}

/// The accent excursion survives the filter's own cutoff limit, at both
/// common sample rates and with every knob at the top
#[test]
fn test_accent_excursion_at_the_filter() {
    for sample_rate in [44100.0f32, 48000.0] {
        for (cutoff, env_mod) in [(50.0, 100.0), (100.0, 100.0)] {
            let peak = |accent: bool| {
                let mut voice = MonoVoice::new(sample_rate);
                let mut trigger = note(0, 0.0, false, accent);
                trigger.params.cutoff = cutoff;
                trigger.params.env_mod = env_mod;
                voice.trigger(trigger);
                (0..(sample_rate * 0.05) as usize)
                    .map(|_| {
                        voice.next_sample();
                        voice.filter_cutoff()
                    })
                    .fold(0.0, f32::max)
            };

            let base = base_cutoff(cutoff);
            let ratio = (peak(true) - base) / (peak(false) - base);
            assert!(
                ratio >= 1.49,
                "{} Hz, cutoff {}: filter excursion ratio {}",
                sample_rate,
                cutoff,
                ratio
            );
        }
    }
}
