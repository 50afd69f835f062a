//! Scheduler timing tests
//!
//! Drives the lookahead scheduler with a manual audio clock and irregular
//! tick intervals, and checks that trigger times stay on the tempo grid.

use std::sync::Arc;

use acidstep::synth::params::SynthParams;
use acidstep::{
    ManualClock, MidiBridge, NoteTrigger, PatternStore, Scheduler, SharedSynthParams,
    SharedTransport, StepUpdate, VoiceTarget,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Default)]
struct RecordingVoice {
    triggers: Vec<NoteTrigger>,
    silenced: Vec<f64>,
}

impl VoiceTarget for RecordingVoice {
    fn trigger(&mut self, note: NoteTrigger) {
        self.triggers.push(note);
    }

    fn update_params(&mut self, _params: &SynthParams) {}

    fn silence(&mut self, at: f64) {
        self.silenced.push(at);
    }
}

fn scheduler(clock: &Arc<ManualClock>, pattern: PatternStore, bpm: f32) -> Scheduler<RecordingVoice> {
    Scheduler::new(
        clock.clone(),
        pattern,
        SharedTransport::new(bpm),
        SharedSynthParams::default(),
        RecordingVoice::default(),
        MidiBridge::new(clock.clone(), clock.clone()),
    )
}

fn all_steps_active() -> PatternStore {
    let store = PatternStore::new();
    for i in 0..16 {
        store
            .set_step(i, StepUpdate::new().active(true).pitch(i % 13))
            .unwrap();
    }
    store
}

/// Tick until `count` triggers exist, with intervals of 25 ms +/- 10 ms
fn run_jittered(
    clock: &ManualClock,
    scheduler: &mut Scheduler<RecordingVoice>,
    rng: &mut StdRng,
    count: usize,
) {
    while scheduler.voice().triggers.len() < count {
        scheduler.tick();
        clock.advance(rng.gen_range(0.015..0.035));
    }
}

/// Consecutive triggers are exactly one sixteenth note apart at every tempo
#[test]
fn test_trigger_spacing_follows_tempo() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for bpm in [20.0f32, 60.0, 120.0, 175.0, 300.0] {
        let clock = Arc::new(ManualClock::new(0.0));
        let mut sched = scheduler(&clock, all_steps_active(), bpm);
        assert!(sched.start());
        run_jittered(&clock, &mut sched, &mut rng, 40);

        let expected = 15.0 / bpm as f64;
        let triggers = &sched.voice().triggers;
        for pair in triggers.windows(2) {
            let delta = pair[1].at - pair[0].at;
            assert!(
                (delta - expected).abs() < 1e-9,
                "{} BPM: delta {} expected {}",
                bpm,
                delta,
                expected
            );
        }
        assert!(triggers.iter().all(|t| (t.duration - expected).abs() < 1e-12));
    }
}

/// The first step lands one lead-in after start
#[test]
fn test_first_step_after_lead_in() {
    let clock = Arc::new(ManualClock::new(3.25));
    let mut sched = scheduler(&clock, all_steps_active(), 120.0);
    sched.start();

    clock.advance(0.05);
    sched.tick();

    let first = sched.voice().triggers[0];
    assert!((first.at - 3.35).abs() < 1e-9);
    assert_eq!(first.pitch_index, 0);
}

/// Steps 0, 4, 8 and 12 at 120 BPM fire every half second, four per loop
#[test]
fn test_quarter_note_pattern() {
    let store = PatternStore::new();
    for i in [0, 4, 8, 12] {
        store.set_step(i, StepUpdate::new().active(true)).unwrap();
    }

    let clock = Arc::new(ManualClock::new(0.0));
    let mut sched = scheduler(&clock, store, 120.0);
    sched.start();
    let t0 = sched.next_trigger_time();

    let mut rng = StdRng::seed_from_u64(7);
    while clock.get() < t0 + 4.0 {
        sched.tick();
        clock.advance(rng.gen_range(0.015..0.035));
    }

    let times: Vec<f64> = sched.voice().triggers.iter().map(|t| t.at - t0).collect();
    for (i, offset) in times.iter().take(8).enumerate() {
        assert!((offset - 0.5 * i as f64).abs() < 1e-9, "trigger {} at {}", i, offset);
    }

    let first_loop = times.iter().filter(|&&t| t < 2.0 - 1e-9).count();
    assert_eq!(first_loop, 4);
}

/// A tempo change applies from the next computed step, never to scheduled ones
#[test]
fn test_tempo_change_is_not_retroactive() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut sched = scheduler(&clock, all_steps_active(), 120.0);
    sched.start();

    // Schedules step 0 at 0.1 and fixes step 1 at 0.225
    clock.set(0.05);
    assert_eq!(sched.tick(), 1);

    sched.transport().set_tempo(60.0);
    clock.set(0.2);
    sched.tick();
    clock.set(0.4);
    sched.tick();

    let triggers = &sched.voice().triggers;
    assert_eq!(triggers.len(), 3);
    assert!((triggers[0].at - 0.1).abs() < 1e-9);
    assert!((triggers[0].duration - 0.125).abs() < 1e-12);
    assert!((triggers[1].at - 0.225).abs() < 1e-9);
    assert!((triggers[1].duration - 0.25).abs() < 1e-12);
    assert!((triggers[2].at - 0.475).abs() < 1e-9);
}

/// A tick that arrives very late schedules the whole backlog on the grid
#[test]
fn test_late_tick_keeps_every_step() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut sched = scheduler(&clock, all_steps_active(), 120.0);
    sched.start();

    clock.set(0.6);
    let advanced = sched.tick();
    assert_eq!(advanced, 5);
    assert_eq!(sched.overruns(), 1);

    let pitches: Vec<usize> = sched.voice().triggers.iter().map(|t| t.pitch_index).collect();
    assert_eq!(pitches, vec![0, 1, 2, 3, 4]);
    for (i, trigger) in sched.voice().triggers.iter().enumerate() {
        assert!((trigger.at - (0.1 + 0.125 * i as f64)).abs() < 1e-9);
    }
}

/// The published playhead is the step most recently scheduled
#[test]
fn test_published_step_advances() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut sched = scheduler(&clock, PatternStore::new(), 120.0);
    sched.start();
    assert_eq!(sched.current_step(), 0);

    let mut last = 0;
    let mut wraps = 0;
    for _ in 0..200 {
        clock.advance(0.025);
        sched.tick();
        let step = sched.current_step();
        assert!(step < 16);
        if step < last {
            wraps += 1;
        }
        last = step;
    }
    // 5 s at 8 steps per second
    assert_eq!(wraps, 2);
}

/// Stopping silences the voice; restarting begins again at step 0
#[test]
fn test_restart_begins_at_step_zero() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut sched = scheduler(&clock, all_steps_active(), 120.0);
    sched.start();
    for _ in 0..20 {
        clock.advance(0.025);
        sched.tick();
    }
    assert!(sched.voice().triggers.len() > 1);

    assert!(sched.stop());
    assert_eq!(sched.voice().silenced, vec![clock.get()]);
    assert_eq!(sched.current_step(), 0);

    let before = sched.voice().triggers.len();
    clock.advance(1.0);
    assert_eq!(sched.tick(), 0);
    assert_eq!(sched.voice().triggers.len(), before);

    assert!(sched.start());
    let restart = clock.get();
    clock.advance(0.05);
    sched.tick();

    let first = sched.voice().triggers[before];
    assert_eq!(first.pitch_index, 0);
    assert!((first.at - (restart + 0.1)).abs() < 1e-9);
}

/// Steps edited between ticks are picked up by the next tick
#[test]
fn test_pattern_edits_apply_to_later_steps() {
    let store = PatternStore::new();
    let clock = Arc::new(ManualClock::new(0.0));
    let mut sched = scheduler(&clock, store.clone(), 120.0);
    sched.start();

    clock.set(0.05);
    sched.tick();
    assert!(sched.voice().triggers.is_empty());

    store
        .set_step(1, StepUpdate::new().active(true).pitch(7).accent(true))
        .unwrap();
    clock.set(0.2);
    sched.tick();

    let triggers = &sched.voice().triggers;
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].pitch_index, 7);
    assert!(triggers[0].accent);
}
