// Scheduler - Lookahead step scheduling against the audio clock
//
// A coarse, jittery timer calls `tick()`; each tick schedules every step whose
// trigger time falls inside the lookahead window, stamped with the exact audio
// time it must sound at. The timer only refills the window, it never decides
// when a note plays, so tick jitter never reaches the output.
//
// The scheduler owns no thread and reads time only through the injected clock,
// which is what lets tests and the offline renderer drive it deterministically.

use std::sync::Arc;

use super::pattern::{PatternStore, STEP_COUNT};
use super::transport::{SharedTransport, TransportState, step_duration};
use crate::audio::clock::AudioClock;
use crate::midi::bridge::MidiBridge;
use crate::synth::params::{SharedSynthParams, SynthParams};
use crate::synth::pitch::PITCH_TABLE;
use crate::synth::voice::{NoteTrigger, VoiceTarget};

/// MIDI note-off position relative to the step length
pub const NOTE_OFF_POINT: f64 = 0.9;
pub const SLIDE_NOTE_OFF_POINT: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerTiming {
    /// How far past "now" each tick schedules (seconds)
    pub schedule_ahead: f64,
    /// Delay between `start()` and the first step (seconds)
    pub lead_in: f64,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            schedule_ahead: 0.1,
            lead_in: 0.1,
        }
    }
}

pub struct Scheduler<V: VoiceTarget> {
    clock: Arc<dyn AudioClock>,
    pattern: PatternStore,
    transport: SharedTransport,
    params: SharedSynthParams,
    voice: V,
    bridge: MidiBridge,
    timing: SchedulerTiming,

    current_step: usize,
    next_trigger_time: f64,
    overruns: u64,
}

impl<V: VoiceTarget> Scheduler<V> {
    pub fn new(
        clock: Arc<dyn AudioClock>,
        pattern: PatternStore,
        transport: SharedTransport,
        params: SharedSynthParams,
        voice: V,
        bridge: MidiBridge,
    ) -> Self {
        Self {
            clock,
            pattern,
            transport,
            params,
            voice,
            bridge,
            timing: SchedulerTiming::default(),
            current_step: 0,
            next_trigger_time: 0.0,
            overruns: 0,
        }
    }

    pub fn with_timing(mut self, timing: SchedulerTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> SchedulerTiming {
        self.timing
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    /// Step that the next scheduled trigger will read
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Audio time of the next step
    pub fn next_trigger_time(&self) -> f64 {
        self.next_trigger_time
    }

    /// Ticks that found the next step already in the past
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn voice(&self) -> &V {
        &self.voice
    }

    pub fn voice_mut(&mut self) -> &mut V {
        &mut self.voice
    }

    pub fn bridge(&self) -> &MidiBridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut MidiBridge {
        &mut self.bridge
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    pub fn pattern(&self) -> &PatternStore {
        &self.pattern
    }

    pub fn params(&self) -> &SharedSynthParams {
        &self.params
    }

    /// Stopped -> Running
    ///
    /// Returns `false` (and changes nothing) if already running.
    pub fn start(&mut self) -> bool {
        if self.transport.is_running() {
            log::warn!("start() ignored: transport already running");
            return false;
        }

        self.current_step = 0;
        self.next_trigger_time = self.clock.now() + self.timing.lead_in;
        self.transport.publish_step(0);
        self.bridge.translator_mut().rebase();
        self.transport.set_running(true);

        log::info!(
            "Transport started at {:.1} BPM, first step at {:.3}s",
            self.transport.tempo(),
            self.next_trigger_time
        );
        true
    }

    /// Running -> Stopped
    ///
    /// Silences the voice and sends All Notes Off. Returns `false` (and
    /// changes nothing) if already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.transport.is_running() {
            log::warn!("stop() ignored: transport not running");
            return false;
        }

        self.transport.set_running(false);
        self.current_step = 0;
        self.transport.publish_step(0);

        let now = self.clock.now();
        self.voice.silence(now);
        self.bridge.all_notes_off();

        log::info!("Transport stopped");
        true
    }

    /// Schedule every step due inside the lookahead window
    ///
    /// Returns the number of steps advanced (active or not). A late tick
    /// schedules the whole backlog in one pass; nothing is dropped.
    pub fn tick(&mut self) -> usize {
        if !self.transport.is_running() {
            return 0;
        }

        let now = self.clock.now();
        let horizon = now + self.timing.schedule_ahead;

        if self.next_trigger_time < now {
            self.overruns += 1;
            log::debug!(
                "Scheduler overrun: next step {:.1} ms late",
                (now - self.next_trigger_time) * 1000.0
            );
        }

        // One consistent view per tick
        let pattern = self.pattern.snapshot();
        let params = self.params.snapshot();
        let tempo = self.transport.tempo();

        let mut advanced = 0;
        while self.next_trigger_time < horizon {
            let duration = step_duration(tempo);
            let at = self.next_trigger_time;
            let step = pattern.steps()[self.current_step];

            if step.active {
                self.voice.trigger(NoteTrigger {
                    pitch_index: step.pitch_index,
                    at,
                    duration,
                    slide: step.slide,
                    accent: step.accent,
                    params,
                });

                if self.bridge.has_output() {
                    let note = PITCH_TABLE[step.pitch_index];
                    // A slide overlaps the next note, except a repeat of the
                    // same key, whose note-on the late note-off would cut
                    let next = pattern.steps()[(self.current_step + 1) % STEP_COUNT];
                    let repeats = next.active && next.pitch_index == step.pitch_index;
                    let off_point = if step.slide && !repeats {
                        SLIDE_NOTE_OFF_POINT
                    } else {
                        NOTE_OFF_POINT
                    };
                    self.bridge.note_on(note, step.accent, at);
                    self.bridge.note_off(note, at + duration * off_point);
                }
            }

            self.transport.publish_step(self.current_step);
            self.current_step = (self.current_step + 1) % STEP_COUNT;
            self.next_trigger_time += duration;
            advanced += 1;
        }

        advanced
    }

    /// Forward a live knob change to the voice
    pub fn update_params(&mut self, params: &SynthParams) {
        self.voice.update_params(params);
    }
}
