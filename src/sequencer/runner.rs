// Sequencer - Runtime facade around the scheduler
//
// Owns the scheduling thread. A `crossbeam_channel::tick` timer wakes it every
// tick interval; the scheduler sits behind a mutex, which doubles as the
// in-tick guard so two ticks (or a tick and a control call) never overlap.
// `stop()` joins the thread before touching the scheduler, so no tick can run
// after it returns.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, select};

use super::pattern::{PatternResult, PatternStore, Step, StepUpdate};
use super::scheduler::Scheduler;
use super::transport::{SharedTransport, TransportState};
use crate::midi::output::MidiSink;
use crate::synth::oscillator::WaveformType;
use crate::synth::params::{SharedSynthParams, SynthParams};
use crate::synth::voice::VoiceTarget;

struct Ticker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct Sequencer<V: VoiceTarget + Send + 'static> {
    scheduler: Arc<Mutex<Scheduler<V>>>,
    pattern: PatternStore,
    transport: SharedTransport,
    params: SharedSynthParams,
    tick_interval: Duration,
    ticker: Option<Ticker>,
}

fn lock<V: VoiceTarget>(scheduler: &Mutex<Scheduler<V>>) -> MutexGuard<'_, Scheduler<V>> {
    scheduler
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<V: VoiceTarget + Send + 'static> Sequencer<V> {
    /// Wrap a scheduler, sharing its pattern, transport and parameters
    pub fn new(scheduler: Scheduler<V>, tick_interval: Duration) -> Self {
        let pattern = scheduler.pattern().clone();
        let transport = scheduler.transport().clone();
        let params = scheduler.params().clone();
        Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            pattern,
            transport,
            params,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            ticker: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    /// Step most recently scheduled, for UI highlighting
    pub fn current_step(&self) -> usize {
        self.transport.current_step()
    }

    pub fn tempo(&self) -> f32 {
        self.transport.tempo()
    }

    /// Start playback and the scheduling thread
    ///
    /// The first window is scheduled before this returns. Returns `false` if
    /// already running or if the thread could not be spawned.
    pub fn start(&mut self) -> bool {
        {
            let mut scheduler = lock(&self.scheduler);
            if !scheduler.start() {
                return false;
            }
            scheduler.tick();
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let timer = crossbeam_channel::tick(self.tick_interval);
        let scheduler = Arc::clone(&self.scheduler);

        let spawned = thread::Builder::new()
            .name("sequencer-tick".into())
            .spawn(move || {
                loop {
                    select! {
                        recv(timer) -> _ => {
                            lock(&scheduler).tick();
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                self.ticker = Some(Ticker { stop_tx, handle });
                true
            }
            Err(e) => {
                log::error!("Failed to spawn scheduler thread: {}", e);
                lock(&self.scheduler).stop();
                false
            }
        }
    }

    /// Stop playback, silence the voice and send All Notes Off
    ///
    /// Returns `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.stop_tx.send(());
            if ticker.handle.join().is_err() {
                log::warn!("Scheduler thread panicked");
            }
        }
        lock(&self.scheduler).stop()
    }

    /// Set the tempo, clamped to 20..300 BPM
    ///
    /// Already scheduled steps keep their times; the new value applies from
    /// the next computed step. Non-finite values are ignored.
    pub fn set_tempo(&self, bpm: f32) -> Option<f32> {
        let stored = self.transport.set_tempo(bpm);
        match stored {
            Some(value) => log::debug!("Tempo set to {:.1} BPM", value),
            None => log::warn!("Ignoring invalid tempo {}", bpm),
        }
        stored
    }

    pub fn get_step(&self, index: usize) -> PatternResult<Step> {
        self.pattern.get_step(index)
    }

    pub fn set_step(&self, index: usize, update: StepUpdate) -> PatternResult<()> {
        self.pattern.set_step(index, update)
    }

    pub fn pattern(&self) -> &PatternStore {
        &self.pattern
    }

    pub fn params(&self) -> SynthParams {
        self.params.snapshot()
    }

    fn apply_params(&self, params: SynthParams) -> SynthParams {
        lock(&self.scheduler).update_params(&params);
        params
    }

    pub fn set_waveform(&self, waveform: WaveformType) -> SynthParams {
        self.apply_params(self.params.set_waveform(waveform))
    }

    pub fn set_cutoff(&self, value: f32) -> SynthParams {
        self.apply_params(self.params.set_cutoff(value))
    }

    pub fn set_resonance(&self, value: f32) -> SynthParams {
        self.apply_params(self.params.set_resonance(value))
    }

    pub fn set_decay(&self, value: f32) -> SynthParams {
        self.apply_params(self.params.set_decay(value))
    }

    pub fn set_env_mod(&self, value: f32) -> SynthParams {
        self.apply_params(self.params.set_env_mod(value))
    }

    /// Select or deselect the external MIDI output
    ///
    /// Takes effect from the next scheduled step. Returns the previous
    /// output; dropping it lets its queued messages play out.
    pub fn select_output(&self, output: Option<Box<dyn MidiSink>>) -> Option<Box<dyn MidiSink>> {
        lock(&self.scheduler).bridge_mut().select_output(output)
    }

    pub fn output_name(&self) -> Option<String> {
        lock(&self.scheduler)
            .bridge()
            .output_name()
            .map(str::to_string)
    }

    /// Broadcast All Notes Off on the external output, if any
    pub fn all_notes_off(&self) {
        lock(&self.scheduler).bridge_mut().all_notes_off();
    }

    /// Run `f` with the scheduler locked (between ticks)
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&mut Scheduler<V>) -> R) -> R {
        f(&mut lock(&self.scheduler))
    }
}

impl<V: VoiceTarget + Send + 'static> Drop for Sequencer<V> {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::{ManualClock, SystemWallClock};
    use crate::midi::bridge::MidiBridge;
    use crate::midi::output::MemorySink;
    use crate::synth::voice::NoteTrigger;

    #[derive(Default)]
    struct CountingVoice {
        triggers: usize,
        updates: usize,
    }

    impl VoiceTarget for CountingVoice {
        fn trigger(&mut self, _note: NoteTrigger) {
            self.triggers += 1;
        }

        fn update_params(&mut self, _params: &SynthParams) {
            self.updates += 1;
        }

        fn silence(&mut self, _at: f64) {}
    }

    fn sequencer(clock: Arc<ManualClock>) -> Sequencer<CountingVoice> {
        let scheduler = Scheduler::new(
            clock.clone(),
            PatternStore::new(),
            SharedTransport::default(),
            SharedSynthParams::default(),
            CountingVoice::default(),
            MidiBridge::new(clock, Arc::new(SystemWallClock::new())),
        );
        Sequencer::new(scheduler, Duration::from_millis(5))
    }

    #[test]
    fn test_start_stop_state_machine() {
        let mut seq = sequencer(Arc::new(ManualClock::new(0.0)));
        assert_eq!(seq.state(), TransportState::Stopped);
        assert!(!seq.stop());
        assert!(seq.start());
        assert!(!seq.start());
        assert!(seq.is_running());
        assert!(seq.stop());
        assert_eq!(seq.state(), TransportState::Stopped);
        assert_eq!(seq.current_step(), 0);
    }

    #[test]
    fn test_no_tick_after_stop() {
        let clock = Arc::new(ManualClock::new(0.0));
        let mut seq = sequencer(clock.clone());
        for i in 0..16 {
            seq.set_step(i, StepUpdate::new().active(true)).unwrap();
        }

        seq.start();
        clock.set(0.5);
        thread::sleep(Duration::from_millis(30));
        seq.stop();
        let after_stop = seq.with_scheduler(|s| s.voice().triggers);
        assert!(after_stop > 0);

        clock.set(5.0);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(seq.with_scheduler(|s| s.voice().triggers), after_stop);
    }

    #[test]
    fn test_param_setters_update_voice() {
        let seq = sequencer(Arc::new(ManualClock::new(0.0)));
        assert_eq!(seq.set_cutoff(120.0).cutoff, 100.0);
        seq.set_waveform(WaveformType::Square);
        assert_eq!(seq.params().waveform, WaveformType::Square);
        assert_eq!(seq.with_scheduler(|s| s.voice().updates), 2);
    }

    #[test]
    fn test_tempo_clamp_and_invalid() {
        let seq = sequencer(Arc::new(ManualClock::new(0.0)));
        assert_eq!(seq.set_tempo(301.0), Some(300.0));
        assert_eq!(seq.set_tempo(19.0), Some(20.0));
        assert_eq!(seq.set_tempo(f32::NAN), None);
        assert_eq!(seq.tempo(), 20.0);
    }

    #[test]
    fn test_output_selection() {
        let seq = sequencer(Arc::new(ManualClock::new(0.0)));
        assert_eq!(seq.output_name(), None);
        assert!(seq.select_output(Some(Box::new(MemorySink::new()))).is_none());
        assert_eq!(seq.output_name().as_deref(), Some("memory"));
        assert!(seq.select_output(None).is_some());
        assert_eq!(seq.output_name(), None);
    }
}
