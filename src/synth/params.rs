// Synth parameters - Knob values shared between control and voice
//
// Every knob is a 0..100 value. The UI writes a complete new snapshot on each
// change; the scheduler loads one snapshot per tick, so a trigger can never mix
// an old cutoff with a new resonance.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use super::oscillator::WaveformType;

pub const KNOB_MIN: f32 = 0.0;
pub const KNOB_MAX: f32 = 100.0;

fn clamp_knob(value: f32) -> f32 {
    if value.is_nan() {
        KNOB_MIN
    } else {
        value.clamp(KNOB_MIN, KNOB_MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthParams {
    pub waveform: WaveformType,
    pub cutoff: f32,
    pub resonance: f32,
    pub decay: f32,
    pub env_mod: f32,
}

impl SynthParams {
    /// Build parameters with every knob clamped to 0..100
    pub fn new(waveform: WaveformType, cutoff: f32, resonance: f32, decay: f32, env_mod: f32) -> Self {
        Self {
            waveform,
            cutoff: clamp_knob(cutoff),
            resonance: clamp_knob(resonance),
            decay: clamp_knob(decay),
            env_mod: clamp_knob(env_mod),
        }
    }

    /// Same parameters with every knob forced back into 0..100
    pub fn clamped(self) -> Self {
        Self::new(self.waveform, self.cutoff, self.resonance, self.decay, self.env_mod)
    }
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            waveform: WaveformType::Saw,
            cutoff: 50.0,
            resonance: 50.0,
            decay: 50.0,
            env_mod: 50.0,
        }
    }
}

/// Atomically swapped `SynthParams` snapshot
#[derive(Clone)]
pub struct SharedSynthParams {
    inner: Arc<ArcSwap<SynthParams>>,
}

impl SharedSynthParams {
    pub fn new(params: SynthParams) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(params.clamped())),
        }
    }

    pub fn snapshot(&self) -> SynthParams {
        **self.inner.load()
    }

    pub fn replace(&self, params: SynthParams) {
        self.inner.store(Arc::new(params.clamped()));
    }

    /// Apply a change to the current snapshot and return the stored result
    ///
    /// The closure may run more than once when other writers race it; the
    /// result is the value from the run that was actually stored.
    pub fn update(&self, mut change: impl FnMut(&mut SynthParams)) -> SynthParams {
        let mut stored = SynthParams::default();
        self.inner.rcu(|current| {
            let mut next = **current;
            change(&mut next);
            stored = next.clamped();
            stored
        });
        stored
    }

    pub fn set_waveform(&self, waveform: WaveformType) -> SynthParams {
        self.update(|p| p.waveform = waveform)
    }

    pub fn set_cutoff(&self, value: f32) -> SynthParams {
        self.update(|p| p.cutoff = value)
    }

    pub fn set_resonance(&self, value: f32) -> SynthParams {
        self.update(|p| p.resonance = value)
    }

    pub fn set_decay(&self, value: f32) -> SynthParams {
        self.update(|p| p.decay = value)
    }

    pub fn set_env_mod(&self, value: f32) -> SynthParams {
        self.update(|p| p.env_mod = value)
    }
}

impl Default for SharedSynthParams {
    fn default() -> Self {
        Self::new(SynthParams::default())
    }
}
