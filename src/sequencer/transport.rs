// Transport - Run state, tempo and the published playhead
//
// Thread-safe via atomics: the control thread writes tempo and run state, the
// scheduler publishes the step it just scheduled, and any observer (UI, CLI)
// reads them without taking the scheduler lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::audio::parameters::AtomicF32;

pub const MIN_TEMPO: f32 = 20.0;
pub const MAX_TEMPO: f32 = 300.0;
pub const DEFAULT_TEMPO: f32 = 120.0;

/// Length of one sixteenth-note step in seconds
pub fn step_duration(bpm: f32) -> f64 {
    60.0 / bpm as f64 / 4.0
}

/// Clamp a tempo into the supported range, rejecting non-finite values
pub fn clamp_tempo(bpm: f32) -> Option<f32> {
    if bpm.is_finite() {
        Some(bpm.clamp(MIN_TEMPO, MAX_TEMPO))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Running,
}

impl TransportState {
    pub fn is_running(&self) -> bool {
        matches!(self, TransportState::Running)
    }
}

#[derive(Debug)]
struct TransportInner {
    tempo: AtomicF32,
    running: AtomicBool,
    current_step: AtomicUsize,
}

/// Shared transport handle, cheap to clone
#[derive(Debug, Clone)]
pub struct SharedTransport {
    inner: Arc<TransportInner>,
}

impl SharedTransport {
    pub fn new(bpm: f32) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                tempo: AtomicF32::new(clamp_tempo(bpm).unwrap_or(DEFAULT_TEMPO)),
                running: AtomicBool::new(false),
                current_step: AtomicUsize::new(0),
            }),
        }
    }

    pub fn state(&self) -> TransportState {
        if self.inner.running.load(Ordering::Acquire) {
            TransportState::Running
        } else {
            TransportState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.inner.running.store(running, Ordering::Release);
    }

    pub fn tempo(&self) -> f32 {
        self.inner.tempo.get()
    }

    /// Store a new tempo, clamped to 20..300 BPM
    ///
    /// Returns the stored value, or `None` if `bpm` was not finite and the
    /// previous tempo was kept.
    pub fn set_tempo(&self, bpm: f32) -> Option<f32> {
        let bpm = clamp_tempo(bpm)?;
        self.inner.tempo.set(bpm);
        Some(bpm)
    }

    /// Step most recently handed to the voice
    pub fn current_step(&self) -> usize {
        self.inner.current_step.load(Ordering::Acquire)
    }

    pub(crate) fn publish_step(&self, step: usize) {
        self.inner.current_step.store(step, Ordering::Release);
    }
}

impl Default for SharedTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO)
    }
}
