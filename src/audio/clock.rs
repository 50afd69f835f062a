// Clocks - Audio and wall time sources
//
// Two independent time domains meet in this crate:
// - the audio clock, derived from the number of frames rendered by the output
//   stream (high resolution, drives the synthesis voice)
// - the wall clock, a monotonic system timer used to timestamp external MIDI
//
// Both report seconds as f64. They start at unrelated origins and drift relative
// to each other, so crossing from one to the other always goes through an
// explicit translation (see `midi::bridge::ClockTranslator`).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of audio-clock time, in seconds
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Source of wall-clock time, in seconds since an arbitrary fixed origin
pub trait WallClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Audio clock advanced by the audio callback
///
/// The callback adds the number of frames it rendered after each buffer; the
/// control side reads the position to know where "now" is on the audio timeline.
#[derive(Clone)]
pub struct SampleClock {
    /// Current frame position (incremented by audio callback)
    frame_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl SampleClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frame_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Get current frame position
    pub fn current_frame(&self) -> u64 {
        self.frame_position.load(Ordering::Acquire)
    }

    /// Advance frame position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.frame_position
            .fetch_add(frames as u64, Ordering::AcqRel);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}

impl AudioClock for SampleClock {
    fn now(&self) -> f64 {
        self.current_frame() as f64 / self.sample_rate
    }
}

/// Monotonic wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemWallClock {
    origin: Instant,
}

impl SystemWallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemWallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for SystemWallClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually driven clock for offline rendering and tests
///
/// Stores the time as f64 bits so it can be shared behind an `Arc` and
/// used as either an audio or a wall clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) {
        let now = self.get();
        self.set(now + seconds);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.get()
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> f64 {
        self.get()
    }
}
