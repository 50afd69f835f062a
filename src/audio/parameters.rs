// Atomic parameters - Lock-free scalar sharing between control and audio threads
//
// A single f32 stored as its bit pattern in an AtomicU32. A read can never
// observe a half-written value, which is what tempo and master volume need.
// Multi-field parameter sets go through `arc_swap` snapshots instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Thread-safe f32 parameter
#[derive(Clone)]
pub struct AtomicF32 {
    inner: Arc<AtomicU32>,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            inner: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    pub fn set(&self, value: f32) {
        self.inner.store(value.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.inner.load(Ordering::Acquire))
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl std::fmt::Debug for AtomicF32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AtomicF32").field(&self.get()).finish()
    }
}
