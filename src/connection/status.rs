// Output health - Lock-free state of an audio stream or MIDI port
//
// Written from callbacks and worker threads (stream error callback, MIDI
// dispatcher), read from the control thread for reporting.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceStatus {
    /// Created but not producing output yet
    Opening = 0,
    Running = 1,
    /// At least one error since the last successful (re)start
    Faulted = 2,
    Closed = 3,
}

impl DeviceStatus {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => DeviceStatus::Running,
            2 => DeviceStatus::Faulted,
            3 => DeviceStatus::Closed,
            _ => DeviceStatus::Opening,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceStatus::Opening => "opening",
            DeviceStatus::Running => "running",
            DeviceStatus::Faulted => "faulted",
            DeviceStatus::Closed => "closed",
        })
    }
}

#[derive(Debug, Default)]
struct HealthInner {
    status: AtomicU8,
    faults: AtomicU64,
}

/// Shared status plus a running fault count; clones observe the same output
#[derive(Debug, Clone, Default)]
pub struct OutputHealth {
    inner: Arc<HealthInner>,
}

impl OutputHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus::from_raw(self.inner.status.load(Ordering::Acquire))
    }

    pub fn faults(&self) -> u64 {
        self.inner.faults.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.status() == DeviceStatus::Running
    }

    pub fn mark_running(&self) {
        self.store(DeviceStatus::Running);
    }

    /// Count a fault; the status stays `Faulted` until the next `mark_running`
    pub fn mark_fault(&self) {
        self.inner.faults.fetch_add(1, Ordering::Relaxed);
        if self.status() != DeviceStatus::Closed {
            self.store(DeviceStatus::Faulted);
        }
    }

    pub fn mark_closed(&self) {
        self.store(DeviceStatus::Closed);
    }

    fn store(&self, status: DeviceStatus) {
        self.inner.status.store(status as u8, Ordering::Release);
    }
}

impl fmt::Display for OutputHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.faults() {
            0 => write!(f, "{}", self.status()),
            n => write!(f, "{} ({} errors)", self.status(), n),
        }
    }
}
