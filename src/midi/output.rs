// MIDI output sinks - Where timestamped wire bytes go
//
// `MidirSink` hands messages to a dedicated dispatcher thread that owns the
// midir connection and holds them in a time-ordered queue until their wall
// timestamp is due, so the scheduler never blocks on port I/O or on sleeping.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use midir::MidiOutputConnection;

use super::MidiResult;
use crate::audio::clock::{SystemWallClock, WallClock};
use crate::connection::status::OutputHealth;

/// Destination for timestamped MIDI bytes
pub trait MidiSink: Send {
    /// Queue `bytes` for delivery at `wall_time` (seconds on the sink's wall clock)
    fn send(&mut self, bytes: &[u8], wall_time: f64);
    /// Drop every queued message that has not been sent yet
    fn clear(&mut self);
    fn name(&self) -> &str;
    /// Release the output, waiting until queued messages have gone out
    fn close(self: Box<Self>) {}
}

enum Dispatch {
    Send { bytes: Vec<u8>, at: f64 },
    Clear,
}

struct Queued {
    bytes: Vec<u8>,
    at: f64,
}

/// Hardware/virtual port output backed by midir
pub struct MidirSink {
    name: String,
    tx: Sender<Dispatch>,
    handle: Option<JoinHandle<()>>,
    health: OutputHealth,
}

impl MidirSink {
    pub fn new(
        connection: MidiOutputConnection,
        name: impl Into<String>,
        clock: SystemWallClock,
    ) -> MidiResult<Self> {
        let name = name.into();
        let (tx, rx) = crossbeam_channel::unbounded::<Dispatch>();

        let health = OutputHealth::new();
        let port = Port {
            connection,
            name: name.clone(),
            health: health.clone(),
        };
        health.mark_running();
        let handle = thread::Builder::new()
            .name("midi-dispatch".into())
            .spawn(move || dispatcher_loop(port, rx, clock))?;

        Ok(Self {
            name,
            tx,
            handle: Some(handle),
            health,
        })
    }

    /// Port state and failed-send count, updated by the dispatcher
    pub fn health(&self) -> &OutputHealth {
        &self.health
    }
}

impl MidiSink for MidirSink {
    fn send(&mut self, bytes: &[u8], wall_time: f64) {
        let dispatch = Dispatch::Send {
            bytes: bytes.to_vec(),
            at: wall_time,
        };
        if self.tx.send(dispatch).is_err() {
            log::warn!("MIDI dispatcher for '{}' is gone, message dropped", self.name);
        }
    }

    fn clear(&mut self) {
        let _ = self.tx.send(Dispatch::Clear);
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(mut self: Box<Self>) {
        let handle = self.handle.take();
        drop(self);
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::warn!("MIDI dispatcher thread panicked");
            }
        }
    }
}

/// Insert keeping the queue sorted by time, equal times in arrival order
fn enqueue(queue: &mut VecDeque<Queued>, bytes: Vec<u8>, at: f64) {
    let position = queue.partition_point(|q| q.at <= at);
    queue.insert(position, Queued { bytes, at });
}

/// Dispatcher-side end of the output
struct Port {
    connection: MidiOutputConnection,
    name: String,
    health: OutputHealth,
}

impl Port {
    fn send_now(&mut self, bytes: &[u8]) {
        if let Err(e) = self.connection.send(bytes) {
            self.health.mark_fault();
            log::warn!("MIDI send to '{}' failed: {}", self.name, e);
        }
    }

    fn close(self) {
        self.health.mark_closed();
        log::debug!("MIDI dispatcher for '{}' finished", self.name);
        self.connection.close();
    }
}

fn dispatcher_loop(mut port: Port, rx: Receiver<Dispatch>, clock: SystemWallClock) {
    let mut queue: VecDeque<Queued> = VecDeque::with_capacity(64);

    loop {
        let received = match queue.front() {
            None => match rx.recv() {
                Ok(dispatch) => Some(dispatch),
                Err(_) => break,
            },
            Some(next) => {
                let wait = (next.at - clock.now()).max(0.0);
                match rx.recv_timeout(Duration::from_secs_f64(wait)) {
                    Ok(dispatch) => Some(dispatch),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        };

        match received {
            Some(Dispatch::Send { bytes, at }) => enqueue(&mut queue, bytes, at),
            Some(Dispatch::Clear) => queue.clear(),
            None => {}
        }

        let now = clock.now();
        while queue.front().is_some_and(|q| q.at <= now) {
            if let Some(due) = queue.pop_front() {
                port.send_now(&due.bytes);
            }
        }
    }

    // Sender dropped: deliver what is already queued at its own time
    for pending in queue.drain(..) {
        let wait = pending.at - clock.now();
        if wait > 0.0 {
            thread::sleep(Duration::from_secs_f64(wait));
        }
        port.send_now(&pending.bytes);
    }
    port.close();
}

/// One message captured by a `MemorySink`
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub bytes: Vec<u8>,
    pub wall_time: f64,
}

#[derive(Debug, Default)]
struct MemoryLog {
    messages: Vec<SentMessage>,
    clears: usize,
}

/// Sink that records messages instead of sending them
///
/// Clones share the same log, so a test can keep one handle and give the
/// other to the bridge.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.lock().messages.clone()
    }

    /// Number of `clear` calls seen
    pub fn clear_count(&self) -> usize {
        self.lock().clears
    }
}

impl MidiSink for MemorySink {
    fn send(&mut self, bytes: &[u8], wall_time: f64) {
        self.lock().messages.push(SentMessage {
            bytes: bytes.to_vec(),
            wall_time,
        });
    }

    fn clear(&mut self) {
        self.lock().clears += 1;
    }

    fn name(&self) -> &str {
        "memory"
    }
}
