// MIDI module - Timed note output to external instruments

pub mod bridge;
pub mod device;
pub mod event;
pub mod output;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("MIDI backend unavailable: {0}")]
    Init(#[from] midir::InitError),

    #[error("MIDI output port not found: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI output '{port}': {reason}")]
    Connect { port: String, reason: String },

    #[error("Failed to start MIDI dispatcher: {0}")]
    Dispatcher(#[from] std::io::Error),
}

pub type MidiResult<T> = Result<T, MidiError>;

pub use bridge::{ClockTranslator, MidiBridge};
pub use event::MidiMessage;
pub use output::{MemorySink, MidiSink, MidirSink};
