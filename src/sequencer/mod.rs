// Sequencer - Pattern store, transport and lookahead scheduling

pub mod pattern;
pub mod runner;
pub mod scheduler;
pub mod transport;

pub use pattern::{Pattern, PatternError, PatternStore, STEP_COUNT, Step, StepUpdate};
pub use runner::Sequencer;
pub use scheduler::{Scheduler, SchedulerTiming};
pub use transport::{SharedTransport, TransportState, step_duration};
