// acidstep - Step sequencer and monophonic bass synth, library exports

pub mod audio;
pub mod config;
pub mod connection;
pub mod messaging;
pub mod midi;
pub mod sequencer;
pub mod synth;

// Re-export commonly used types for convenience
pub use audio::clock::{AudioClock, ManualClock, SampleClock, SystemWallClock, WallClock};
pub use audio::engine::AudioEngine;
pub use config::SequencerConfig;
pub use messaging::channels::{VoiceCommandSender, create_command_channel};
pub use midi::bridge::{ClockTranslator, MidiBridge};
pub use midi::output::{MemorySink, MidiSink, MidirSink};
pub use sequencer::{
    Pattern, PatternError, PatternStore, Scheduler, SchedulerTiming, Sequencer, SharedTransport,
    Step, StepUpdate, TransportState,
};
pub use synth::oscillator::WaveformType;
pub use synth::params::{SharedSynthParams, SynthParams};
pub use synth::voice::{MonoVoice, NoteTrigger, VoiceState, VoiceTarget};
