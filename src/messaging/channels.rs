// Lock-free command channel into the audio callback

use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Producer, Split};

use crate::messaging::command::VoiceCommand;
use crate::synth::params::SynthParams;
use crate::synth::voice::{MonoVoice, NoteTrigger, VoiceTarget};

pub type CommandProducer = ringbuf::HeapProd<VoiceCommand>;
pub type CommandConsumer = ringbuf::HeapCons<VoiceCommand>;

pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<VoiceCommand>::new(capacity.max(1));
    rb.split()
}

/// `VoiceTarget` that forwards every call to the voice on the audio thread
pub struct VoiceCommandSender {
    producer: CommandProducer,
    dropped: u64,
}

impl VoiceCommandSender {
    pub fn new(producer: CommandProducer) -> Self {
        Self {
            producer,
            dropped: 0,
        }
    }

    /// Commands lost because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn push(&mut self, command: VoiceCommand) {
        if self.producer.try_push(command).is_err() {
            self.dropped += 1;
            log::warn!(
                "Voice command queue full, dropped {:?} ({} so far)",
                command,
                self.dropped
            );
        }
    }
}

impl VoiceTarget for VoiceCommandSender {
    fn trigger(&mut self, note: NoteTrigger) {
        self.push(VoiceCommand::Trigger(note));
    }

    fn update_params(&mut self, params: &SynthParams) {
        self.push(VoiceCommand::UpdateParams(*params));
    }

    fn silence(&mut self, at: f64) {
        self.push(VoiceCommand::Silence { at });
    }
}

/// Apply every pending command to the voice (audio thread side)
///
/// Returns the number of commands applied.
pub fn drain_commands(consumer: &mut CommandConsumer, voice: &mut MonoVoice) -> usize {
    let mut applied = 0;
    while let Some(command) = consumer.try_pop() {
        match command {
            VoiceCommand::Trigger(note) => voice.trigger(note),
            VoiceCommand::UpdateParams(params) => voice.update_params(&params),
            VoiceCommand::Silence { at } => voice.silence(at),
        }
        applied += 1;
    }
    applied
}
