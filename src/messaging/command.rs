// Voice commands - Control thread -> audio thread
//
// The scheduler runs on the control side while the voice lives inside the
// audio callback. Every voice operation is a timestamped request, so pushing
// one never waits on the render thread.

use crate::synth::params::SynthParams;
use crate::synth::voice::NoteTrigger;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceCommand {
    Trigger(NoteTrigger),
    UpdateParams(SynthParams),
    Silence { at: f64 },
}
