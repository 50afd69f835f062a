// Synth module - The monophonic voice and its building blocks

pub mod automation;
pub mod filter;
pub mod oscillator;
pub mod params;
pub mod pitch;
pub mod voice;
