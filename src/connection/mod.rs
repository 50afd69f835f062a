// Connection - Health of the audio stream and the MIDI port

pub mod status;

pub use status::{DeviceStatus, OutputHealth};
