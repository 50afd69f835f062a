// Messaging - Control to audio thread communication

pub mod channels;
pub mod command;
