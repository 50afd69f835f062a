// Audio module - Clocks, DSP helpers, cpal output and offline rendering

pub mod clock;
pub mod device;
pub mod dsp_utils;
pub mod engine;
pub mod export;
pub mod format_conversion;
pub mod parameters;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No audio output device available")]
    NoDevice,

    #[error("Audio output device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to enumerate audio devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Failed to read device configuration: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("Unsupported sample format: {0}. Supported formats: F32, I16, U16")]
    UnsupportedFormat(String),

    #[error("Failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

pub type AudioResult<T> = Result<T, AudioError>;
