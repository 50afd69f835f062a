// Configuration - Sequencer settings stored as RON
//
// Default location: `<config dir>/acidstep/config.ron`. A missing file means
// defaults; out-of-range values are clamped on load rather than rejected.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messaging::channels::DEFAULT_COMMAND_CAPACITY;
use crate::sequencer::scheduler::SchedulerTiming;
use crate::sequencer::transport::{DEFAULT_TEMPO, clamp_tempo};
use crate::synth::params::SynthParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Period of the scheduling timer (ms)
    pub tick_interval_ms: u64,
    /// Lookahead window (ms)
    pub schedule_ahead_ms: u64,
    /// Delay before the first step after start (ms)
    pub lead_in_ms: u64,
    pub tempo: f32,
    /// Output gain, 0..1
    pub master_volume: f32,
    /// Capacity of the control -> audio command queue
    pub command_queue_capacity: usize,
    /// Output device name; default device when absent
    pub audio_device: Option<String>,
    /// MIDI output port, by name or index; internal audio only when absent
    pub midi_output: Option<String>,
    /// Knob positions at startup
    pub synth: SynthParams,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 25,
            schedule_ahead_ms: 100,
            lead_in_ms: 100,
            tempo: DEFAULT_TEMPO,
            master_volume: 0.7,
            command_queue_capacity: DEFAULT_COMMAND_CAPACITY,
            audio_device: None,
            midi_output: None,
            synth: SynthParams::default(),
        }
    }
}

impl SequencerConfig {
    /// `<config dir>/acidstep/config.ron`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("acidstep").join("config.ron"))
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from the default location, or defaults if there is none
    pub fn load_default() -> ConfigResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_ron(text: &str) -> ConfigResult<Self> {
        let config: Self = ron::from_str(text)?;
        Ok(config.sanitized())
    }

    pub fn to_ron(&self) -> ConfigResult<String> {
        let pretty = ron::ser::PrettyConfig::default();
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Force every field into its usable range
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        self.tick_interval_ms = self.tick_interval_ms.clamp(1, 1000);
        // The window must outlast a tick or steps would arrive late
        self.schedule_ahead_ms = self
            .schedule_ahead_ms
            .clamp(self.tick_interval_ms + 1, 2000);
        self.lead_in_ms = self.lead_in_ms.min(2000);
        self.tempo = clamp_tempo(self.tempo).unwrap_or(defaults.tempo);
        self.master_volume = if self.master_volume.is_finite() {
            self.master_volume.clamp(0.0, 1.0)
        } else {
            defaults.master_volume
        };
        self.command_queue_capacity = self.command_queue_capacity.clamp(16, 65536);
        self.synth = self.synth.clamped();
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn scheduler_timing(&self) -> SchedulerTiming {
        SchedulerTiming {
            schedule_ahead: self.schedule_ahead_ms as f64 / 1000.0,
            lead_in: self.lead_in_ms as f64 / 1000.0,
        }
    }
}
