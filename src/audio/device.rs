// Audio output device discovery

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use super::{AudioError, AudioResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

pub struct AudioDeviceManager {
    host: Host,
}

impl AudioDeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// List every output device of the default host
    pub fn list_output_devices(&self) -> AudioResult<Vec<AudioDeviceInfo>> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok())
            .unwrap_or_default();

        let devices = self
            .host
            .output_devices()?
            .filter_map(|device| device.name().ok())
            .map(|name| AudioDeviceInfo {
                is_default: name == default_name,
                name,
            })
            .collect();
        Ok(devices)
    }

    /// The named output device, or the host default when `name` is `None`
    pub fn output_device(&self, name: Option<&str>) -> AudioResult<Device> {
        let Some(wanted) = name else {
            return self.host.default_output_device().ok_or(AudioError::NoDevice);
        };

        self.host
            .output_devices()?
            .find(|device| device.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound(wanted.to_string()))
    }
}

impl Default for AudioDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}
