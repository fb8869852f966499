//! CPAL-based host device enumeration
//!
//! Provides the host's speakers and microphones through the CPAL library.

use cpal::traits::{DeviceTrait, HostTrait};
use std::fmt;
use switchboard_core::domain::device::{DeviceError, DeviceRecord, Direction, HostAudio, Result};
use tracing::{debug, info, warn};

/// CPAL-based host enumerator
pub struct CpalHost {
    host: cpal::Host,
}

impl Default for CpalHost {
    fn default() -> Self {
        info!("Initializing CPAL host");
        Self::new()
    }
}

impl CpalHost {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }

    /// Convert a CPAL device into a record, or None if it cannot be described
    fn record(&self, device: &cpal::Device, direction: Direction) -> Option<DeviceRecord> {
        #[allow(deprecated)]
        let name = match device.name() {
            Ok(name) => name,
            Err(e) => {
                warn!("Skipping device without a name: {}", e);
                return None;
            }
        };

        let native_id = match device.id() {
            Ok(id) => native_id(self.host.id().name(), &id.to_string()),
            Err(e) => {
                warn!(device = %name, "Skipping device without an id: {}", e);
                return None;
            }
        };

        Some(DeviceRecord::new(direction, name, native_id))
    }

    fn collect<I>(&self, devices: I, direction: Direction) -> Vec<DeviceRecord>
    where
        I: Iterator<Item = cpal::Device>,
    {
        let records: Vec<DeviceRecord> = devices
            .filter_map(|device| self.record(&device, direction))
            .collect();

        for record in &records {
            debug!("Found {} device: {}", direction, record.name);
        }
        records
    }
}

/// Strip the CPAL host prefix so ids match what the OS (and the remote
/// controller) use, e.g. `wasapi:{0.0.1.00000000}.{...}` -> `{0.0.1.00000000}.{...}`
fn native_id(host_name: &str, cpal_id: &str) -> String {
    let prefix = format!("{}:", host_name.to_lowercase());
    match cpal_id.strip_prefix(&prefix) {
        Some(id) => id.to_string(),
        None => cpal_id.to_string(),
    }
}

impl HostAudio for CpalHost {
    fn speakers(&self) -> Result<Vec<DeviceRecord>> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| DeviceError::OsError(e.to_string()))?;
        Ok(self.collect(devices, Direction::Output))
    }

    fn microphones(&self) -> Result<Vec<DeviceRecord>> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| DeviceError::OsError(e.to_string()))?;
        Ok(self.collect(devices, Direction::Input))
    }

    fn default_speaker(&self) -> Result<DeviceRecord> {
        self.host
            .default_output_device()
            .and_then(|device| self.record(&device, Direction::Output))
            .ok_or(DeviceError::NoDefault(Direction::Output))
    }

    fn default_microphone(&self) -> Result<DeviceRecord> {
        self.host
            .default_input_device()
            .and_then(|device| self.record(&device, Direction::Input))
            .ok_or(DeviceError::NoDefault(Direction::Input))
    }
}

impl fmt::Debug for CpalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalHost")
            .field("host", &self.host.id())
            .finish()
    }
}
