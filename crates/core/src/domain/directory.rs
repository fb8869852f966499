//! Device directory
//!
//! Resolves symbolic [`DeviceSpec`]s and remote native ids against the live
//! host device list. Nothing is cached: each lookup enumerates again.

use crate::domain::device::{
    DefaultsContext, DeviceError, DeviceQuery, DeviceRecord, DeviceSpec, Direction, HostAudio,
    NativeId, Resolved, Result,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a reverse lookup from a native id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(DeviceRecord),
    /// The id is the system default sentinel
    Default,
    /// The host does not currently expose a device with this id
    NotFound,
}

/// Direction-aware resolution over a [`HostAudio`] backend
#[derive(Clone)]
pub struct DeviceDirectory {
    host: Arc<dyn HostAudio>,
}

impl DeviceDirectory {
    pub fn new(host: Arc<dyn HostAudio>) -> Self {
        Self { host }
    }

    /// Enumerate devices. `Both` lists outputs followed by inputs.
    pub fn list_devices(&self, query: DeviceQuery) -> Result<Vec<DeviceRecord>> {
        let devices = match query {
            DeviceQuery::Input => self.host.microphones()?,
            DeviceQuery::Output => self.host.speakers()?,
            DeviceQuery::Both => {
                let mut all = self.host.speakers()?;
                all.extend(self.host.microphones()?);
                all
            }
        };
        debug!(?query, count = devices.len(), "Enumerated devices");
        Ok(devices)
    }

    /// Find the single device of `direction` whose display name is `name`.
    ///
    /// Duplicate names are reported as [`DeviceError::Ambiguous`] rather
    /// than resolved to whichever device the OS happened to list first.
    pub fn resolve_by_name(&self, name: &str, direction: Direction) -> Result<DeviceRecord> {
        let available = self.list_devices(direction.into())?;
        let mut matches: Vec<DeviceRecord> = available
            .iter()
            .filter(|d| d.name == name)
            .cloned()
            .collect();

        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => {
                warn!(name, %direction, "Host has no device with this name");
                info!("{}", format_listing(direction, &available, false));
                Err(DeviceError::NotFound {
                    name: name.to_string(),
                    direction,
                    available,
                })
            }
            n => {
                warn!(name, %direction, count = n, "Device name is ambiguous");
                Err(DeviceError::Ambiguous {
                    name: name.to_string(),
                    direction,
                    candidates: matches,
                })
            }
        }
    }

    /// Reverse lookup of a native id across both directions.
    ///
    /// An unknown id is an expected state (unplugged device, id from another
    /// machine) and is returned as [`Lookup::NotFound`], not as an error.
    /// If an output and an input share the id (ALSA `hw:` ids can), the
    /// output wins, since [`DeviceQuery::Both`] lists outputs first.
    pub fn resolve_by_native_id(&self, id: &NativeId) -> Result<Lookup> {
        if id.is_default() {
            return Ok(Lookup::Default);
        }
        let found = self
            .list_devices(DeviceQuery::Both)?
            .into_iter()
            .find(|d| &d.native_id == id);

        Ok(match found {
            Some(record) => Lookup::Found(record),
            None => Lookup::NotFound,
        })
    }

    /// Resolve a spec for a route of the given direction.
    ///
    /// With `replace_default`, a `Default` spec is turned into the concrete
    /// device named by `defaults` for that direction; otherwise it stays the
    /// [`Resolved::Default`] sentinel.
    pub fn resolve_spec(
        &self,
        spec: &DeviceSpec,
        direction: Direction,
        defaults: &DefaultsContext,
        replace_default: bool,
    ) -> Result<Resolved> {
        match spec {
            DeviceSpec::Default if replace_default => self
                .resolve_by_name(defaults.name_for(direction), direction)
                .map(Resolved::Device),
            DeviceSpec::Default => Ok(Resolved::Default),
            DeviceSpec::ByNativeId(id) if id.is_default() => Ok(Resolved::Default),
            DeviceSpec::ByNativeId(id) => {
                let available = self.list_devices(direction.into())?;
                match available.iter().find(|d| &d.native_id == id) {
                    Some(record) => Ok(Resolved::Device(record.clone())),
                    None => {
                        warn!(id = %id, %direction, "Host has no device with this native id");
                        Err(DeviceError::UnknownNativeId {
                            id: id.clone(),
                            direction,
                            available,
                        })
                    }
                }
            }
            DeviceSpec::ByName(name) => self.resolve_by_name(name, direction).map(Resolved::Device),
        }
    }

    /// Build the run's defaults, preferring configured names over the OS.
    ///
    /// The OS is only queried for directions without an override.
    pub fn defaults_from_host(
        &self,
        input_override: Option<&str>,
        output_override: Option<&str>,
    ) -> Result<DefaultsContext> {
        let input = match input_override {
            Some(name) => name.to_string(),
            None => self.host.default_microphone()?.name,
        };
        let output = match output_override {
            Some(name) => name.to_string(),
            None => self.host.default_speaker()?.name,
        };

        info!(input = %input, output = %output, "Default devices for this run");
        Ok(DefaultsContext::new(input, output))
    }

    /// Human-readable listing of outputs then inputs
    pub fn device_listing(&self, with_ids: bool) -> Result<String> {
        let speakers = self.list_devices(DeviceQuery::Output)?;
        let mics = self.list_devices(DeviceQuery::Input)?;

        let mut out = String::new();
        if !speakers.is_empty() {
            out.push_str(&format_listing(Direction::Output, &speakers, with_ids));
        }
        if !mics.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format_listing(Direction::Input, &mics, with_ids));
        }
        Ok(out)
    }
}

/// Format one direction's devices, one per line under a header
pub fn format_listing(direction: Direction, devices: &[DeviceRecord], with_ids: bool) -> String {
    let mut out = format!("Available audio {} devices:", direction);
    if devices.is_empty() {
        out.push_str(" (none)");
    }
    for device in devices {
        if with_ids {
            let _ = write!(out, "\n  ID: '{}' Name: '{}'", device.native_id, device.name);
        } else {
            let _ = write!(out, "\n  {}", device.name);
        }
    }
    out
}
