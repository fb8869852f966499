//! Audio device abstractions and domain models
//!
//! This module defines the platform-agnostic view of host audio devices.
//! The cpal-backed enumeration lives in the `infra` crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while enumerating or resolving devices
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No device of the requested direction has this name
    #[error("No {direction} device called '{name}' ({} available)", .available.len())]
    NotFound {
        name: String,
        direction: Direction,
        available: Vec<DeviceRecord>,
    },

    /// More than one device of the requested direction has this name
    #[error("{} {direction} devices are called '{name}'", .candidates.len())]
    Ambiguous {
        name: String,
        direction: Direction,
        candidates: Vec<DeviceRecord>,
    },

    /// A native id was requested for a route but the host does not know it
    #[error("No {direction} device has native id '{id}' ({} available)", .available.len())]
    UnknownNativeId {
        id: NativeId,
        direction: Direction,
        available: Vec<DeviceRecord>,
    },

    /// The host has no default device for this direction
    #[error("No default {0} device")]
    NoDefault(Direction),

    /// Error reported by the OS audio layer
    #[error("OS error: {0}")]
    OsError(String),
}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Direction of a device or a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Filter used when listing devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceQuery {
    Input,
    Output,
    Both,
}

impl From<Direction> for DeviceQuery {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Input => DeviceQuery::Input,
            Direction::Output => DeviceQuery::Output,
        }
    }
}

/// Opaque host identifier for a device
///
/// The literal `"default"` is reserved: it is what the remote controller
/// stores when a source follows the system default device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeId(String);

impl NativeId {
    pub const DEFAULT: &'static str = "default";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn system_default() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One device as reported by a single enumeration call
///
/// Records are snapshots: the OS may hand out different ids after a
/// reconnect, so they must not outlive the pass that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub direction: Direction,
    pub name: String,
    pub native_id: NativeId,
}

impl DeviceRecord {
    pub fn new(direction: Direction, name: impl Into<String>, native_id: impl Into<String>) -> Self {
        Self {
            direction,
            name: name.into(),
            native_id: NativeId::new(native_id),
        }
    }
}

/// Symbolic reference to a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    ByName(String),
    ByNativeId(NativeId),
    Default,
}

impl DeviceSpec {
    const ID_PREFIX: &'static str = "id:";

    /// Parse the device string used in configuration files.
    ///
    /// `default` selects the run's default device, `id:<native id>` pins a
    /// native id and anything else is a display name.
    pub fn parse(value: &str) -> Self {
        if value == NativeId::DEFAULT {
            DeviceSpec::Default
        } else if let Some(id) = value.strip_prefix(Self::ID_PREFIX) {
            DeviceSpec::ByNativeId(NativeId::new(id))
        } else {
            DeviceSpec::ByName(value.to_string())
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::ByName(name) => write!(f, "'{}'", name),
            DeviceSpec::ByNativeId(id) => write!(f, "id '{}'", id),
            DeviceSpec::Default => f.write_str("default"),
        }
    }
}

/// Outcome of resolving a [`DeviceSpec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Device(DeviceRecord),
    /// Leave the remote source on the system default
    Default,
}

impl Resolved {
    /// The id pushed to the remote controller for this outcome
    pub fn native_id(&self) -> NativeId {
        match self {
            Resolved::Device(record) => record.native_id.clone(),
            Resolved::Default => NativeId::system_default(),
        }
    }
}

/// Default device names for one run
///
/// Built once, then only read. Every `default` spec resolves through this
/// value so a run stays consistent even if the OS default changes under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsContext {
    pub default_input_name: String,
    pub default_output_name: String,
}

impl DefaultsContext {
    pub fn new(default_input_name: impl Into<String>, default_output_name: impl Into<String>) -> Self {
        Self {
            default_input_name: default_input_name.into(),
            default_output_name: default_output_name.into(),
        }
    }

    pub fn name_for(&self, direction: Direction) -> &str {
        match direction {
            Direction::Input => &self.default_input_name,
            Direction::Output => &self.default_output_name,
        }
    }
}

/// Host device enumeration
///
/// Every call queries the OS afresh.
pub trait HostAudio: Send + Sync {
    /// All output devices
    fn speakers(&self) -> Result<Vec<DeviceRecord>>;

    /// All input devices
    fn microphones(&self) -> Result<Vec<DeviceRecord>>;

    /// The OS default output device
    fn default_speaker(&self) -> Result<DeviceRecord>;

    /// The OS default input device
    fn default_microphone(&self) -> Result<DeviceRecord>;
}
