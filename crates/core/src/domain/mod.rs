//! Domain entities and business rules

pub mod config;
pub mod device;
pub mod directory;
pub mod session;
pub mod sync;

pub use config::{ConfigError, ControllerConfig, DefaultsConfig, Route, RouteConfig, RouteEntry, SwitchboardConfig};
pub use device::{
    DefaultsContext, DeviceError, DeviceQuery, DeviceRecord, DeviceSpec, Direction, HostAudio,
    NativeId, Resolved,
};
pub use directory::{DeviceDirectory, Lookup};
pub use session::{ControlSession, RemoteSourceState, RpcChannel, SessionError, SessionState};
pub use sync::{RouteOutcome, SourceAssignment, SourceReport, SyncDriver, SyncError, SyncSummary};
