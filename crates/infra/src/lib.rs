//! Switchboard adapters: host audio enumeration and controller transport

pub mod audio;
pub mod remote;

pub use audio::CpalHost;
pub use remote::ObsWebSocket;
