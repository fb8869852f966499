//! Remote controller transports

pub mod auth;
pub mod obs_websocket;

pub use obs_websocket::ObsWebSocket;
