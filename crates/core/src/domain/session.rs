//! Remote controller session
//!
//! [`ControlSession`] owns one RPC channel to the controller and connects on
//! demand, so callers never sequence `connect` and `call` by hand.

use crate::domain::device::NativeId;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors raised by the RPC channel or by response decoding
#[derive(Debug, Error)]
pub enum SessionError {
    /// Channel unreachable, closed, or timed out
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response did not have the expected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Controller answered the request with an error status
    #[error("{command} failed: {message}")]
    Remote { command: String, message: String },
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Request/response channel to the remote controller
#[async_trait]
pub trait RpcChannel: Send {
    /// Open the underlying connection (including any handshake)
    async fn open(&mut self) -> Result<()>;

    /// Close the underlying connection
    async fn close(&mut self) -> Result<()>;

    /// Send a named command and wait for its response payload
    async fn request(&mut self, command: &str, payload: Value) -> Result<Value>;
}

/// Connection state of a [`ControlSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Current device assignment of one remote source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSourceState {
    pub source_name: String,
    pub device_id: NativeId,
}

const GET_SPECIAL_SOURCES: &str = "GetSpecialSources";
const GET_SOURCE_SETTINGS: &str = "GetSourceSettings";
const SET_SOURCE_SETTINGS: &str = "SetSourceSettings";

/// Fields added by the transport to every response
const TRANSPORT_FIELDS: &[&str] = &["status", "message-id", "error"];

/// Lazily connected session to the remote controller
pub struct ControlSession<C: RpcChannel> {
    channel: C,
    state: SessionState,
}

impl<C: RpcChannel> ControlSession<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Connect if not already connected
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == SessionState::Connected {
            return Ok(());
        }
        self.state = SessionState::Connecting;
        match self.channel.open().await {
            Ok(()) => {
                self.state = SessionState::Connected;
                info!("Controller connection established");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    /// Disconnect if connected; a no-op otherwise
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        self.state = SessionState::Disconnected;
        self.channel.close().await?;
        info!("Controller disconnected");
        Ok(())
    }

    /// Send a command, connecting first when needed
    pub async fn call(&mut self, command: &str, payload: Value) -> Result<Value> {
        self.connect().await?;
        debug!(command, "Controller request");
        let response = self.channel.request(command, payload).await;
        if let Err(SessionError::Transport(e)) = &response {
            // The channel is unusable after a transport failure
            warn!(command, error = %e, "Controller connection lost, closing");
            self.state = SessionState::Disconnected;
            if let Err(close_err) = self.channel.close().await {
                debug!(error = %close_err, "Closing a failed channel also failed");
            }
        }
        response
    }

    /// Map of special source role (e.g. `mic-1`) to source name
    #[instrument(skip(self))]
    pub async fn special_sources(&mut self) -> Result<BTreeMap<String, String>> {
        let response = self.call(GET_SPECIAL_SOURCES, Value::Null).await?;
        let Value::Object(fields) = response else {
            return Err(SessionError::Protocol(format!(
                "{GET_SPECIAL_SOURCES} returned a non-object response"
            )));
        };

        Ok(fields
            .into_iter()
            .filter(|(key, _)| !TRANSPORT_FIELDS.contains(&key.as_str()))
            .filter_map(|(role, name)| match name {
                Value::String(name) => Some((role, name)),
                _ => None,
            })
            .collect())
    }

    /// Source name currently assigned to a special source role
    pub async fn source_name_for_role(&mut self, role: &str) -> Result<String> {
        self.special_sources()
            .await?
            .remove(role)
            .ok_or_else(|| {
                SessionError::Protocol(format!("controller has no special source '{role}'"))
            })
    }

    /// Device id currently configured on a source
    #[instrument(skip(self))]
    pub async fn source_device_id(&mut self, source_name: &str) -> Result<NativeId> {
        let response = self
            .call(GET_SOURCE_SETTINGS, json!({ "sourceName": source_name }))
            .await?;

        response
            .get("sourceSettings")
            .and_then(|settings| settings.get("device_id"))
            .and_then(Value::as_str)
            .map(NativeId::new)
            .ok_or_else(|| {
                SessionError::Protocol(format!(
                    "source '{source_name}' has no sourceSettings.device_id"
                ))
            })
    }

    /// Assign a device to a source. The new value is not read back.
    #[instrument(skip(self))]
    pub async fn set_source_device_id(&mut self, source_name: &str, device_id: &NativeId) -> Result<()> {
        let mut settings = Map::new();
        settings.insert("device_id".to_string(), Value::String(device_id.as_str().to_string()));

        self.call(
            SET_SOURCE_SETTINGS,
            json!({ "sourceName": source_name, "sourceSettings": settings }),
        )
        .await?;
        Ok(())
    }

    /// Current device id of every special source, keyed by role
    pub async fn source_states(&mut self) -> Result<BTreeMap<String, RemoteSourceState>> {
        let mut states = BTreeMap::new();
        for (role, source_name) in self.special_sources().await? {
            let device_id = self.source_device_id(&source_name).await?;
            states.insert(role, RemoteSourceState { source_name, device_id });
        }
        Ok(states)
    }
}
