//! obs-websocket (protocol v4) transport
//!
//! Requests are JSON text frames carrying `request-type` and `message-id`;
//! the matching response echoes the `message-id` and a `status` of `ok` or
//! `error`. Event frames (`update-type`) arriving in between are ignored.

use super::auth::auth_response;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use std::time::Duration;
use switchboard_core::domain::config::ControllerConfig;
use switchboard_core::domain::session::{Result, RpcChannel, SessionError};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, trace};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket channel to an OBS instance
pub struct ObsWebSocket {
    url: String,
    password: Option<String>,
    request_timeout: Duration,
    socket: Option<Socket>,
    next_message_id: u64,
}

impl ObsWebSocket {
    pub fn new(url: impl Into<String>, password: Option<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            password,
            request_timeout,
            socket: None,
            next_message_id: 1,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.url(), config.password.clone(), config.request_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn authenticate(&mut self) -> Result<()> {
        let status = self.request("GetAuthRequired", Value::Null).await?;
        if !status.get("authRequired").and_then(Value::as_bool).unwrap_or(false) {
            debug!("Controller does not require authentication");
            return Ok(());
        }

        let password = self.password.clone().ok_or_else(|| {
            SessionError::Transport("controller requires a password but none is configured".to_string())
        })?;
        let field = |name: &str| {
            status
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| SessionError::Protocol(format!("GetAuthRequired response has no {name}")))
        };
        let salt = field("salt")?;
        let challenge = field("challenge")?;

        self.request(
            "Authenticate",
            json!({ "auth": auth_response(&password, &salt, &challenge) }),
        )
        .await?;
        info!("Authenticated with controller");
        Ok(())
    }

    async fn exchange(&mut self, frame: String, message_id: &str, command: &str) -> Result<Value> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| SessionError::Transport("not connected".to_string()))?;

        socket
            .send(Message::Text(frame))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        loop {
            let message = match socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(SessionError::Transport(e.to_string())),
                None => return Err(SessionError::Transport("connection closed".to_string())),
            };

            match message {
                Message::Text(text) => {
                    if let Some(response) = decode_response(&text, message_id, command)? {
                        return response;
                    }
                }
                Message::Close(frame) => {
                    return Err(SessionError::Transport(format!(
                        "connection closed by controller: {:?}",
                        frame
                    )))
                }
                other => trace!("Ignoring non-text frame: {:?}", other),
            }
        }
    }
}

/// Build a request frame from a command and an object (or null) payload
pub fn encode_request(command: &str, message_id: &str, payload: Value) -> Result<String> {
    let mut fields = match payload {
        Value::Object(fields) => fields,
        Value::Null => Map::new(),
        other => {
            return Err(SessionError::Protocol(format!(
                "{command} payload must be an object, got {other}"
            )))
        }
    };
    fields.insert("request-type".to_string(), Value::String(command.to_string()));
    fields.insert("message-id".to_string(), Value::String(message_id.to_string()));
    Ok(Value::Object(fields).to_string())
}

/// Decode one incoming frame.
///
/// Returns `Ok(None)` for frames that are not the response to `message_id`
/// (events, responses to other requests).
pub fn decode_response(text: &str, message_id: &str, command: &str) -> Result<Option<Result<Value>>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| SessionError::Protocol(format!("invalid JSON frame: {e}")))?;

    if value.get("update-type").is_some() {
        trace!("Ignoring event frame");
        return Ok(None);
    }
    if value.get("message-id").and_then(Value::as_str) != Some(message_id) {
        return Ok(None);
    }

    let response = match value.get("status").and_then(Value::as_str) {
        Some("ok") => Ok(value),
        Some("error") => Err(SessionError::Remote {
            command: command.to_string(),
            message: value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        }),
        _ => Err(SessionError::Protocol(format!(
            "{command} response has no valid status"
        ))),
    };
    Ok(Some(response))
}

#[async_trait]
impl RpcChannel for ObsWebSocket {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn open(&mut self) -> Result<()> {
        let (socket, _) = timeout(self.request_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| SessionError::Transport(format!("timed out connecting to {}", self.url)))?
            .map_err(|e| SessionError::Transport(format!("{}: {}", self.url, e)))?;
        self.socket = Some(socket);

        if let Err(e) = self.authenticate().await {
            self.socket = None;
            return Err(e);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut socket) = self.socket.take() {
            socket
                .close(None)
                .await
                .map_err(|e| SessionError::Transport(e.to_string()))?;
        }
        Ok(())
    }

    async fn request(&mut self, command: &str, payload: Value) -> Result<Value> {
        let message_id = self.next_message_id.to_string();
        self.next_message_id += 1;

        let frame = encode_request(command, &message_id, payload)?;
        debug!(command, message_id = %message_id, "Sending request");

        timeout(self.request_timeout, self.exchange(frame, &message_id, command))
            .await
            .map_err(|_| {
                SessionError::Transport(format!(
                    "{command} timed out after {:?}",
                    self.request_timeout
                ))
            })?
    }
}
