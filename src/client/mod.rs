#![forbid(unsafe_code)]

// Client collaborator - the boundary between the swarm and whatever speaks the game protocol

pub mod protocol;
pub mod websocket;

#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::SessionConfig;

pub use websocket::WsConnector;

/// Errors raised by a client connection or its control operations
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Client channel closed")]
    Closed,

    #[error("Outbound queue full")]
    Backpressure,

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// World-space position of the client's avatar
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Offset on the horizontal plane; y is left untouched.
    pub fn offset_horizontal(self, dx: f64, dz: f64) -> Self {
        Self { x: self.x + dx, y: self.y, z: self.z + dz }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Movement controls a client can hold engaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Control {
    Forward,
}

/// Lifecycle events delivered by a client connection.
///
/// Events arrive in arbitrary interleaving; each occurrence is delivered once.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Spawn,
    Login,
    Chat { from: String, text: String },
    Kicked { reason: String },
    End { reason: String },
    Error { message: String },
}

/// Control surface of a live client
pub trait ClientHandle: Send + Sync {
    fn look_at(&self, point: Vec3, immediate: bool) -> Result<(), ClientError>;

    fn set_control_state(&self, control: Control, engaged: bool) -> Result<(), ClientError>;

    fn chat(&self, text: &str) -> Result<(), ClientError>;

    /// Last known avatar position, `None` until the world has reported one.
    fn position(&self) -> Option<Vec3>;
}

/// An open client: its control handle plus the event stream feeding the session
pub struct Connection {
    pub handle: Arc<dyn ClientHandle>,
    pub events: mpsc::Receiver<ClientEvent>,
}

/// Opens client connections. Calling `connect` begins the handshake.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, config: &SessionConfig) -> Result<Connection, ClientError>;
}
