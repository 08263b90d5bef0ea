#![forbid(unsafe_code)]

// Gateway protocol - JSON frames exchanged with the client gateway over WebSocket

use super::{ClientEvent, Control, Vec3};
use serde::{Deserialize, Serialize};

/// Harness-to-gateway messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Open a game session under the given name and protocol version
    Hello {
        username: String,
        version: String,
    },
    /// Turn the avatar toward a point
    LookAt {
        x: f64,
        y: f64,
        z: f64,
        immediate: bool,
    },
    /// Engage or release a movement control
    ControlState {
        control: Control,
        engaged: bool,
    },
    /// Say something in public chat
    Chat {
        message: String,
    },
}

/// Gateway-to-harness messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Authentication/handshake finished
    Login,
    /// Avatar exists in the world
    Spawn {
        position: Vec3,
    },
    /// Avatar moved
    Position {
        x: f64,
        y: f64,
        z: f64,
    },
    /// Chat line from another player
    Chat {
        username: String,
        message: String,
    },
    /// Server kicked the client
    Kicked {
        reason: String,
    },
    /// Game session ended
    End {
        reason: String,
    },
    /// Any other client-side failure
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Lifecycle event carried by this frame. Position updates carry none.
    pub fn into_event(self) -> Option<ClientEvent> {
        match self {
            ServerMessage::Login => Some(ClientEvent::Login),
            ServerMessage::Spawn { .. } => Some(ClientEvent::Spawn),
            ServerMessage::Position { .. } => None,
            ServerMessage::Chat { username, message } => Some(ClientEvent::Chat {
                from: username,
                text: message,
            }),
            ServerMessage::Kicked { reason } => Some(ClientEvent::Kicked { reason }),
            ServerMessage::End { reason } => Some(ClientEvent::End { reason }),
            ServerMessage::Error { message } => Some(ClientEvent::Error { message }),
        }
    }

    /// New avatar position reported by this frame, if any.
    pub fn position(&self) -> Option<Vec3> {
        match self {
            ServerMessage::Spawn { position } => Some(*position),
            ServerMessage::Position { x, y, z } => Some(Vec3::new(*x, *y, *z)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_wire_shape() {
        let msg = ClientMessage::Hello {
            username: "Bot1".into(),
            version: "1.21.4".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "hello");
        assert_eq!(json["username"], "Bot1");
        assert_eq!(json["version"], "1.21.4");
    }

    #[test]
    fn test_control_state_wire_shape() {
        let msg = ClientMessage::ControlState { control: Control::Forward, engaged: true };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"controlState","control":"forward","engaged":true}"#);
    }

    #[test]
    fn test_kicked_maps_to_event() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"kicked","reason":"banned"}"#).unwrap();
        assert_eq!(msg.into_event(), Some(ClientEvent::Kicked { reason: "banned".into() }));
    }

    #[test]
    fn test_spawn_carries_position() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"spawn","position":{"x":1.0,"y":64.0,"z":-2.5}}"#).unwrap();
        assert_eq!(msg.position(), Some(Vec3::new(1.0, 64.0, -2.5)));
        assert_eq!(msg.into_event(), Some(ClientEvent::Spawn));
    }

    #[test]
    fn test_position_update_is_not_a_lifecycle_event() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"position","x":0.0,"y":0.0,"z":0.0}"#).unwrap();
        assert!(msg.into_event().is_none());
    }
}
