#![forbid(unsafe_code)]

// Scripted in-memory connector for tests - replays timed events, records control calls

use super::{ClientError, ClientEvent, ClientHandle, Connection, Connector, Control, Vec3};
use crate::session::SessionConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Control operations observed by a [`FakeClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCall {
    LookAt(Vec3),
    Control(Control, bool),
    Chat(String),
}

/// What a scripted identity does once connected
#[derive(Debug, Clone)]
pub enum Script {
    /// Connect fails outright
    Refuse(String),
    /// Deliver each event after waiting its delay (relative to the previous one)
    Events(Vec<(Duration, ClientEvent)>),
}

impl Script {
    pub fn login() -> Self {
        Script::Events(vec![(Duration::ZERO, ClientEvent::Login)])
    }

    pub fn spawn_then_login() -> Self {
        Script::Events(vec![
            (Duration::ZERO, ClientEvent::Spawn),
            (Duration::ZERO, ClientEvent::Login),
        ])
    }
}

#[derive(Default)]
pub struct FakeClient {
    pub calls: Mutex<Vec<ControlCall>>,
    pub position: Mutex<Option<Vec3>>,
}

impl FakeClient {
    pub fn at(position: Vec3) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            position: Mutex::new(Some(position)),
        }
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&ControlCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(*c)).count()
    }
}

impl ClientHandle for FakeClient {
    fn look_at(&self, point: Vec3, _immediate: bool) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(ControlCall::LookAt(point));
        Ok(())
    }

    fn set_control_state(&self, control: Control, engaged: bool) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(ControlCall::Control(control, engaged));
        Ok(())
    }

    fn chat(&self, text: &str) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(ControlCall::Chat(text.to_string()));
        Ok(())
    }

    fn position(&self) -> Option<Vec3> {
        *self.position.lock().unwrap()
    }
}

/// Identities without a script log in immediately.
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<HashMap<String, Script>>,
    clients: Mutex<HashMap<String, Arc<FakeClient>>>,
    connects: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, identity: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(identity.to_string(), script);
        self
    }

    pub fn client(&self, identity: &str) -> Option<Arc<FakeClient>> {
        self.clients.lock().unwrap().get(identity).cloned()
    }

    /// Identities in the order `connect` was called.
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, config: &SessionConfig) -> Result<Connection, ClientError> {
        self.connects.lock().unwrap().push(config.identity.clone());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&config.identity)
            .cloned()
            .unwrap_or_else(Script::login);

        let events = match script {
            Script::Refuse(reason) => return Err(ClientError::Connect(reason)),
            Script::Events(events) => events,
        };

        let client = Arc::new(FakeClient::at(Vec3::new(0.0, 64.0, 0.0)));
        self.clients
            .lock()
            .unwrap()
            .insert(config.identity.clone(), client.clone());

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for (delay, event) in events {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            // Keep the channel open: a finished script is a quiet, still-connected client.
            tx.closed().await;
        });

        Ok(Connection { handle: client, events: rx })
    }
}
