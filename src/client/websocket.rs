#![forbid(unsafe_code)]

// WebSocket connector for the JSON client gateway

use super::protocol::{ClientMessage, ServerMessage};
use super::{ClientError, ClientEvent, ClientHandle, Connection, Connector, Control, Vec3};
use crate::session::SessionConfig;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::RwLock as StdRwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Bounded outbound queue per client.
/// Behavior ticks produce at most a handful of frames per second; anything queued
/// beyond this means the gateway stopped draining.
const CHANNEL_CAPACITY: usize = 64;

/// Inbound lifecycle events buffered per client.
const EVENT_CAPACITY: usize = 32;

type WsRead = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Opens one gateway WebSocket per session
#[derive(Debug, Clone)]
pub struct WsConnector {
    gateway_path: String,
}

impl WsConnector {
    pub fn new(gateway_path: impl Into<String>) -> Self {
        let mut gateway_path = gateway_path.into();
        if !gateway_path.starts_with('/') {
            gateway_path.insert(0, '/');
        }
        Self { gateway_path }
    }

    pub fn url_for(&self, config: &SessionConfig) -> String {
        format!("ws://{}:{}{}", config.host, config.port, self.gateway_path)
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new("/")
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, config: &SessionConfig) -> Result<Connection, ClientError> {
        let url = self.url_for(config);
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Connect(format!("{url}: {e}")))?;

        debug!("{}: Gateway connected at {}", config.identity, url);

        let (mut write, read) = ws_stream.split();

        let hello = serde_json::to_string(&ClientMessage::Hello {
            username: config.identity.clone(),
            version: config.protocol_version.clone(),
        })?;
        write
            .send(Message::Text(hello.into()))
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;

        let (tx, mut rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let writer_identity = config.identity.clone();
        let writer = tokio::spawn(async move {
            while let Some(json) = rx.recv().await {
                if write.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
            debug!("{}: Gateway writer finished", writer_identity);
        });

        let position = Arc::new(StdRwLock::new(None));
        let (events_tx, events) = mpsc::channel(EVENT_CAPACITY);
        let reader = tokio::spawn(read_loop(
            read,
            events_tx,
            position.clone(),
            config.identity.clone(),
        ));

        let handle = WsClient {
            outbound: tx,
            position,
            reader,
            _writer: writer,
        };

        Ok(Connection {
            handle: Arc::new(handle),
            events,
        })
    }
}

/// Pumps gateway frames into lifecycle events until the socket or the session goes away.
async fn read_loop(
    mut read: WsRead,
    events: mpsc::Sender<ClientEvent>,
    position: Arc<StdRwLock<Option<Vec3>>>,
    identity: String,
) {
    let last = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                let msg = match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("{}: Unparseable gateway frame: {}", identity, e);
                        continue;
                    }
                };
                if let Some(p) = msg.position() {
                    *position.write().unwrap_or_else(|e| e.into_inner()) = Some(p);
                }
                let ended = matches!(msg, ServerMessage::End { .. });
                if let Some(event) = msg.into_event() {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
                if ended {
                    return;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "connection closed".to_string());
                break ClientEvent::End { reason };
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break ClientEvent::Error { message: e.to_string() },
            None => break ClientEvent::End { reason: "connection closed".to_string() },
        }
    };
    let _ = events.send(last).await;
}

/// Live gateway client. Dropping it closes the socket.
struct WsClient {
    outbound: mpsc::Sender<String>,
    position: Arc<StdRwLock<Option<Vec3>>>,
    reader: JoinHandle<()>,
    _writer: JoinHandle<()>,
}

impl WsClient {
    fn send(&self, msg: &ClientMessage) -> Result<(), ClientError> {
        let json = serde_json::to_string(msg)?;
        self.outbound.try_send(json).map_err(|e| match e {
            TrySendError::Full(_) => ClientError::Backpressure,
            TrySendError::Closed(_) => ClientError::Closed,
        })
    }
}

impl ClientHandle for WsClient {
    fn look_at(&self, point: Vec3, immediate: bool) -> Result<(), ClientError> {
        self.send(&ClientMessage::LookAt {
            x: point.x,
            y: point.y,
            z: point.z,
            immediate,
        })
    }

    fn set_control_state(&self, control: Control, engaged: bool) -> Result<(), ClientError> {
        self.send(&ClientMessage::ControlState { control, engaged })
    }

    fn chat(&self, text: &str) -> Result<(), ClientError> {
        self.send(&ClientMessage::Chat { message: text.to_string() })
    }

    fn position(&self) -> Option<Vec3> {
        *self.position.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        // The writer drains and closes on its own once `outbound` is gone.
        self.reader.abort();
    }
}
