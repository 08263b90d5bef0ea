#![forbid(unsafe_code)]

// Session - one virtual client's lifecycle, driven by client events on its own task

mod latch;
pub mod state;

pub use latch::{LoginLatch, LoginResult};
pub use state::{Action, SessionMachine, SessionState, Termination, TerminationCause};

use crate::behavior::{BehaviorConfig, BehaviorLoop};
use crate::client::{ClientEvent, Connection, Connector};
use crate::metrics::SwarmMetrics;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection parameters for one session. Identity doubles as the in-game name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub identity: String,
    pub host: String,
    pub port: u16,
    pub protocol_version: String,
}

/// Reasons a session's login phase failed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("kicked: {0}")]
    Kicked(String),

    #[error("disconnected: {0}")]
    Disconnected(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Connection(_) => "connection",
            SessionError::Kicked(_) => "kicked",
            SessionError::Disconnected(_) => "disconnected",
            SessionError::Protocol(_) => "protocol",
        }
    }
}

/// Per-session knobs shared by every session of a run
#[derive(Clone, Default)]
pub struct SessionOptions {
    /// `None` runs login-only sessions with no movement or chat
    pub behavior: Option<BehaviorConfig>,
    pub metrics: SwarmMetrics,
}

/// Controller-side view of a running session.
///
/// `login()` resolves when the login phase settles; the session itself keeps running
/// on its own task until the server ends it or `shutdown()` is called.
pub struct SessionHandle {
    identity: String,
    login: Option<oneshot::Receiver<LoginResult>>,
    outcome: Option<LoginResult>,
    state: watch::Receiver<SessionState>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Wait for the login phase to settle. Later calls return the same result.
    pub async fn login(&mut self) -> LoginResult {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        let result = match self.login.as_mut() {
            Some(rx) => rx.await.unwrap_or_else(|_| {
                Err(SessionError::Disconnected("session task ended before login".to_string()))
            }),
            None => Err(SessionError::Disconnected("login already consumed".to_string())),
        };

        self.login = None;
        self.outcome = Some(result.clone());
        result
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == SessionState::Terminated
    }

    /// Wait until the session reaches `Terminated`.
    pub async fn terminated(&mut self) {
        // A closed channel means the driver is gone, which only happens after termination.
        let _ = self.state.wait_for(|s| *s == SessionState::Terminated).await;
    }

    /// Ask the session to disconnect. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the session task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("{}: Session task failed: {}", self.identity, e);
        }
    }
}

/// Start a session on its own task and return immediately.
pub fn start_session(
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    options: SessionOptions,
) -> SessionHandle {
    let (latch, login_rx) = LoginLatch::new();
    let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
    let shutdown = CancellationToken::new();
    let identity = config.identity.clone();

    let task = tokio::spawn(drive(
        connector,
        config,
        options,
        latch,
        state_tx,
        shutdown.clone(),
    ));

    SessionHandle {
        identity,
        login: Some(login_rx),
        outcome: None,
        state: state_rx,
        shutdown,
        task,
    }
}

async fn drive(
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    options: SessionOptions,
    mut latch: LoginLatch,
    state_tx: watch::Sender<SessionState>,
    shutdown: CancellationToken,
) {
    let identity = config.identity.clone();
    let metrics = options.metrics.clone();
    metrics.inc_sessions_started();
    let _active = metrics.session_active_guard();

    let connected = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            warn!("{} stopped before connecting", identity);
            metrics.inc_login_failures();
            state_tx.send_replace(SessionState::Terminated);
            latch.settle(Err(SessionError::Disconnected("shutdown requested".to_string())));
            return;
        }
        result = connector.connect(&config) => result,
    };

    let Connection { handle, mut events } = match connected {
        Ok(connection) => connection,
        Err(e) => {
            warn!("{} could not connect to {}:{}: {}", identity, config.host, config.port, e);
            metrics.inc_login_failures();
            state_tx.send_replace(SessionState::Terminated);
            latch.settle(Err(SessionError::Connection(e.to_string())));
            return;
        }
    };

    debug!("{}: Connected, awaiting login", identity);

    let mut machine = SessionMachine::new();
    let behavior_token = shutdown.child_token();
    let mut behavior: Option<BehaviorLoop> = None;

    loop {
        let action = tokio::select! {
            biased;
            _ = shutdown.cancelled() => machine.shutdown("shutdown requested"),
            event = events.recv() => {
                let event = event.unwrap_or_else(|| ClientEvent::End {
                    reason: "event stream closed".to_string(),
                });
                machine.apply(event)
            }
        };

        match action {
            Action::AttachBehavior => {
                debug!("{} spawned", identity);
                if let Some(behavior_config) = &options.behavior {
                    behavior = Some(BehaviorLoop::attach(
                        &identity,
                        handle.clone(),
                        behavior_config,
                        behavior_token.clone(),
                        metrics.clone(),
                    ));
                }
            }
            Action::SettleLogin => {
                info!("{} logged in", identity);
                if latch.settle(Ok(())) {
                    metrics.inc_logins();
                }
            }
            Action::ObserveChat { from, text } => {
                debug!("{} heard <{}> {}", identity, from, text);
            }
            Action::Terminate(termination) => {
                behavior_token.cancel();
                if let Some(behavior) = behavior.take() {
                    behavior.cancel();
                }

                match termination.cause {
                    TerminationCause::Kicked => warn!("{} was kicked: {}", identity, termination.detail),
                    TerminationCause::Disconnected => warn!("{} disconnected: {}", identity, termination.detail),
                    TerminationCause::Errored => error!("{} encountered an error: {}", identity, termination.detail),
                }

                state_tx.send_replace(SessionState::Terminated);
                if latch.settle(Err(termination.to_error())) {
                    metrics.inc_login_failures();
                } else {
                    metrics.inc_terminated_after_login();
                    info!("{}: Session ended after login ({})", identity, termination);
                }
                break;
            }
            Action::Ignore => {
                debug!("{}: Ignoring duplicate event in state {:?}", identity, machine.state());
            }
        }

        state_tx.send_if_modified(|s| {
            let next = machine.state();
            if *s != next {
                *s = next;
                true
            } else {
                false
            }
        });
    }
}
