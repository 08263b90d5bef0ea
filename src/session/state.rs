#![forbid(unsafe_code)]

// Session state machine - pure transition logic, no I/O

use crate::client::ClientEvent;
use serde::Serialize;
use std::fmt;

use super::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Connecting,
    Spawned,
    LoggedIn,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationCause {
    Kicked,
    Disconnected,
    Errored,
}

/// Why a session ended, with the human-readable detail from the event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub cause: TerminationCause,
    pub detail: String,
}

impl Termination {
    pub fn to_error(&self) -> SessionError {
        match self.cause {
            TerminationCause::Kicked => SessionError::Kicked(self.detail.clone()),
            TerminationCause::Disconnected => SessionError::Disconnected(self.detail.clone()),
            TerminationCause::Errored => SessionError::Protocol(self.detail.clone()),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cause {
            TerminationCause::Kicked => write!(f, "kicked: {}", self.detail),
            TerminationCause::Disconnected => write!(f, "disconnected: {}", self.detail),
            TerminationCause::Errored => write!(f, "error: {}", self.detail),
        }
    }
}

/// Side effect the session driver must perform for an event
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// First spawn: start movement and chat
    AttachBehavior,
    /// First login: resolve the login future
    SettleLogin,
    /// Chat from another player; observed only
    ObserveChat { from: String, text: String },
    /// Session is over: cancel behavior, reject the login future if still pending
    Terminate(Termination),
    /// Duplicate or late event
    Ignore,
}

/// Per-session lifecycle machine.
///
/// `Connecting -> Spawned -> LoggedIn` is the success path; any kick, end or error
/// moves to `Terminated`, which absorbs every later event. Spawn and login may arrive
/// in either order; spawn attaches behavior once, login settles once.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    spawned: bool,
    termination: Option<Termination>,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
            spawned: false,
            termination: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn has_spawned(&self) -> bool {
        self.spawned
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn apply(&mut self, event: ClientEvent) -> Action {
        if self.state == SessionState::Terminated {
            return Action::Ignore;
        }

        match event {
            ClientEvent::Spawn => {
                if self.spawned {
                    return Action::Ignore;
                }
                self.spawned = true;
                if self.state == SessionState::Connecting {
                    self.state = SessionState::Spawned;
                }
                Action::AttachBehavior
            }
            ClientEvent::Login => {
                if self.state == SessionState::LoggedIn {
                    return Action::Ignore;
                }
                self.state = SessionState::LoggedIn;
                Action::SettleLogin
            }
            ClientEvent::Chat { from, text } => Action::ObserveChat { from, text },
            ClientEvent::Kicked { reason } => self.terminate(TerminationCause::Kicked, reason),
            ClientEvent::End { reason } => self.terminate(TerminationCause::Disconnected, reason),
            ClientEvent::Error { message } => self.terminate(TerminationCause::Errored, message),
        }
    }

    /// Local termination requested by the harness rather than the server.
    pub fn shutdown(&mut self, detail: &str) -> Action {
        if self.state == SessionState::Terminated {
            return Action::Ignore;
        }
        self.terminate(TerminationCause::Disconnected, detail.to_string())
    }

    fn terminate(&mut self, cause: TerminationCause, detail: String) -> Action {
        let termination = Termination { cause, detail };
        self.state = SessionState::Terminated;
        self.termination = Some(termination.clone());
        Action::Terminate(termination)
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}
