#![forbid(unsafe_code)]

// Swarm controller - staggered, sequential session creation with background sessions

pub mod report;

pub use report::{Outcome, OutcomeRecord, OutcomeReporter, SwarmSummary};

use crate::client::Connector;
use crate::session::{start_session, SessionConfig, SessionHandle, SessionOptions};
use std::future::{self, Future};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Where the swarm connects and which protocol version it claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub protocol_version: String,
}

impl Target {
    pub fn session_config(&self, identity: String) -> SessionConfig {
        SessionConfig {
            identity,
            host: self.host.clone(),
            port: self.port,
            protocol_version: self.protocol_version.clone(),
        }
    }
}

pub fn identity_for(index: usize) -> String {
    format!("Bot{index}")
}

/// Result of the creation phase
#[derive(Debug, Clone)]
pub struct SwarmRun {
    pub requested_count: usize,
    pub completed: Vec<OutcomeRecord>,
}

/// Why [`Fleet::hold_until`] stopped holding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldExit {
    Signal,
    HoldElapsed,
    AllTerminated,
}

/// Sessions left running in the background once their login settled
pub struct Fleet {
    sessions: Vec<SessionHandle>,
}

impl Fleet {
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.sessions.iter().filter(|s| !s.is_terminated()).count()
    }

    /// Wait until every session has terminated.
    pub async fn all_terminated(&mut self) {
        for session in &mut self.sessions {
            session.terminated().await;
        }
    }

    pub fn shutdown_all(&self) {
        for session in &self.sessions {
            session.shutdown();
        }
    }

    pub async fn join_all(self) {
        for session in self.sessions {
            session.join().await;
        }
    }

    /// Keep the fleet running until `stop` resolves, `hold` elapses, or every
    /// session has ended, whichever comes first. `None` holds indefinitely.
    pub async fn hold_until<F>(&mut self, hold: Option<Duration>, stop: F) -> HoldExit
    where
        F: Future<Output = ()>,
    {
        let hold_timer = async {
            match hold {
                Some(duration) => sleep(duration).await,
                None => future::pending::<()>().await,
            }
        };

        let exit = tokio::select! {
            biased;
            _ = stop => HoldExit::Signal,
            _ = hold_timer => HoldExit::HoldElapsed,
            _ = self.all_terminated() => HoldExit::AllTerminated,
        };

        match exit {
            HoldExit::Signal => info!("Stop requested, {} live sessions", self.live_count()),
            HoldExit::HoldElapsed => info!("Hold time elapsed, {} live sessions", self.live_count()),
            HoldExit::AllTerminated => info!("Every session has ended"),
        }
        exit
    }

    /// Shut every session down and wait up to `grace` for their tasks.
    /// Returns false if some session was still running when the grace ran out.
    pub async fn stop(self, grace: Duration) -> bool {
        self.shutdown_all();
        if timeout(grace, self.join_all()).await.is_err() {
            warn!("Sessions did not stop within {}ms", grace.as_millis());
            return false;
        }
        true
    }
}

/// Creates sessions one at a time.
///
/// Each session is started, its login awaited, the outcome recorded, and then the
/// stagger delay elapses before the next identity is created. The controller never
/// waits on a session's lifetime; logged-in sessions keep running in the [`Fleet`].
pub struct SwarmController {
    connector: Arc<dyn Connector>,
    target: Target,
    stagger: Duration,
    options: SessionOptions,
    reporter: Arc<OutcomeReporter>,
}

impl SwarmController {
    pub fn new(
        connector: Arc<dyn Connector>,
        target: Target,
        stagger: Duration,
        options: SessionOptions,
        reporter: Arc<OutcomeReporter>,
    ) -> Self {
        Self {
            connector,
            target,
            stagger,
            options,
            reporter,
        }
    }

    pub fn reporter(&self) -> &Arc<OutcomeReporter> {
        &self.reporter
    }

    /// Attempt `count` sessions (`Bot1..=BotN`). Session failures are recorded, never propagated.
    pub async fn run(&self, count: usize) -> (SwarmRun, Fleet) {
        let mut completed = Vec::with_capacity(count);
        let mut sessions = Vec::with_capacity(count);

        for i in 1..=count {
            let identity = identity_for(i);
            let config = self.target.session_config(identity.clone());

            info!("Creating {} ({}/{})", identity, i, count);
            let mut session = start_session(self.connector.clone(), config, self.options.clone());
            let result = session.login().await;

            self.reporter.record_outcome(&identity, &result);
            completed.push(OutcomeRecord {
                identity,
                outcome: Outcome::from(result),
            });
            sessions.push(session);

            // The stagger after the last session would only delay the caller.
            if i < count {
                debug!("Waiting {}ms before creating the next bot", self.stagger.as_millis());
                sleep(self.stagger).await;
            }
        }

        let run = SwarmRun {
            requested_count: count,
            completed,
        };
        (run, Fleet { sessions })
    }
}
