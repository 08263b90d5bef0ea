#![forbid(unsafe_code)]

// Run metrics — lock-free AtomicU64 counters shared by every session of a swarm.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Arc;

/// Swarm-wide counters. Cloning shares the same underlying counters.
#[derive(Clone, Default)]
pub struct SwarmMetrics {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    // Monotonic counters
    sessions_started: AtomicU64,
    logins: AtomicU64,
    login_failures: AtomicU64,
    terminated_after_login: AtomicU64,
    moves: AtomicU64,
    chats: AtomicU64,

    // Gauge
    sessions_active: AtomicU64,
}

/// Point-in-time copy of [`SwarmMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub logins: u64,
    pub login_failures: u64,
    pub terminated_after_login: u64,
    pub moves: u64,
    pub chats: u64,
    pub sessions_active: u64,
}

impl SwarmMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Counter increments ---

    pub fn inc_sessions_started(&self) {
        self.inner.sessions_started.fetch_add(1, Relaxed);
    }

    pub fn inc_logins(&self) {
        self.inner.logins.fetch_add(1, Relaxed);
    }

    pub fn inc_login_failures(&self) {
        self.inner.login_failures.fetch_add(1, Relaxed);
    }

    pub fn inc_terminated_after_login(&self) {
        self.inner.terminated_after_login.fetch_add(1, Relaxed);
    }

    pub fn inc_moves(&self) {
        self.inner.moves.fetch_add(1, Relaxed);
    }

    pub fn inc_chats(&self) {
        self.inner.chats.fetch_add(1, Relaxed);
    }

    // --- Gauge ---

    /// Increments sessions_active and returns an RAII guard that decrements on drop.
    /// The gauge stays correct even if a session task panics.
    pub fn session_active_guard(&self) -> ActiveSessionGuard {
        self.inner.sessions_active.fetch_add(1, Relaxed);
        ActiveSessionGuard { inner: self.inner.clone() }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let i = &self.inner;
        MetricsSnapshot {
            sessions_started: i.sessions_started.load(Relaxed),
            logins: i.logins.load(Relaxed),
            login_failures: i.login_failures.load(Relaxed),
            terminated_after_login: i.terminated_after_login.load(Relaxed),
            moves: i.moves.load(Relaxed),
            chats: i.chats.load(Relaxed),
            sessions_active: i.sessions_active.load(Relaxed),
        }
    }

    /// One-line console status.
    pub fn status_line(&self) -> String {
        let s = self.snapshot();
        format!(
            "active={} started={} logged_in={} failed={} ended_after_login={} moves={} chats={}",
            s.sessions_active,
            s.sessions_started,
            s.logins,
            s.login_failures,
            s.terminated_after_login,
            s.moves,
            s.chats,
        )
    }
}

/// RAII guard that decrements `sessions_active` on drop.
pub struct ActiveSessionGuard {
    inner: Arc<Inner>,
}

impl Drop for ActiveSessionGuard {
    fn drop(&mut self) {
        self.inner.sessions_active.fetch_sub(1, Relaxed);
    }
}
