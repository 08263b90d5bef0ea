#![forbid(unsafe_code)]

// Outcome reporter - ordered per-session login results and the end-of-run summary

use crate::metrics::MetricsSnapshot;
use crate::session::{LoginResult, SessionError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "camelCase")]
pub enum Outcome {
    Success,
    Failure(SessionError),
}

impl From<LoginResult> for Outcome {
    fn from(result: LoginResult) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failure(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub identity: String,
    pub outcome: Outcome,
}

/// Append-only log of login outcomes. Purely observational.
#[derive(Debug, Default)]
pub struct OutcomeReporter {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl OutcomeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the outcome and print its console line.
    pub fn record_outcome(&self, identity: &str, result: &LoginResult) {
        match result {
            Ok(()) => println!("Bot {identity} created successfully"),
            Err(e) => println!("Failed to create bot {identity}: {e}"),
        }

        let record = OutcomeRecord {
            identity: identity.to_string(),
            outcome: Outcome::from(result.clone()),
        };
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// End-of-run totals
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmSummary {
    pub run_id: Uuid,
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures_by_kind: BTreeMap<String, usize>,
    pub metrics: MetricsSnapshot,
    pub outcomes: Vec<OutcomeRecord>,
}

impl SwarmSummary {
    pub fn new(run_id: Uuid, requested: usize, outcomes: Vec<OutcomeRecord>, metrics: MetricsSnapshot) -> Self {
        let mut failures_by_kind = BTreeMap::new();
        let mut succeeded = 0;
        for record in &outcomes {
            match &record.outcome {
                Outcome::Success => succeeded += 1,
                Outcome::Failure(e) => *failures_by_kind.entry(e.kind().to_string()).or_insert(0) += 1,
            }
        }

        Self {
            run_id,
            requested,
            succeeded,
            failed: outcomes.len() - succeeded,
            failures_by_kind,
            metrics,
            outcomes,
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Swarm Summary ===");
        println!("Run: {}", self.run_id);
        println!("Bots Requested: {}", self.requested);
        println!("Logged In: {}", self.succeeded);
        println!("Failed: {}", self.failed);
        for (kind, count) in &self.failures_by_kind {
            println!("  {kind}: {count}");
        }
        println!("\nActivity:");
        println!("  Movement Ticks: {}", self.metrics.moves);
        println!("  Chat Messages: {}", self.metrics.chats);
        println!("  Ended After Login: {}", self.metrics.terminated_after_login);
        println!("=====================\n");
    }
}
