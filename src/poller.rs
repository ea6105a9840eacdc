//! Poll orchestrator - fetch, decode, reconcile, broadcast on a fixed cadence
//!
//! Each cycle walks `Idle -> Fetching -> Decoding -> Reconciling ->
//! Broadcasting -> Idle`. A failure while fetching or decoding ends the cycle
//! with no state touched. The next cycle starts a fixed delay after the
//! previous one *ended*, so cycles never overlap and a slow fetch delays
//! polling instead of stacking requests.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::source::{Decoder, Source};
use crate::state::{StateActorHandle, StateMap};

/// Phase of a poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Decoding,
    Reconciling,
    Broadcasting,
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Reconciled; `committed` may be empty
    Reconciled,
    FetchFailed(String),
    DecodeFailed(String),
    /// The state actor is gone (shutdown in progress)
    StateUnavailable,
}

/// Result of one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub committed: StateMap,
    pub pending: usize,
}

impl CycleReport {
    fn aborted(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            committed: StateMap::new(),
            pending: 0,
        }
    }
}

/// Poll health shared with the HTTP surface
#[derive(Debug, Default)]
pub struct PollStatus {
    inner: RwLock<PollStatusSnapshot>,
}

/// Copy of the poll health counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStatusSnapshot {
    /// Last time the upstream answered successfully
    pub last_fetch_ok_at: Option<DateTime<Utc>>,
    /// Error of the most recent failed cycle, cleared by a good one
    pub last_error: Option<String>,
    pub cycles: u64,
    pub failures: u64,
}

impl PollStatus {
    pub fn snapshot(&self) -> PollStatusSnapshot {
        self.inner.read().clone()
    }

    fn record_fetch_ok(&self) {
        self.inner.write().last_fetch_ok_at = Some(Utc::now());
    }

    fn record(&self, outcome: &CycleOutcome) {
        let mut inner = self.inner.write();
        inner.cycles += 1;
        match outcome {
            CycleOutcome::Reconciled => inner.last_error = None,
            CycleOutcome::FetchFailed(e) | CycleOutcome::DecodeFailed(e) => {
                inner.failures += 1;
                inner.last_error = Some(e.clone());
            }
            CycleOutcome::StateUnavailable => {
                inner.failures += 1;
                inner.last_error = Some("state actor unavailable".to_string());
            }
        }
    }
}

/// Drives poll cycles against one source
pub struct Poller {
    source: Arc<dyn Source>,
    decoder: Box<dyn Decoder>,
    state: StateActorHandle,
    interval: Duration,
    status: Arc<PollStatus>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn Source>,
        decoder: Box<dyn Decoder>,
        state: StateActorHandle,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            decoder,
            state,
            interval,
            status: Arc::new(PollStatus::default()),
        }
    }

    /// Shared health counters (for `/health`)
    pub fn status(&self) -> Arc<PollStatus> {
        self.status.clone()
    }

    /// Run one full cycle
    pub async fn run_cycle(&self) -> CycleReport {
        let report = self.cycle().await;
        self.status.record(&report.outcome);
        report
    }

    async fn cycle(&self) -> CycleReport {
        trace!(phase = ?CyclePhase::Fetching, source = %self.source.describe());
        let raw = match self.source.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Poll cycle aborted, fetch failed: {}", e);
                return CycleReport::aborted(CycleOutcome::FetchFailed(e.to_string()));
            }
        };
        self.status.record_fetch_ok();

        trace!(phase = ?CyclePhase::Decoding, bytes = raw.len());
        let observed = match self.decoder.decode(&raw) {
            Ok(observed) => observed,
            Err(e) => {
                warn!("Poll cycle aborted, decode failed: {}", e);
                return CycleReport::aborted(CycleOutcome::DecodeFailed(e.to_string()));
            }
        };

        trace!(phase = ?CyclePhase::Reconciling, keys = observed.len());
        let report = match self.state.reconcile(observed).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Poll cycle aborted: {}", e);
                return CycleReport::aborted(CycleOutcome::StateUnavailable);
            }
        };

        if !report.committed.is_empty() {
            trace!(
                phase = ?CyclePhase::Broadcasting,
                recipients = report.recipients
            );
            debug!(
                committed = report.committed.len(),
                pending = report.pending,
                "Poll cycle committed changes"
            );
        }
        trace!(phase = ?CyclePhase::Idle);

        CycleReport {
            outcome: CycleOutcome::Reconciled,
            committed: report.committed,
            pending: report.pending,
        }
    }

    /// Poll until `shutdown` flips to `true` (or its sender is dropped)
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            source = %self.source.describe(),
            interval_ms = self.interval.as_millis() as u64,
            "Poller started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = self.run_cycle() => {}
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(cycles = self.status.snapshot().cycles, "Poller stopped");
    }
}
