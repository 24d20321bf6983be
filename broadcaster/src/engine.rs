//! The broadcast poll loop.
//!
//! Each cycle selects up to `query_limit` pending claims, oldest first, and
//! processes them one after another. Never two transfers in flight for the
//! sender account. Per-claim failures are resolved and logged; only a failure
//! to read the pending set counts as a cycle error, and those back off
//! exponentially up to `max_backoff`.
//!
//! Shutdown is observed between claims, never during a submission.

use std::sync::Arc;
use std::time::Duration;

use airdrop_store::ClaimStore;
use airdrop_types::{Claim, ClaimStatus, Clock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::{
    AttemptOutcome, Backoff, BroadcastError, BroadcastObserver, Reconciler, RetryPolicy, Submitter,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    pub query_limit: usize,
    pub max_backoff_ms: u64,
    pub status_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            query_limit: 100,
            max_backoff_ms: 60_000,
            status_retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// What happened to one claim in a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    Completed,
    Failed,
    /// Left pending: the ledger's answer or the status write is outstanding.
    Deferred,
    /// No longer pending when re-read.
    Skipped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub selected: usize,
    pub completed: usize,
    pub failed: usize,
    pub deferred: usize,
    pub skipped: usize,
    /// Shutdown was requested before every selected claim was processed.
    pub interrupted: bool,
}

impl CycleReport {
    fn record(&mut self, outcome: ClaimOutcome) {
        match outcome {
            ClaimOutcome::Completed => self.completed += 1,
            ClaimOutcome::Failed => self.failed += 1,
            ClaimOutcome::Deferred => self.deferred += 1,
            ClaimOutcome::Skipped => self.skipped += 1,
        }
    }
}

pub struct BroadcastEngine {
    store: Arc<dyn ClaimStore>,
    submitter: Arc<Submitter>,
    reconciler: Arc<Reconciler>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn BroadcastObserver>,
    config: EngineConfig,
}

impl BroadcastEngine {
    pub fn new(
        store: Arc<dyn ClaimStore>,
        submitter: Arc<Submitter>,
        reconciler: Arc<Reconciler>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn BroadcastObserver>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            submitter,
            reconciler,
            clock,
            observer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Poll until `shutdown_rx` fires.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut backoff = Backoff::new(
            self.config.poll_interval(),
            Duration::from_millis(self.config.max_backoff_ms),
        );
        tracing::info!(
            poll_interval_ms = self.config.poll_interval_ms,
            query_limit = self.config.query_limit,
            "broadcast engine started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = interval.tick() => {}
            }

            let result = self
                .cycle(|| !matches!(shutdown_rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)))
                .await;
            match result {
                Ok(report) => {
                    backoff.reset();
                    if report.selected > 0 {
                        tracing::info!(
                            selected = report.selected,
                            completed = report.completed,
                            failed = report.failed,
                            deferred = report.deferred,
                            "broadcast cycle finished"
                        );
                    }
                    if report.interrupted {
                        break;
                    }
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "broadcast cycle failed");
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
        tracing::info!("broadcast engine shutting down");
    }

    /// One cycle with no shutdown check.
    pub async fn run_cycle(&self) -> Result<CycleReport, BroadcastError> {
        self.cycle(|| false).await
    }

    async fn cycle(
        &self,
        mut stop_requested: impl FnMut() -> bool,
    ) -> Result<CycleReport, BroadcastError> {
        let batch = self.store.select_pending(self.config.query_limit)?;
        let mut report = CycleReport {
            selected: batch.len(),
            ..CycleReport::default()
        };
        for claim in &batch {
            if stop_requested() {
                report.interrupted = true;
                break;
            }
            report.record(self.process_claim(claim).await);
        }
        self.observer.cycle_finished(report.selected);
        Ok(report)
    }

    /// Drive one claim to a terminal status if its ledger outcome is known.
    pub async fn process_claim(&self, claim: &Claim) -> ClaimOutcome {
        let span = tracing::info_span!(
            "broadcast_attempt",
            nullifier = %claim.nullifier,
            claim_id = %claim.id
        );
        self.process_claim_inner(claim).instrument(span).await
    }

    async fn process_claim_inner(&self, claim: &Claim) -> ClaimOutcome {
        // Held until the status is written.
        let turn = self.submitter.turn().await;
        let current = match self.store.get_by_nullifier(&claim.nullifier) {
            Ok(current) if current.status == ClaimStatus::Pending => current,
            Ok(current) => {
                tracing::debug!(status = %current.status, "claim already resolved");
                return ClaimOutcome::Skipped;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not re-read claim");
                return ClaimOutcome::Skipped;
            }
        };

        let guard = self.reconciler.guard(&current.nullifier);
        let outcome = match &current.attempt_tx_hash {
            Some(attempt) => {
                tracing::info!(tx_hash = %attempt, "claim has an earlier attempt, looking it up");
                self.reconciler.lookup(attempt).await
            }
            None => {
                self.submitter
                    .attempt(&turn, &current, self.store.as_ref(), self.clock.as_ref())
                    .await
            }
        };
        let outcome = match outcome {
            AttemptOutcome::Uncertain { attempt, error } => {
                tracing::warn!(tx_hash = %attempt, error = %error, "broadcast answer lost, looking it up");
                self.reconciler.lookup(&attempt).await
            }
            AttemptOutcome::Superseded(stored) => {
                tracing::debug!(status = %stored.status, "claim taken by another attempt");
                guard.disarm();
                return ClaimOutcome::Skipped;
            }
            other => other,
        };

        match &outcome {
            AttemptOutcome::NotSubmitted(e) => {
                tracing::warn!(error = %e, "transfer not submitted");
            }
            AttemptOutcome::Rejected { code, raw_log } => {
                tracing::warn!(code, raw_log = %raw_log, "transfer rejected by ledger");
            }
            AttemptOutcome::Included { code, raw_log, tx_hash } if *code != 0 => {
                tracing::warn!(code, raw_log = %raw_log, tx_hash = %tx_hash, "transfer failed on ledger");
            }
            AttemptOutcome::Unknown { attempt } => {
                tracing::warn!(tx_hash = %attempt, "ledger has no record of attempt");
            }
            _ => {}
        }

        let Some((status, tx_hash)) = outcome.resolution() else {
            tracing::warn!("ledger unavailable, claim stays pending");
            guard.disarm();
            return ClaimOutcome::Deferred;
        };
        match guard.resolve(status, tx_hash.as_ref()).await {
            Ok(resolved) => {
                tracing::info!(status = %resolved.status, tx_hash = ?resolved.tx_hash, "claim resolved");
                match status {
                    ClaimStatus::Completed => ClaimOutcome::Completed,
                    _ => ClaimOutcome::Failed,
                }
            }
            Err(_) => ClaimOutcome::Deferred,
        }
    }
}
