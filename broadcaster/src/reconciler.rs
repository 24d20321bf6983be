//! Terminal status writes and crash recovery.
//!
//! Every claim the engine touches is covered by a [`StatusGuard`]: if the
//! processing future panics or is dropped before the guard is resolved, the
//! claim is written `failed`. A claim must never stay `pending` forever
//! because its worker died.
//!
//! Status writes retry transient store failures with bounded backoff. After
//! the last try the failure is logged at `error` and the claim keeps its
//! `pending` row (with its attempt hash, if any) for the next cycle. A guard
//! dropped on a runtime worker backs off inside `block_in_place`; anywhere
//! else its retries run back to back.

use std::sync::Arc;

use airdrop_ledger::LedgerClient;
use airdrop_store::{ClaimStore, StoreError};
use airdrop_types::{Claim, ClaimStatus, Clock, TxHash};
use tokio::runtime::RuntimeFlavor;

use crate::{AttemptOutcome, BroadcastError, BroadcastObserver, RetryPolicy};

/// Result of [`Reconciler::recover`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub completed: usize,
    pub failed: usize,
    /// Still pending because the ledger could not be asked.
    pub deferred: usize,
}

pub struct Reconciler {
    store: Arc<dyn ClaimStore>,
    ledger: Arc<dyn LedgerClient>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn BroadcastObserver>,
    retry: RetryPolicy,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ClaimStore>,
        ledger: Arc<dyn LedgerClient>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn BroadcastObserver>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            observer,
            retry,
        }
    }

    /// Arm a guard for `nullifier`.
    pub fn guard(&self, nullifier: &str) -> StatusGuard {
        StatusGuard {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            observer: Arc::clone(&self.observer),
            retry: self.retry,
            nullifier: nullifier.to_string(),
            armed: true,
        }
    }

    /// Ask the ledger what became of a submitted transaction.
    pub async fn lookup(&self, attempt: &TxHash) -> AttemptOutcome {
        match self.ledger.get_tx(attempt).await {
            Ok(Some(result)) => AttemptOutcome::from_result(result, attempt),
            Ok(None) => AttemptOutcome::Unknown {
                attempt: attempt.clone(),
            },
            Err(error) => AttemptOutcome::Uncertain {
                attempt: attempt.clone(),
                error,
            },
        }
    }

    /// Resolve every pending claim left with an attempt hash by an earlier
    /// process. Runs once at startup, before the engine and the API.
    pub async fn recover(&self) -> Result<RecoveryReport, BroadcastError> {
        let leftovers = self.store.pending_with_attempts()?;
        let mut report = RecoveryReport::default();
        if leftovers.is_empty() {
            return Ok(report);
        }
        tracing::info!(count = leftovers.len(), "recovering interrupted transfers");

        for claim in leftovers {
            let Some(attempt) = claim.attempt_tx_hash.clone() else {
                continue;
            };
            let guard = self.guard(&claim.nullifier);
            let outcome = self.lookup(&attempt).await;
            match outcome.resolution() {
                Some((status, tx_hash)) => {
                    tracing::info!(
                        nullifier = %claim.nullifier,
                        claim_id = %claim.id,
                        tx_hash = %attempt,
                        %status,
                        "recovered claim"
                    );
                    if guard.resolve(status, tx_hash.as_ref()).await.is_ok() {
                        match status {
                            ClaimStatus::Completed => report.completed += 1,
                            _ => report.failed += 1,
                        }
                    } else {
                        report.deferred += 1;
                    }
                }
                None => {
                    tracing::warn!(
                        nullifier = %claim.nullifier,
                        tx_hash = %attempt,
                        "ledger unavailable, leaving claim pending"
                    );
                    guard.disarm();
                    report.deferred += 1;
                }
            }
        }
        Ok(report)
    }
}

/// Writes `failed` for its claim when dropped while still armed.
pub struct StatusGuard {
    store: Arc<dyn ClaimStore>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn BroadcastObserver>,
    retry: RetryPolicy,
    nullifier: String,
    armed: bool,
}

impl StatusGuard {
    pub fn nullifier(&self) -> &str {
        &self.nullifier
    }

    /// Write the terminal status, retrying transient failures. The guard is
    /// disarmed either way.
    pub async fn resolve(
        mut self,
        status: ClaimStatus,
        tx_hash: Option<&TxHash>,
    ) -> Result<Claim, StoreError> {
        self.armed = false;
        let mut backoff = self.retry.backoff();
        let attempts = self.retry.attempts();
        let mut tries = 0;
        loop {
            tries += 1;
            match self
                .store
                .update_status(&self.nullifier, status, tx_hash, self.clock.now())
            {
                Ok(claim) => {
                    match status {
                        ClaimStatus::Completed => self.observer.claim_completed(),
                        ClaimStatus::Failed => self.observer.claim_failed(),
                        ClaimStatus::Pending => {}
                    }
                    return Ok(claim);
                }
                Err(e) if e.is_transient() && tries < attempts => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        nullifier = %self.nullifier,
                        %status,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "status write failed, retrying"
                    );
                    self.observer.status_write_retried();
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        nullifier = %self.nullifier,
                        %status,
                        tx_hash = ?tx_hash,
                        error = %e,
                        tries,
                        "status write gave up"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Leave the claim as it is.
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// One `failed` write. `Err` means a transient failure worth another try.
    fn try_mark_failed(&self, tries: u32) -> Result<(), StoreError> {
        match self.store.update_status(
            &self.nullifier,
            ClaimStatus::Failed,
            None,
            self.clock.now(),
        ) {
            Ok(_) => {
                self.observer.claim_failed();
                Ok(())
            }
            Err(e) if e.is_transient() && tries < self.retry.attempts() => {
                self.observer.status_write_retried();
                Err(e)
            }
            Err(StoreError::IllegalTransition { .. }) => Ok(()),
            Err(e) => {
                tracing::error!(nullifier = %self.nullifier, error = %e, tries, "could not mark claim failed");
                Ok(())
            }
        }
    }

    /// Retries sleep only on a multi-thread runtime, moved off the worker with
    /// `block_in_place`. Elsewhere they run back to back.
    fn write_failed(&self) {
        let can_block = matches!(
            tokio::runtime::Handle::try_current().map(|h| h.runtime_flavor()),
            Ok(RuntimeFlavor::MultiThread)
        );
        let attempts = self.retry.attempts();
        let mut backoff = self.retry.backoff();
        let mut retry = || {
            for tries in 1..=attempts {
                if self.try_mark_failed(tries).is_ok() {
                    return;
                }
                if can_block {
                    std::thread::sleep(backoff.next_delay());
                }
            }
        };
        if can_block {
            tokio::task::block_in_place(retry);
        } else {
            retry();
        }
    }
}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(nullifier = %self.nullifier, "claim processing unwound, marking failed");
            self.write_failed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoopObserver;
    use airdrop_nullables::{NullClaimStore, NullClock, NullLedger};
    use airdrop_store::ConflictPolicy;
    use airdrop_types::{AccountAddress, Coin};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    fn setup() -> (Arc<NullClaimStore>, Arc<NullLedger>, Reconciler) {
        setup_with(fast_retry())
    }

    fn setup_with(retry: RetryPolicy) -> (Arc<NullClaimStore>, Arc<NullLedger>, Reconciler) {
        let store = Arc::new(NullClaimStore::new());
        let ledger = Arc::new(NullLedger::new());
        let reconciler = Reconciler::new(
            store.clone(),
            ledger.clone(),
            Arc::new(NullClock::at_date(2024, 5, 1)),
            Arc::new(NoopObserver),
            retry,
        );
        (store, ledger, reconciler)
    }

    fn pending(store: &NullClaimStore, nullifier: &str) {
        let claim = Claim::new_pending(
            nullifier,
            AccountAddress::new("drop_x"),
            Coin::new(100, "urmo"),
            NullClock::at_date(2024, 5, 1).now(),
        );
        store.insert_claim(&claim, ConflictPolicy::Any).unwrap();
    }

    #[test]
    fn dropped_guard_marks_failed() {
        let (store, _, reconciler) = setup();
        pending(&store, "n1");
        drop(reconciler.guard("n1"));
        assert_eq!(
            store.get_by_nullifier("n1").unwrap().status,
            ClaimStatus::Failed
        );
    }

    #[test]
    fn dropped_guard_retries_without_a_runtime() {
        let (store, _, reconciler) = setup();
        pending(&store, "n1");
        store.fail_next_status_writes(2);
        drop(reconciler.guard("n1"));
        assert_eq!(store.status_write_attempts(), 3);
        assert_eq!(
            store.get_by_nullifier("n1").unwrap().status,
            ClaimStatus::Failed
        );
    }

    fn slow_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay_ms: 400,
            max_delay_ms: 400,
        }
    }

    #[tokio::test]
    async fn dropped_guard_never_sleeps_on_a_current_thread_runtime() {
        let (store, _, reconciler) = setup_with(slow_retry());
        pending(&store, "n1");
        store.fail_next_status_writes(2);
        let started = std::time::Instant::now();
        drop(reconciler.guard("n1"));
        assert!(started.elapsed() < std::time::Duration::from_millis(400));
        assert_eq!(store.status_write_attempts(), 3);
        assert_eq!(
            store.get_by_nullifier("n1").unwrap().status,
            ClaimStatus::Failed
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_guard_on_a_worker_backs_off_in_place() {
        let (store, _, reconciler) = setup();
        pending(&store, "n1");
        store.fail_next_status_writes(2);
        let guard = reconciler.guard("n1");
        tokio::spawn(async move { drop(guard) }).await.unwrap();
        assert_eq!(store.status_write_attempts(), 3);
        assert_eq!(
            store.get_by_nullifier("n1").unwrap().status,
            ClaimStatus::Failed
        );
    }

    #[test]
    fn disarmed_guard_leaves_claim() {
        let (store, _, reconciler) = setup();
        pending(&store, "n1");
        reconciler.guard("n1").disarm();
        assert_eq!(
            store.get_by_nullifier("n1").unwrap().status,
            ClaimStatus::Pending
        );
    }

    #[test]
    fn guard_fires_on_panic() {
        let (store, _, reconciler) = setup();
        pending(&store, "n1");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = reconciler.guard("n1");
            panic!("worker died");
        }));
        assert!(result.is_err());
        assert_eq!(
            store.get_by_nullifier("n1").unwrap().status,
            ClaimStatus::Failed
        );
    }

    #[tokio::test]
    async fn resolve_retries_transient_failures() {
        let (store, _, reconciler) = setup();
        pending(&store, "n1");
        store.fail_next_status_writes(2);
        let hash = TxHash::new("0xdead");
        let claim = reconciler
            .guard("n1")
            .resolve(ClaimStatus::Completed, Some(&hash))
            .await
            .unwrap();
        assert_eq!(claim.status, ClaimStatus::Completed);
        assert_eq!(store.status_write_attempts(), 3);
    }

    #[tokio::test]
    async fn resolve_gives_up_without_failing_the_claim() {
        let (store, _, reconciler) = setup();
        pending(&store, "n1");
        store.fail_next_status_writes(10);
        let result = reconciler
            .guard("n1")
            .resolve(ClaimStatus::Completed, Some(&TxHash::new("AB")))
            .await;
        assert!(result.is_err());
        assert_eq!(store.status_write_attempts(), 3);
        assert_eq!(
            store.get_by_nullifier("n1").unwrap().status,
            ClaimStatus::Pending
        );
    }

    #[tokio::test]
    async fn recover_resolves_from_ledger() {
        let (store, ledger, reconciler) = setup();
        let now = NullClock::at_date(2024, 5, 1).now();
        for n in ["landed", "reverted", "lost", "fresh"] {
            pending(&store, n);
        }
        store.record_attempt("landed", &TxHash::new("AA"), now).unwrap();
        store.record_attempt("reverted", &TxHash::new("BB"), now).unwrap();
        store.record_attempt("lost", &TxHash::new("CC"), now).unwrap();
        ledger.insert_tx(
            &TxHash::new("AA"),
            airdrop_ledger::BroadcastResult {
                tx_hash: Some(TxHash::new("AA")),
                code: 0,
                raw_log: String::new(),
            },
        );
        ledger.insert_tx(
            &TxHash::new("BB"),
            airdrop_ledger::BroadcastResult {
                tx_hash: Some(TxHash::new("BB")),
                code: 5,
                raw_log: "insufficient funds".into(),
            },
        );

        let report = reconciler.recover().await.unwrap();
        assert_eq!(
            report,
            RecoveryReport {
                completed: 1,
                failed: 2,
                deferred: 0
            }
        );

        let landed = store.get_by_nullifier("landed").unwrap();
        assert_eq!(landed.status, ClaimStatus::Completed);
        assert_eq!(landed.tx_hash, Some(TxHash::new("AA")));
        let reverted = store.get_by_nullifier("reverted").unwrap();
        assert_eq!(reverted.status, ClaimStatus::Failed);
        assert_eq!(reverted.tx_hash, Some(TxHash::new("BB")));
        let lost = store.get_by_nullifier("lost").unwrap();
        assert_eq!(lost.status, ClaimStatus::Failed);
        assert!(lost.tx_hash.is_none());
        assert_eq!(
            store.get_by_nullifier("fresh").unwrap().status,
            ClaimStatus::Pending
        );
        assert!(ledger.broadcasts().is_empty());
    }
}
