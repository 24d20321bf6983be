//! Claim intake: validate, verify, persist.
//!
//! Nothing is written until every check has passed. In asynchronous mode
//! (the default) intake ends with a `pending` row and the broadcast engine
//! pays it later. In synchronous mode the row is staged, the transfer is
//! made inline, and the row is either finalised or rolled back. The whole
//! payout runs inside one submitter turn, shared with the broadcast engine.

use std::sync::Arc;

use airdrop_broadcaster::{AttemptOutcome, BroadcastError, Reconciler, Submitter};
use airdrop_store::{ClaimStore, StoreError};
use airdrop_types::{Claim, ClaimId, ClaimStatus, Clock, Coin};
use airdrop_verification::{ClaimRequest, IdentityVerifier, Rejection, VerificationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeMode {
    #[default]
    Async,
    Sync,
}

impl IntakeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeMode::Async => "async",
            IntakeMode::Sync => "sync",
        }
    }
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("claim rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("nullifier {0} has already claimed")]
    Conflict(String),

    #[error("claim {0} not found")]
    NotFound(String),

    #[error("temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for IntakeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => IntakeError::NotFound(key),
            StoreError::Duplicate(key) => IntakeError::Conflict(key),
            e if e.is_transient() => IntakeError::Unavailable(e.to_string()),
            e => IntakeError::Internal(e.to_string()),
        }
    }
}

impl From<VerificationError> for IntakeError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Rejected(Rejection::AlreadyClaimed(nullifier)) => {
                IntakeError::Conflict(nullifier)
            }
            VerificationError::Rejected(rejection) => IntakeError::Rejected(rejection),
            VerificationError::Key(reason) => {
                IntakeError::Unavailable(format!("proof verification: {reason}"))
            }
            VerificationError::Store(e) => e.into(),
        }
    }
}

/// Counting hooks for intake decisions.
pub trait IntakeObserver: Send + Sync {
    fn claim_accepted(&self) {}

    /// `reason` is a stable rejection code such as `invalid-proof`.
    fn claim_rejected(&self, _reason: &str) {}

    fn claim_conflicted(&self) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopIntakeObserver;

impl IntakeObserver for NoopIntakeObserver {}

struct SyncPayout {
    submitter: Arc<Submitter>,
    reconciler: Arc<Reconciler>,
}

pub struct ClaimIntake {
    verifier: Arc<IdentityVerifier>,
    store: Arc<dyn ClaimStore>,
    clock: Arc<dyn Clock>,
    amount: Coin,
    payout: Option<SyncPayout>,
    observer: Arc<dyn IntakeObserver>,
}

impl ClaimIntake {
    /// Asynchronous intake paying `amount` per claim.
    pub fn new(
        verifier: Arc<IdentityVerifier>,
        store: Arc<dyn ClaimStore>,
        clock: Arc<dyn Clock>,
        amount: Coin,
    ) -> Self {
        Self {
            verifier,
            store,
            clock,
            amount,
            payout: None,
            observer: Arc::new(NoopIntakeObserver),
        }
    }

    /// Switch to synchronous mode: pay inside the request.
    pub fn with_sync_payout(mut self, submitter: Arc<Submitter>, reconciler: Arc<Reconciler>) -> Self {
        self.payout = Some(SyncPayout {
            submitter,
            reconciler,
        });
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn IntakeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn mode(&self) -> IntakeMode {
        if self.payout.is_some() {
            IntakeMode::Sync
        } else {
            IntakeMode::Async
        }
    }

    pub fn verifier(&self) -> &IdentityVerifier {
        &self.verifier
    }

    pub fn store(&self) -> &Arc<dyn ClaimStore> {
        &self.store
    }

    pub fn amount(&self) -> &Coin {
        &self.amount
    }

    /// Current state of the claim for `nullifier`, read straight from the store.
    pub fn lookup(&self, nullifier: &str) -> Result<Claim, IntakeError> {
        Ok(self.store.get_by_nullifier(nullifier)?)
    }

    /// Same as [`lookup`](Self::lookup), keyed by the server-assigned claim id.
    pub fn lookup_by_id(&self, id: &ClaimId) -> Result<Claim, IntakeError> {
        Ok(self.store.get_by_id(id)?)
    }

    /// Accept a claim request. Returns the persisted claim.
    pub async fn submit(&self, request: ClaimRequest) -> Result<Claim, IntakeError> {
        let result = self.submit_inner(request).await;
        match &result {
            Ok(_) => self.observer.claim_accepted(),
            Err(IntakeError::Rejected(rejection)) => self.observer.claim_rejected(rejection.code()),
            Err(IntakeError::Conflict(_)) => self.observer.claim_conflicted(),
            Err(_) => {}
        }
        result
    }

    async fn submit_inner(&self, request: ClaimRequest) -> Result<Claim, IntakeError> {
        self.verifier.validate_structure(&request)?;

        let policy = self.verifier.policy().conflict_policy;
        let nullifier = self.verifier.nullifier_of(&request)?.to_string();
        if let Some(existing) = self.store.find_by_nullifier(&nullifier)? {
            if policy.blocks(&existing) {
                tracing::info!(%nullifier, status = %existing.status, "claim conflicts with existing row");
                return Err(IntakeError::Conflict(nullifier));
            }
        }

        let now = self.clock.now();
        let verified = {
            let verifier = Arc::clone(&self.verifier);
            let store = Arc::clone(&self.store);
            tokio::task::spawn_blocking(move || verifier.verify(&request, store.as_ref(), now))
                .await
                .map_err(|e| IntakeError::Internal(format!("verification task: {e}")))??
        };

        let claim = Claim::new_pending(verified.nullifier, verified.address, self.amount.clone(), now);
        self.store.insert_claim(&claim, policy).map_err(|e| match e {
            StoreError::Duplicate(_) => IntakeError::Conflict(claim.nullifier.clone()),
            other => other.into(),
        })?;
        tracing::info!(
            nullifier = %claim.nullifier,
            claim_id = %claim.id,
            address = %claim.address,
            amount = %claim.amount,
            "claim accepted"
        );

        match &self.payout {
            None => Ok(claim),
            Some(payout) => self.pay_now(payout, claim).await,
        }
    }

    async fn pay_now(&self, payout: &SyncPayout, claim: Claim) -> Result<Claim, IntakeError> {
        let turn = payout.submitter.turn().await;
        let mut outcome = payout
            .submitter
            .attempt(&turn, &claim, self.store.as_ref(), self.clock.as_ref())
            .await;
        if let AttemptOutcome::Uncertain { attempt, error } = outcome {
            tracing::warn!(nullifier = %claim.nullifier, tx_hash = %attempt, %error, "broadcast answer lost, looking it up");
            outcome = payout.reconciler.lookup(&attempt).await;
        }

        match outcome {
            AttemptOutcome::Superseded(stored) => Self::settled_by_engine(*stored),
            AttemptOutcome::Included { tx_hash, code: 0, .. } => {
                let guard = payout.reconciler.guard(&claim.nullifier);
                match guard.resolve(ClaimStatus::Completed, Some(&tx_hash)).await {
                    Ok(done) => Ok(done),
                    // Paid; the engine finds the attempt hash and finishes the row.
                    Err(_) => self.lookup(&claim.nullifier),
                }
            }
            AttemptOutcome::Uncertain { attempt, error } => {
                tracing::warn!(
                    nullifier = %claim.nullifier,
                    tx_hash = %attempt,
                    %error,
                    "transfer outcome unknown, leaving claim pending"
                );
                Err(IntakeError::Unavailable(
                    "transfer submitted but not yet confirmed".into(),
                ))
            }
            failed => {
                self.store.remove_staged(&claim.nullifier)?;
                tracing::warn!(nullifier = %claim.nullifier, outcome = ?failed, "transfer failed, claim rolled back");
                Err(match failed {
                    AttemptOutcome::NotSubmitted(BroadcastError::Ledger(e)) if e.is_transport() => {
                        IntakeError::Unavailable(format!("ledger: {e}"))
                    }
                    AttemptOutcome::NotSubmitted(BroadcastError::Store(e)) => e.into(),
                    other => IntakeError::Internal(format!("transfer failed: {other:?}")),
                })
            }
        }
    }

    /// The engine reached the staged row first; report what it left behind.
    fn settled_by_engine(stored: Claim) -> Result<Claim, IntakeError> {
        tracing::info!(
            nullifier = %stored.nullifier,
            status = %stored.status,
            "claim was paid by the broadcast engine"
        );
        match stored.status {
            ClaimStatus::Completed => Ok(stored),
            ClaimStatus::Pending => Err(IntakeError::Unavailable(
                "transfer submitted but not yet confirmed".into(),
            )),
            ClaimStatus::Failed => Err(IntakeError::Internal(format!(
                "transfer for claim {} failed",
                stored.id
            ))),
        }
    }
}
