//! Claim storage trait.

use crate::StoreError;
use airdrop_types::{Claim, ClaimId, ClaimStatus, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which existing claims make a nullifier unavailable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Any existing row, whatever its status, blocks a new claim.
    #[default]
    Any,
    /// Only `pending` or `completed` rows block. A `failed` row is archived
    /// and replaced by the new claim.
    CompletedOrPending,
}

impl ConflictPolicy {
    /// Whether `existing` prevents a new claim for the same nullifier.
    pub fn blocks(&self, existing: &Claim) -> bool {
        match self {
            ConflictPolicy::Any => true,
            ConflictPolicy::CompletedOrPending => existing.status != ClaimStatus::Failed,
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictPolicy::Any => "any",
            ConflictPolicy::CompletedOrPending => "completed_or_pending",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(ConflictPolicy::Any),
            "completed_or_pending" => Ok(ConflictPolicy::CompletedOrPending),
            other => Err(format!("unknown conflict policy: {other}")),
        }
    }
}

/// Durable claim records keyed by nullifier.
///
/// Implementations must make `insert_claim` atomic: the conflict lookup and
/// the write happen inside one write transaction, so two concurrent inserts
/// for the same nullifier can never both succeed.
pub trait ClaimStore: Send + Sync {
    /// Insert a fresh `pending` claim. Returns `Duplicate` when an existing row
    /// blocks the nullifier under `policy`.
    fn insert_claim(&self, claim: &Claim, policy: ConflictPolicy) -> Result<(), StoreError>;

    fn get_by_nullifier(&self, nullifier: &str) -> Result<Claim, StoreError>;

    fn get_by_id(&self, id: &ClaimId) -> Result<Claim, StoreError>;

    /// Up to `limit` pending claims, oldest `created_at` first.
    fn select_pending(&self, limit: usize) -> Result<Vec<Claim>, StoreError>;

    /// Record the hash of a signed transaction before it is submitted.
    /// Only legal while the claim is `pending` and has no attempt yet.
    fn record_attempt(
        &self,
        nullifier: &str,
        attempt: &TxHash,
        now: DateTime<Utc>,
    ) -> Result<Claim, StoreError>;

    /// Move a claim to `status`, enforcing the legal transitions.
    fn update_status(
        &self,
        nullifier: &str,
        status: ClaimStatus,
        tx_hash: Option<&TxHash>,
        now: DateTime<Utc>,
    ) -> Result<Claim, StoreError>;

    /// Delete a staged claim that never reached the ledger.
    ///
    /// Refuses anything that is not `pending` without a recorded hash.
    fn remove_staged(&self, nullifier: &str) -> Result<(), StoreError>;

    fn claim_count(&self) -> Result<u64, StoreError>;

    fn pending_count(&self) -> Result<u64, StoreError>;

    /// Like [`get_by_nullifier`](Self::get_by_nullifier) but maps `NotFound` to `None`.
    fn find_by_nullifier(&self, nullifier: &str) -> Result<Option<Claim>, StoreError> {
        match self.get_by_nullifier(nullifier) {
            Ok(claim) => Ok(Some(claim)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Pending claims carrying an in-flight attempt hash (crash leftovers).
    fn pending_with_attempts(&self) -> Result<Vec<Claim>, StoreError> {
        Ok(self
            .select_pending(usize::MAX)?
            .into_iter()
            .filter(|c| c.attempt_tx_hash.is_some())
            .collect())
    }
}

/// Apply a status transition to an in-memory copy, mapping type errors into
/// store errors. Shared by every backend.
pub fn apply_transition(
    claim: &mut Claim,
    status: ClaimStatus,
    tx_hash: Option<&TxHash>,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let from = claim.status;
    claim
        .transition(status, tx_hash.cloned(), now)
        .map_err(|_| StoreError::IllegalTransition {
            nullifier: claim.nullifier.clone(),
            from,
            to: status,
        })
}

/// Set the attempt marker, rejecting claims that are no longer pending or
/// already have one.
pub fn apply_attempt(
    claim: &mut Claim,
    attempt: &TxHash,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    if claim.status != ClaimStatus::Pending {
        return Err(StoreError::IllegalTransition {
            nullifier: claim.nullifier.clone(),
            from: claim.status,
            to: ClaimStatus::Pending,
        });
    }
    if let Some(existing) = &claim.attempt_tx_hash {
        return Err(StoreError::AttemptRecorded {
            nullifier: claim.nullifier.clone(),
            attempt: existing.to_string(),
        });
    }
    claim.attempt_tx_hash = Some(attempt.clone());
    claim.updated_at = now;
    Ok(())
}
