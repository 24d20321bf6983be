//! Nullable claim store: thread-safe in-memory storage for testing.

use airdrop_store::claim::{apply_attempt, apply_transition};
use airdrop_store::{ClaimStore, ConflictPolicy, StoreError};
use airdrop_types::{Claim, ClaimId, ClaimStatus, TxHash};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory claim store with the same semantics as the LMDB backend.
///
/// Status writes can be made to fail a set number of times to exercise retry
/// paths.
#[derive(Default)]
pub struct NullClaimStore {
    claims: Mutex<HashMap<String, Claim>>,
    archived: Mutex<Vec<Claim>>,
    failing_status_writes: Mutex<u32>,
    status_writes: Mutex<u32>,
}

impl NullClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` calls to `update_status` fail with a backend error.
    pub fn fail_next_status_writes(&self, n: u32) {
        *self.failing_status_writes.lock().unwrap() = n;
    }

    /// Total `update_status` calls, failed ones included.
    pub fn status_write_attempts(&self) -> u32 {
        *self.status_writes.lock().unwrap()
    }

    pub fn all(&self) -> Vec<Claim> {
        let mut claims: Vec<_> = self.claims.lock().unwrap().values().cloned().collect();
        claims.sort_by(|a, b| (a.created_at, &a.nullifier).cmp(&(b.created_at, &b.nullifier)));
        claims
    }

    pub fn archived(&self) -> Vec<Claim> {
        self.archived.lock().unwrap().clone()
    }
}

impl ClaimStore for NullClaimStore {
    fn insert_claim(&self, claim: &Claim, policy: ConflictPolicy) -> Result<(), StoreError> {
        let mut claims = self.claims.lock().unwrap();
        if let Some(existing) = claims.get(&claim.nullifier) {
            if policy.blocks(existing) {
                return Err(StoreError::Duplicate(format!(
                    "nullifier '{}' already has a {} claim",
                    claim.nullifier, existing.status
                )));
            }
            self.archived.lock().unwrap().push(existing.clone());
        }
        if claims.values().any(|c| c.id == claim.id) {
            return Err(StoreError::Duplicate(format!("claim id '{}'", claim.id)));
        }
        claims.insert(claim.nullifier.clone(), claim.clone());
        Ok(())
    }

    fn get_by_nullifier(&self, nullifier: &str) -> Result<Claim, StoreError> {
        self.claims
            .lock()
            .unwrap()
            .get(nullifier)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("claim '{nullifier}'")))
    }

    fn get_by_id(&self, id: &ClaimId) -> Result<Claim, StoreError> {
        self.claims
            .lock()
            .unwrap()
            .values()
            .find(|c| c.id == *id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("claim id '{id}'")))
    }

    fn select_pending(&self, limit: usize) -> Result<Vec<Claim>, StoreError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|c| c.status == ClaimStatus::Pending)
            .take(limit)
            .collect())
    }

    fn record_attempt(
        &self,
        nullifier: &str,
        attempt: &TxHash,
        now: DateTime<Utc>,
    ) -> Result<Claim, StoreError> {
        let mut claims = self.claims.lock().unwrap();
        let claim = claims
            .get_mut(nullifier)
            .ok_or_else(|| StoreError::NotFound(format!("claim '{nullifier}'")))?;
        apply_attempt(claim, attempt, now)?;
        Ok(claim.clone())
    }

    fn update_status(
        &self,
        nullifier: &str,
        status: ClaimStatus,
        tx_hash: Option<&TxHash>,
        now: DateTime<Utc>,
    ) -> Result<Claim, StoreError> {
        *self.status_writes.lock().unwrap() += 1;
        {
            let mut failing = self.failing_status_writes.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(StoreError::Backend("injected status write failure".into()));
            }
        }
        let mut claims = self.claims.lock().unwrap();
        let claim = claims
            .get_mut(nullifier)
            .ok_or_else(|| StoreError::NotFound(format!("claim '{nullifier}'")))?;
        apply_transition(claim, status, tx_hash, now)?;
        Ok(claim.clone())
    }

    fn remove_staged(&self, nullifier: &str) -> Result<(), StoreError> {
        let mut claims = self.claims.lock().unwrap();
        let claim = claims
            .get(nullifier)
            .ok_or_else(|| StoreError::NotFound(format!("claim '{nullifier}'")))?;
        if claim.status != ClaimStatus::Pending || claim.tx_hash.is_some() {
            return Err(StoreError::IllegalTransition {
                nullifier: nullifier.to_string(),
                from: claim.status,
                to: ClaimStatus::Pending,
            });
        }
        claims.remove(nullifier);
        Ok(())
    }

    fn claim_count(&self) -> Result<u64, StoreError> {
        Ok(self.claims.lock().unwrap().len() as u64)
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .claims
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.status == ClaimStatus::Pending)
            .count() as u64)
    }
}
