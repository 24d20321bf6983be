//! LMDB implementation of ClaimStore.
//!
//! The `claims` database is keyed by nullifier, so the uniqueness check and
//! the insert share one write transaction. `pending_claims` is an ordered
//! index (`created_at` millis big-endian ++ nullifier) that yields pending
//! claims oldest first without scanning terminal rows.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RwTxn};

use airdrop_store::claim::{apply_attempt, apply_transition};
use airdrop_store::{ClaimStore, ConflictPolicy, StoreError};
use airdrop_types::{Claim, ClaimId, ClaimStatus, TxHash};
use chrono::{DateTime, Utc};

use crate::LmdbError;

pub struct LmdbClaimStore {
    pub(crate) env: Arc<Env>,
    pub(crate) claims_db: Database<Bytes, Bytes>,
    pub(crate) claim_ids_db: Database<Bytes, Bytes>,
    pub(crate) pending_db: Database<Bytes, Bytes>,
    pub(crate) archive_db: Database<Bytes, Bytes>,
}

/// Build the pending-index key `created_at_millis (BE) ++ nullifier`.
fn pending_key(claim: &Claim) -> Vec<u8> {
    let millis = claim.created_at.timestamp_millis().max(0) as u64;
    let nullifier = claim.nullifier.as_bytes();
    let mut key = Vec::with_capacity(8 + nullifier.len());
    key.extend_from_slice(&millis.to_be_bytes());
    key.extend_from_slice(nullifier);
    key
}

fn encode(claim: &Claim) -> Result<Vec<u8>, LmdbError> {
    Ok(bincode::serialize(claim)?)
}

fn decode(bytes: &[u8]) -> Result<Claim, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}

impl LmdbClaimStore {
    fn read_in(&self, txn: &RwTxn<'_>, nullifier: &str) -> Result<Option<Claim>, LmdbError> {
        match self.claims_db.get(txn, nullifier.as_bytes())? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Load, mutate and write back one claim inside a single write transaction.
    fn modify<F>(&self, nullifier: &str, f: F) -> Result<Claim, StoreError>
    where
        F: FnOnce(&mut Claim) -> Result<(), StoreError>,
    {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut claim = self
            .read_in(&wtxn, nullifier)?
            .ok_or_else(|| StoreError::NotFound(format!("claim '{nullifier}'")))?;
        let was_pending = claim.status == ClaimStatus::Pending;

        f(&mut claim)?;

        self.claims_db
            .put(&mut wtxn, nullifier.as_bytes(), &encode(&claim)?)
            .map_err(LmdbError::from)?;
        if was_pending && claim.status != ClaimStatus::Pending {
            self.pending_db
                .delete(&mut wtxn, &pending_key(&claim))
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(claim)
    }

    /// Number of claims that were replaced under [`ConflictPolicy::CompletedOrPending`].
    pub fn archived_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.archive_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}

impl ClaimStore for LmdbClaimStore {
    fn insert_claim(&self, claim: &Claim, policy: ConflictPolicy) -> Result<(), StoreError> {
        let key = claim.nullifier.as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        if let Some(existing) = self.read_in(&wtxn, &claim.nullifier)? {
            if policy.blocks(&existing) {
                return Err(StoreError::Duplicate(format!(
                    "nullifier '{}' already has a {} claim",
                    claim.nullifier, existing.status
                )));
            }
            self.archive_db
                .put(&mut wtxn, existing.id.as_bytes(), &encode(&existing)?)
                .map_err(LmdbError::from)?;
            self.claim_ids_db
                .delete(&mut wtxn, existing.id.as_bytes())
                .map_err(LmdbError::from)?;
            tracing::info!(
                nullifier = %claim.nullifier,
                replaced_claim_id = %existing.id,
                "archived failed claim before re-claim"
            );
        }

        if self
            .claim_ids_db
            .get(&wtxn, claim.id.as_bytes())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("claim id '{}'", claim.id)));
        }

        self.claims_db
            .put(&mut wtxn, key, &encode(claim)?)
            .map_err(LmdbError::from)?;
        self.claim_ids_db
            .put(&mut wtxn, claim.id.as_bytes(), key)
            .map_err(LmdbError::from)?;
        if claim.status == ClaimStatus::Pending {
            self.pending_db
                .put(&mut wtxn, &pending_key(claim), &[])
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_by_nullifier(&self, nullifier: &str) -> Result<Claim, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .claims_db
            .get(&rtxn, nullifier.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("claim '{nullifier}'")))?;
        Ok(decode(bytes)?)
    }

    fn get_by_id(&self, id: &ClaimId) -> Result<Claim, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let nullifier = self
            .claim_ids_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("claim id '{id}'")))?;
        let bytes = self
            .claims_db
            .get(&rtxn, nullifier)
            .map_err(LmdbError::from)?
            .ok_or_else(|| {
                StoreError::Corruption(format!("claim id '{id}' points at a missing claim"))
            })?;
        Ok(decode(bytes)?)
    }

    fn select_pending(&self, limit: usize) -> Result<Vec<Claim>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.pending_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in iter {
            if results.len() >= limit {
                break;
            }
            let (key, _) = entry.map_err(LmdbError::from)?;
            let nullifier = key.get(8..).ok_or_else(|| {
                StoreError::Corruption("pending index key shorter than 8 bytes".into())
            })?;
            let bytes = self
                .claims_db
                .get(&rtxn, nullifier)
                .map_err(LmdbError::from)?
                .ok_or_else(|| {
                    StoreError::Corruption("pending index points at a missing claim".into())
                })?;
            let claim = decode(bytes)?;
            if claim.status == ClaimStatus::Pending {
                results.push(claim);
            } else {
                tracing::warn!(nullifier = %claim.nullifier, status = %claim.status, "stale pending index entry");
            }
        }
        Ok(results)
    }

    fn record_attempt(
        &self,
        nullifier: &str,
        attempt: &TxHash,
        now: DateTime<Utc>,
    ) -> Result<Claim, StoreError> {
        self.modify(nullifier, |claim| apply_attempt(claim, attempt, now))
    }

    fn update_status(
        &self,
        nullifier: &str,
        status: ClaimStatus,
        tx_hash: Option<&TxHash>,
        now: DateTime<Utc>,
    ) -> Result<Claim, StoreError> {
        self.modify(nullifier, |claim| apply_transition(claim, status, tx_hash, now))
    }

    fn remove_staged(&self, nullifier: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let claim = self
            .read_in(&wtxn, nullifier)?
            .ok_or_else(|| StoreError::NotFound(format!("claim '{nullifier}'")))?;
        if claim.status != ClaimStatus::Pending || claim.tx_hash.is_some() {
            return Err(StoreError::IllegalTransition {
                nullifier: nullifier.to_string(),
                from: claim.status,
                to: ClaimStatus::Pending,
            });
        }
        self.claims_db
            .delete(&mut wtxn, nullifier.as_bytes())
            .map_err(LmdbError::from)?;
        self.claim_ids_db
            .delete(&mut wtxn, claim.id.as_bytes())
            .map_err(LmdbError::from)?;
        self.pending_db
            .delete(&mut wtxn, &pending_key(&claim))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn claim_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.claims_db.len(&rtxn).map_err(LmdbError::from)?)
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.pending_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
