//! A single transfer attempt for one claim.
//!
//! ```text
//!  build (gas 0) → account → simulate → build (gas × multiplier) → sign
//!        → record attempt hash → broadcast (block mode) → classify
//! ```
//!
//! The account is re-read on every attempt; nothing about the sender's
//! sequence is cached between claims.
//!
//! Every attempt happens inside a [`Turn`], the exclusive right to move funds
//! from the sender account. The engine and synchronous intake each hold a
//! turn for the whole of a claim's processing (attempt, lookup, status
//! write), and [`Submitter::attempt`] re-reads the claim under it. A claim
//! that already carries an attempt hash or a terminal status is never sent
//! again.

use std::sync::Arc;

use airdrop_crypto::hash_transaction;
use airdrop_ledger::{BroadcastResult, LedgerClient, LedgerError, TxBuilder};
use airdrop_store::ClaimStore;
use airdrop_types::{Claim, ClaimStatus, Clock, TxHash};
use tokio::sync::{Mutex, MutexGuard};

use crate::BroadcastError;

/// Gas limit = multiplier × simulated gas.
pub const DEFAULT_GAS_MULTIPLIER: u64 = 3;

/// A signed transfer ready for broadcast.
#[derive(Clone, Debug)]
pub struct PreparedTx {
    pub bytes: Vec<u8>,
    pub hash: TxHash,
    pub sequence: u64,
    pub gas_limit: u64,
}

/// How an attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The ledger executed the transaction. Code `0` means the transfer happened.
    Included {
        tx_hash: TxHash,
        code: u32,
        raw_log: String,
    },
    /// The ledger refused the transaction without recording it.
    Rejected { code: u32, raw_log: String },
    /// Something failed before the transaction was handed to the ledger.
    NotSubmitted(BroadcastError),
    /// The ledger has no record of a previously submitted transaction.
    Unknown { attempt: TxHash },
    /// Submitted, but the answer was lost. Must be looked up before deciding.
    Uncertain { attempt: TxHash, error: LedgerError },
    /// Nothing was sent: when re-read the claim was no longer pending or
    /// already had an attempt on record. Carries the stored row.
    Superseded(Box<Claim>),
}

impl AttemptOutcome {
    /// Classify a ledger response for a transaction whose hash is `attempt`.
    pub fn from_result(result: BroadcastResult, attempt: &TxHash) -> Self {
        match result.tx_hash {
            Some(tx_hash) => AttemptOutcome::Included {
                tx_hash,
                code: result.code,
                raw_log: result.raw_log,
            },
            None if result.is_success() => AttemptOutcome::Included {
                tx_hash: attempt.clone(),
                code: 0,
                raw_log: result.raw_log,
            },
            None => AttemptOutcome::Rejected {
                code: result.code,
                raw_log: result.raw_log,
            },
        }
    }

    /// The terminal status this outcome decides, with the hash to record.
    /// `None` while the ledger's answer is still unknown.
    pub fn resolution(&self) -> Option<(ClaimStatus, Option<TxHash>)> {
        match self {
            AttemptOutcome::Included { tx_hash, code, .. } => {
                let status = if *code == 0 {
                    ClaimStatus::Completed
                } else {
                    ClaimStatus::Failed
                };
                Some((status, Some(tx_hash.clone())))
            }
            AttemptOutcome::Rejected { .. }
            | AttemptOutcome::NotSubmitted(_)
            | AttemptOutcome::Unknown { .. } => Some((ClaimStatus::Failed, None)),
            AttemptOutcome::Uncertain { .. } | AttemptOutcome::Superseded(_) => None,
        }
    }

    /// Whether the transfer definitely did not move funds.
    pub fn is_definite_failure(&self) -> bool {
        match self {
            AttemptOutcome::Included { code, .. } => *code != 0,
            AttemptOutcome::Rejected { .. }
            | AttemptOutcome::NotSubmitted(_)
            | AttemptOutcome::Unknown { .. } => true,
            AttemptOutcome::Uncertain { .. } | AttemptOutcome::Superseded(_) => false,
        }
    }
}

/// Exclusive right to submit transfers from the sender account.
pub struct Turn<'a> {
    _held: MutexGuard<'a, ()>,
}

/// Builds, signs and submits transfers from the service account.
pub struct Submitter {
    ledger: Arc<dyn LedgerClient>,
    builder: Arc<TxBuilder>,
    gas_multiplier: u64,
    in_flight: Mutex<()>,
}

impl Submitter {
    pub fn new(ledger: Arc<dyn LedgerClient>, builder: Arc<TxBuilder>, gas_multiplier: u64) -> Self {
        Self {
            ledger,
            builder,
            gas_multiplier,
            in_flight: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Wait until no other caller is working on a transfer.
    pub async fn turn(&self) -> Turn<'_> {
        Turn {
            _held: self.in_flight.lock().await,
        }
    }

    /// Steps 1–4: dry-run, fresh account state, simulation, final signed bytes.
    pub async fn prepare(&self, claim: &Claim) -> Result<PreparedTx, BroadcastError> {
        let body = self.builder.transfer(&claim.address, &claim.amount, 0);

        let account = self.ledger.account(self.builder.sender()).await?;
        let simulation = self.builder.for_simulation(body.clone(), account).encode()?;
        let estimate = self.ledger.simulate(&simulation).await?;
        let gas_limit =
            estimate
                .checked_mul(self.gas_multiplier)
                .ok_or(BroadcastError::GasOverflow {
                    estimate,
                    multiplier: self.gas_multiplier,
                })?;

        let signed = self.builder.sign(body.with_gas_limit(gas_limit), account)?;
        let bytes = signed.encode()?;
        let hash = hash_transaction(&bytes);
        tracing::debug!(
            nullifier = %claim.nullifier,
            sequence = account.sequence,
            gas = gas_limit,
            estimate,
            tx_hash = %hash,
            "transfer prepared"
        );
        Ok(PreparedTx {
            bytes,
            hash,
            sequence: account.sequence,
            gas_limit,
        })
    }

    /// Run one full attempt for the stored state of `claim`. The attempt hash
    /// is written to the store before the transaction leaves the process.
    pub async fn attempt(
        &self,
        _turn: &Turn<'_>,
        claim: &Claim,
        store: &dyn ClaimStore,
        clock: &dyn Clock,
    ) -> AttemptOutcome {
        let claim = match store.get_by_nullifier(&claim.nullifier) {
            Ok(current) => current,
            Err(e) => return AttemptOutcome::NotSubmitted(e.into()),
        };
        if claim.status != ClaimStatus::Pending || claim.attempt_tx_hash.is_some() {
            tracing::debug!(
                nullifier = %claim.nullifier,
                status = %claim.status,
                attempt = ?claim.attempt_tx_hash,
                "claim already attempted, not sending"
            );
            return AttemptOutcome::Superseded(Box::new(claim));
        }
        let claim = &claim;

        let prepared = match self.prepare(claim).await {
            Ok(prepared) => prepared,
            Err(e) => return AttemptOutcome::NotSubmitted(e),
        };

        if let Err(e) = store.record_attempt(&claim.nullifier, &prepared.hash, clock.now()) {
            return AttemptOutcome::NotSubmitted(e.into());
        }

        match self.ledger.broadcast(&prepared.bytes).await {
            Ok(result) => {
                tracing::info!(
                    nullifier = %claim.nullifier,
                    sequence = prepared.sequence,
                    gas = prepared.gas_limit,
                    code = result.code,
                    tx_hash = ?result.tx_hash,
                    "transfer broadcast"
                );
                AttemptOutcome::from_result(result, &prepared.hash)
            }
            Err(error) => AttemptOutcome::Uncertain {
                attempt: prepared.hash,
                error,
            },
        }
    }
}
