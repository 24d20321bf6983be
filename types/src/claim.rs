//! The claim entity and its status lifecycle.
//!
//! ```text
//!            ┌──────────► completed
//!  pending ──┤
//!            └──────────► failed
//! ```
//!
//! `pending` is the only non-terminal state. Nothing leaves a terminal state;
//! a failed payout needs an operator decision, not an automatic retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{AccountAddress, AirdropError, Coin, TxHash};

/// Server-assigned unique claim identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(Uuid);

impl ClaimId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a claim is in its payout lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Completed,
    Failed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Completed => "completed",
            ClaimStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClaimStatus::Pending)
    }

    /// Only `pending → completed` and `pending → failed` are legal.
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        matches!(
            (self, next),
            (ClaimStatus::Pending, ClaimStatus::Completed)
                | (ClaimStatus::Pending, ClaimStatus::Failed)
        )
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = AirdropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ClaimStatus::Pending),
            "completed" => Ok(ClaimStatus::Completed),
            "failed" => Ok(ClaimStatus::Failed),
            other => Err(AirdropError::UnknownStatus(other.to_string())),
        }
    }
}

/// One identity's claim on the airdrop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    /// Proof-derived identity nullifier. Unique across all claims.
    pub nullifier: String,
    /// Destination of the payout.
    pub address: AccountAddress,
    /// Payout amount, copied from configuration at creation for audit.
    pub amount: Coin,
    pub status: ClaimStatus,
    /// Hash of the transaction whose ledger outcome decided the claim.
    pub tx_hash: Option<TxHash>,
    /// Hash of a signed transaction recorded just before submission. Lets a
    /// restarted process find out what happened to an interrupted attempt.
    #[serde(default)]
    pub attempt_tx_hash: Option<TxHash>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// A freshly accepted claim awaiting broadcast.
    pub fn new_pending(
        nullifier: impl Into<String>,
        address: AccountAddress,
        amount: Coin,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ClaimId::generate(),
            nullifier: nullifier.into(),
            address,
            amount,
            status: ClaimStatus::Pending,
            tx_hash: None,
            attempt_tx_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status change, enforcing the lifecycle.
    ///
    /// Only `status`, `tx_hash` and `updated_at` change. Resolving a claim clears
    /// the in-flight marker.
    pub fn transition(
        &mut self,
        next: ClaimStatus,
        tx_hash: Option<TxHash>,
        now: DateTime<Utc>,
    ) -> Result<(), AirdropError> {
        if !self.status.can_transition_to(next) {
            return Err(AirdropError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if tx_hash.is_some() {
            self.tx_hash = tx_hash;
        }
        self.attempt_tx_hash = None;
        self.updated_at = now;
        Ok(())
    }
}
