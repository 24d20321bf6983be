//! Top-level error type shared across crates.

use thiserror::Error;

use crate::ClaimStatus;

/// Common error type for the airdrop service's value types.
#[derive(Debug, Error)]
pub enum AirdropError {
    #[error("invalid account address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("illegal claim status transition {from} -> {to}")]
    IllegalTransition { from: ClaimStatus, to: ClaimStatus },

    #[error("unknown claim status: {0}")]
    UnknownStatus(String),
}
