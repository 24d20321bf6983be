use airdrop_types::ClaimStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("illegal status transition {from} -> {to} for claim {nullifier}")]
    IllegalTransition {
        nullifier: String,
        from: ClaimStatus,
        to: ClaimStatus,
    },

    #[error("claim {nullifier} already has attempt {attempt} on record")]
    AttemptRecorded { nullifier: String, attempt: String },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}

impl StoreError {
    /// Backend failures that may succeed on retry (as opposed to logical rejections).
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}
