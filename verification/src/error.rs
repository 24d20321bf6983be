use airdrop_store::StoreError;
use chrono::NaiveDate;
use thiserror::Error;

/// A claim the verifier refuses. Always the client's fault; never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("expected {expected} public inputs, got {got}")]
    MalformedInputs { expected: usize, got: usize },

    #[error("public input {name} is malformed: {reason}")]
    InvalidInput { name: &'static str, reason: String },

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("proof is invalid")]
    InvalidProof,

    #[error("proof date {proof_date} does not match today ({today})")]
    StaleProof { proof_date: NaiveDate, today: NaiveDate },

    #[error("identity document expired on {expired_on}")]
    DocumentExpired { expired_on: NaiveDate },

    #[error("birth date {birth_date} is younger than the minimum age of {min_age}")]
    Underage { birth_date: NaiveDate, min_age: u32 },

    #[error("citizenship {0} is not allowed")]
    CitizenshipNotAllowed(String),

    #[error("query selector does not match")]
    SelectorMismatch,

    #[error("event id does not match")]
    EventMismatch,

    #[error("proof is not bound to address {0}")]
    AddressMismatch(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("nullifier {0} has already claimed")]
    AlreadyClaimed(String),
}

impl Rejection {
    /// Stable machine-readable reason, reported in error responses and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::MalformedInputs { .. } => "malformed-inputs",
            Rejection::InvalidInput { .. } => "invalid-input",
            Rejection::UnsupportedAlgorithm(_) => "unsupported-algorithm",
            Rejection::InvalidProof => "invalid-proof",
            Rejection::StaleProof { .. } => "stale-proof",
            Rejection::DocumentExpired { .. } => "document-expired",
            Rejection::Underage { .. } => "underage",
            Rejection::CitizenshipNotAllowed(_) => "citizenship-not-allowed",
            Rejection::SelectorMismatch => "selector-mismatch",
            Rejection::EventMismatch => "event-mismatch",
            Rejection::AddressMismatch(_) => "address-mismatch",
            Rejection::InvalidAddress(_) => "invalid-address",
            Rejection::AlreadyClaimed(_) => "already-claimed",
        }
    }
}

/// Failures reported by a [`ProofVerifier`](crate::ProofVerifier).
#[derive(Debug, Error)]
pub enum ProofError {
    /// The proof is well-formed but does not verify.
    #[error("proof does not verify")]
    Invalid,

    /// The proof or public inputs could not be decoded.
    #[error("malformed proof: {0}")]
    Malformed(String),

    /// The verification key is unusable. A deployment problem, not the client's.
    #[error("bad verification key: {0}")]
    BadKey(String),
}

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("verification key error: {0}")]
    Key(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl VerificationError {
    /// The client-facing rejection, if this is one.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            VerificationError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}
