//! Claim request as submitted by a client.

use serde::{Deserialize, Serialize};

/// A zero-knowledge proof in snarkjs layout plus its public signals.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ZkProof {
    pub proof: serde_json::Value,
    pub pub_signals: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClaimRequest {
    /// Destination account for the airdrop.
    pub address: String,
    /// Selects the verification key.
    pub algorithm: String,
    pub zk_proof: ZkProof,
}
