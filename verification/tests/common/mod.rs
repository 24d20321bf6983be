#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use airdrop_crypto::{keypair_from_seed, AddressCodec};
use airdrop_store::{ClaimStore, ConflictPolicy, StoreError};
use airdrop_types::{Claim, ClaimId, ClaimStatus, TxHash};
use airdrop_verification::{
    AddressBindingMode, ClaimRequest, EligibilityPolicy, IdentityVerifier, ProofError,
    ProofVerifier, PublicInputSchema, VerificationKey, VerificationKeys, ZkProof,
};
use chrono::{DateTime, TimeZone, Utc};

pub const SELECTOR: &str = "23073";
pub const EVENT_ID: &str = "304358862882731539112827930982999386691702727710421481944329166126417129570";

/// Document expiry carried by every fixture proof.
pub const EXPIRES: &str = "301231";

/// 2024-05-01 12:00 UTC; "today" as a packed input is "240501".
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn codec() -> AddressCodec {
    AddressCodec::default()
}

pub fn address() -> String {
    codec().encode(&keypair_from_seed(&[11u8; 32]).public).as_str().to_string()
}

pub fn policy() -> EligibilityPolicy {
    EligibilityPolicy {
        min_age: 18,
        allowed_citizenships: vec!["FRA".into(), "DEU".into()],
        query_selector: SELECTOR.into(),
        event_id: EVENT_ID.into(),
        address_binding: AddressBindingMode::Blake2b,
        conflict_policy: ConflictPolicy::Any,
        schema: PublicInputSchema::default(),
    }
}

/// Public inputs in the default schema layout for `addr`.
pub fn signals(nullifier: &str, birth: &str, today: &str, citizenship: &str, addr: &str) -> Vec<String> {
    let mut s = vec!["0".to_string(); 14];
    s[0] = nullifier.into();
    s[1] = birth.into();
    s[2] = today.into();
    s[6] = citizenship.into();
    s[7] = EXPIRES.into();
    s[9] = EVENT_ID.into();
    s[10] = AddressBindingMode::Blake2b.expected(&codec(), addr).unwrap();
    s[12] = SELECTOR.into();
    s
}

pub fn request(pub_signals: Vec<String>) -> ClaimRequest {
    ClaimRequest {
        address: address(),
        algorithm: "sha256".into(),
        zk_proof: ZkProof {
            proof: serde_json::json!({"pi_a": [], "pi_b": [], "pi_c": []}),
            pub_signals,
        },
    }
}

pub fn valid_request() -> ClaimRequest {
    request(signals("abc123", "990101", "240501", "FRA", &address()))
}

/// Accepts or rejects every proof.
pub struct FixedProof(pub bool);

impl ProofVerifier for FixedProof {
    fn verify(&self, _: &serde_json::Value, _: &[String], _: &VerificationKey) -> Result<(), ProofError> {
        if self.0 {
            Ok(())
        } else {
            Err(ProofError::Invalid)
        }
    }
}

pub fn verifier_with(policy: EligibilityPolicy, proof_ok: bool) -> IdentityVerifier {
    let mut keys = VerificationKeys::new();
    keys.insert("sha256", b"{}".to_vec());
    IdentityVerifier::new(policy, keys, Arc::new(FixedProof(proof_ok)), codec()).unwrap()
}

pub fn verifier() -> IdentityVerifier {
    verifier_with(policy(), true)
}

/// Minimal in-memory store for uniqueness checks.
#[derive(Default)]
pub struct MemStore {
    claims: Mutex<HashMap<String, Claim>>,
}

impl ClaimStore for MemStore {
    fn insert_claim(&self, claim: &Claim, policy: ConflictPolicy) -> Result<(), StoreError> {
        let mut claims = self.claims.lock().unwrap();
        if let Some(existing) = claims.get(&claim.nullifier) {
            if policy.blocks(existing) {
                return Err(StoreError::Duplicate(claim.nullifier.clone()));
            }
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
            .ok_or_else(|| StoreError::NotFound(nullifier.into()))
    }

    fn get_by_id(&self, id: &ClaimId) -> Result<Claim, StoreError> {
        self.claims
            .lock()
            .unwrap()
            .values()
            .find(|c| c.id == *id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn select_pending(&self, _limit: usize) -> Result<Vec<Claim>, StoreError> {
        Ok(Vec::new())
    }

    fn record_attempt(&self, n: &str, _: &TxHash, _: DateTime<Utc>) -> Result<Claim, StoreError> {
        self.get_by_nullifier(n)
    }

    fn update_status(
        &self,
        nullifier: &str,
        status: ClaimStatus,
        tx_hash: Option<&TxHash>,
        now: DateTime<Utc>,
    ) -> Result<Claim, StoreError> {
        let mut claims = self.claims.lock().unwrap();
        let claim = claims
            .get_mut(nullifier)
            .ok_or_else(|| StoreError::NotFound(nullifier.into()))?;
        claim.transition(status, tx_hash.cloned(), now).unwrap();
        Ok(claim.clone())
    }

    fn remove_staged(&self, nullifier: &str) -> Result<(), StoreError> {
        self.claims.lock().unwrap().remove(nullifier);
        Ok(())
    }

    fn claim_count(&self) -> Result<u64, StoreError> {
        Ok(self.claims.lock().unwrap().len() as u64)
    }

    fn pending_count(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
}
