//! End-to-end eligibility check for one claim request.

use std::sync::Arc;

use airdrop_crypto::AddressCodec;
use airdrop_store::{ClaimStore, ConflictPolicy};
use airdrop_types::AccountAddress;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::binding::AddressBindingMode;
use crate::dates::{
    birth_date_from_parts, decode_citizenship, latest_eligible_birth_date, parse_yymmdd,
};
use crate::{
    ClaimRequest, ProofError, ProofVerifier, PublicInputSchema, PublicInputs, Rejection,
    VerificationError, VerificationKeys,
};

/// Campaign rules a proof must satisfy. Immutable after startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityPolicy {
    pub min_age: u32,
    /// Country codes (`"FRA"`). An empty list admits nobody.
    pub allowed_citizenships: Vec<String>,
    pub query_selector: String,
    pub event_id: String,
    pub address_binding: AddressBindingMode,
    pub conflict_policy: ConflictPolicy,
    pub schema: PublicInputSchema,
}

/// What a successful verification established about the claimant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedClaim {
    pub nullifier: String,
    pub address: AccountAddress,
    pub citizenship: String,
    pub birth_date: NaiveDate,
}

pub struct IdentityVerifier {
    policy: EligibilityPolicy,
    keys: VerificationKeys,
    proof_verifier: Arc<dyn ProofVerifier>,
    codec: AddressCodec,
}

impl IdentityVerifier {
    /// Fails if the schema indexes out of range or any key is unusable.
    pub fn new(
        policy: EligibilityPolicy,
        keys: VerificationKeys,
        proof_verifier: Arc<dyn ProofVerifier>,
        codec: AddressCodec,
    ) -> Result<Self, VerificationError> {
        policy.schema.validate().map_err(VerificationError::Key)?;
        keys.check_with(proof_verifier.as_ref())?;
        Ok(Self {
            policy,
            keys,
            proof_verifier,
            codec,
        })
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    pub fn codec(&self) -> &AddressCodec {
        &self.codec
    }

    /// Cheap shape checks with no proof work: address format, algorithm and
    /// proof presence, public-input count.
    pub fn validate_structure(&self, request: &ClaimRequest) -> Result<(), Rejection> {
        self.codec
            .decode(&request.address)
            .map_err(|e| Rejection::InvalidAddress(e.to_string()))?;
        if request.algorithm.trim().is_empty() {
            return Err(Rejection::UnsupportedAlgorithm(String::new()));
        }
        if request.zk_proof.proof.is_null() {
            return Err(Rejection::InvalidProof);
        }
        self.policy.schema.extract(&request.zk_proof.pub_signals)?;
        Ok(())
    }

    /// The nullifier a request claims, after the length check.
    pub fn nullifier_of<'a>(&self, request: &'a ClaimRequest) -> Result<&'a str, Rejection> {
        Ok(self
            .policy
            .schema
            .extract(&request.zk_proof.pub_signals)?
            .nullifier)
    }

    /// Run every check. Any single failure rejects.
    pub fn verify(
        &self,
        request: &ClaimRequest,
        store: &dyn ClaimStore,
        now: DateTime<Utc>,
    ) -> Result<VerifiedClaim, VerificationError> {
        let inputs = self.policy.schema.extract(&request.zk_proof.pub_signals)?;
        self.check_proof(request)?;
        let verified = self.check_statement(request, &inputs, now)?;
        self.check_unique(store, &verified.nullifier)?;
        tracing::debug!(nullifier = %verified.nullifier, address = %verified.address, "claim verified");
        Ok(verified)
    }

    fn check_proof(&self, request: &ClaimRequest) -> Result<(), VerificationError> {
        let key = self
            .keys
            .get(&request.algorithm)
            .ok_or_else(|| Rejection::UnsupportedAlgorithm(request.algorithm.clone()))?;
        match self
            .proof_verifier
            .verify(&request.zk_proof.proof, &request.zk_proof.pub_signals, key)
        {
            Ok(()) => Ok(()),
            Err(ProofError::Invalid) => Err(Rejection::InvalidProof.into()),
            Err(ProofError::Malformed(reason)) => {
                tracing::debug!(%reason, "malformed proof");
                Err(Rejection::InvalidProof.into())
            }
            Err(ProofError::BadKey(reason)) => Err(VerificationError::Key(reason)),
        }
    }

    /// Freshness, document expiry, age, citizenship, selector, event id and
    /// address binding.
    /// Depends only on its arguments.
    pub fn check_statement(
        &self,
        request: &ClaimRequest,
        inputs: &PublicInputs<'_>,
        now: DateTime<Utc>,
    ) -> Result<VerifiedClaim, Rejection> {
        let today = now.date_naive();
        if inputs.current_date != today {
            return Err(Rejection::StaleProof {
                proof_date: inputs.current_date,
                today,
            });
        }
        if inputs.expiration_date <= today {
            return Err(Rejection::DocumentExpired {
                expired_on: inputs.expiration_date,
            });
        }

        let (yy, mm, dd) = parse_yymmdd(inputs.birth_date).ok_or(Rejection::InvalidInput {
            name: "birth_date",
            reason: "expected YYMMDD".into(),
        })?;
        let birth_date =
            birth_date_from_parts(yy, mm, dd, today).ok_or(Rejection::InvalidInput {
                name: "birth_date",
                reason: "not a calendar date".into(),
            })?;
        let latest = latest_eligible_birth_date(today, self.policy.min_age).ok_or(
            Rejection::Underage {
                birth_date,
                min_age: self.policy.min_age,
            },
        )?;
        if birth_date > latest {
            return Err(Rejection::Underage {
                birth_date,
                min_age: self.policy.min_age,
            });
        }

        let citizenship = decode_citizenship(inputs.citizenship)
            .ok_or_else(|| Rejection::CitizenshipNotAllowed(inputs.citizenship.to_string()))?;
        let allowed = self
            .policy
            .allowed_citizenships
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(&citizenship));
        if !allowed {
            return Err(Rejection::CitizenshipNotAllowed(citizenship));
        }

        if inputs.selector != self.policy.query_selector {
            return Err(Rejection::SelectorMismatch);
        }
        if inputs.event_id != self.policy.event_id {
            return Err(Rejection::EventMismatch);
        }

        if !self
            .policy
            .address_binding
            .matches(&self.codec, &request.address, inputs.address_binding)?
        {
            return Err(Rejection::AddressMismatch(request.address.clone()));
        }

        Ok(VerifiedClaim {
            nullifier: inputs.nullifier.to_string(),
            address: AccountAddress::new(request.address.clone()),
            citizenship,
            birth_date,
        })
    }

    fn check_unique(&self, store: &dyn ClaimStore, nullifier: &str) -> Result<(), VerificationError> {
        if let Some(existing) = store.find_by_nullifier(nullifier)? {
            if self.policy.conflict_policy.blocks(&existing) {
                return Err(Rejection::AlreadyClaimed(nullifier.to_string()).into());
            }
        }
        Ok(())
    }
}
