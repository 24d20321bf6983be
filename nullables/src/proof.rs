//! Nullable proof verifier.

use airdrop_verification::{ProofError, ProofVerifier, VerificationKey};
use std::sync::Mutex;

enum Mode {
    Accept,
    Reject,
    BadKey,
}

/// A proof verifier with a fixed verdict that records every call.
pub struct NullProofVerifier {
    mode: Mode,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl NullProofVerifier {
    pub fn accepting() -> Self {
        Self::with_mode(Mode::Accept)
    }

    pub fn rejecting() -> Self {
        Self::with_mode(Mode::Reject)
    }

    /// Reports every key as unusable.
    pub fn broken_keys() -> Self {
        Self::with_mode(Mode::BadKey)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(algorithm, public inputs)` of every verification so far.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProofVerifier for NullProofVerifier {
    fn verify(
        &self,
        _proof: &serde_json::Value,
        public_inputs: &[String],
        key: &VerificationKey,
    ) -> Result<(), ProofError> {
        self.calls
            .lock()
            .unwrap()
            .push((key.algorithm.clone(), public_inputs.to_vec()));
        match self.mode {
            Mode::Accept => Ok(()),
            Mode::Reject => Err(ProofError::Invalid),
            Mode::BadKey => Err(ProofError::BadKey("null verifier".into())),
        }
    }

    fn check_key(&self, _key: &VerificationKey) -> Result<(), ProofError> {
        match self.mode {
            Mode::BadKey => Err(ProofError::BadKey("null verifier".into())),
            _ => Ok(()),
        }
    }
}
