//! Pluggable zero-knowledge proof verification.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::{ProofError, VerificationError};

/// Raw verification key bytes for one algorithm, as loaded from disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationKey {
    pub algorithm: String,
    pub bytes: Vec<u8>,
}

/// Checks a proof against its public inputs under a verification key.
///
/// The proof system itself is external; implementations adapt one
/// (Groth16 over BN254 in production, scripted doubles in tests).
pub trait ProofVerifier: Send + Sync {
    fn verify(
        &self,
        proof: &serde_json::Value,
        public_inputs: &[String],
        key: &VerificationKey,
    ) -> Result<(), ProofError>;

    /// Parse a key once at startup so an unusable key aborts the service
    /// instead of failing every request.
    fn check_key(&self, _key: &VerificationKey) -> Result<(), ProofError> {
        Ok(())
    }
}

/// Verification keys by algorithm name.
#[derive(Clone, Debug, Default)]
pub struct VerificationKeys {
    keys: HashMap<String, VerificationKey>,
}

impl VerificationKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, algorithm: impl Into<String>, bytes: Vec<u8>) {
        let algorithm = algorithm.into();
        self.keys.insert(
            algorithm.clone(),
            VerificationKey { algorithm, bytes },
        );
    }

    /// Read every configured key file. Any unreadable file is an error.
    pub fn load(paths: &BTreeMap<String, PathBuf>) -> Result<Self, VerificationError> {
        let mut keys = Self::new();
        for (algorithm, path) in paths {
            let bytes = std::fs::read(path).map_err(|e| {
                VerificationError::Key(format!(
                    "failed to read verification key for '{algorithm}' at {}: {e}",
                    path.display()
                ))
            })?;
            tracing::debug!(algorithm = %algorithm, path = %path.display(), "loaded verification key");
            keys.insert(algorithm.clone(), bytes);
        }
        Ok(keys)
    }

    /// Run `verifier.check_key` over every key.
    pub fn check_with(&self, verifier: &dyn ProofVerifier) -> Result<(), VerificationError> {
        for key in self.keys.values() {
            verifier
                .check_key(key)
                .map_err(|e| VerificationError::Key(format!("{}: {e}", key.algorithm)))?;
        }
        Ok(())
    }

    pub fn get(&self, algorithm: &str) -> Option<&VerificationKey> {
        self.keys.get(algorithm)
    }

    pub fn algorithms(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
