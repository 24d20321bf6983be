//! Ed25519 message signing and verification.

use airdrop_types::{PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Returns `false` for malformed keys as well as bad signatures.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let sig = sign_message(b"sign doc", &kp.private);
        assert!(verify_signature(b"sign doc", &sig, &kp.public));
        assert!(!verify_signature(b"other doc", &sig, &kp.public));
    }

    #[test]
    fn wrong_key_fails() {
        let a = keypair_from_seed(&[1u8; 32]);
        let b = keypair_from_seed(&[2u8; 32]);
        let sig = sign_message(b"msg", &a.private);
        assert!(!verify_signature(b"msg", &sig, &b.public));
    }

    #[test]
    fn signatures_are_deterministic() {
        let kp = keypair_from_seed(&[9u8; 32]);
        assert_eq!(sign_message(b"x", &kp.private), sign_message(b"x", &kp.private));
    }
}
