//! Cryptographic primitives for the airdrop service.
//!
//! - **Ed25519** for signing ledger transactions with the sender key
//! - **Blake2b** for address checksums and address-to-proof binding
//! - **SHA-256** for transaction hashes
//! - Address encoding with a configurable prefix and base32 payload

pub mod address;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::{AddressCodec, DEFAULT_ADDRESS_PREFIX};
pub use hash::{blake2b_256, blake2b_256_multi, hash_transaction, sha256};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
