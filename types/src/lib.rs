//! Fundamental types for the airdrop service.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! claims and their status lifecycle, account addresses, coins, transaction hashes,
//! signing keys, and the clock abstraction.

pub mod address;
pub mod claim;
pub mod coin;
pub mod error;
pub mod hash;
pub mod keys;
pub mod time;

pub use address::AccountAddress;
pub use claim::{Claim, ClaimId, ClaimStatus};
pub use coin::Coin;
pub use error::AirdropError;
pub use hash::TxHash;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use time::{Clock, SystemClock};
