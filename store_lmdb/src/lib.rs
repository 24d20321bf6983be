//! LMDB storage backend for the airdrop service.
//!
//! Implements the storage traits from `airdrop-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more named databases within a
//! single environment:
//!
//! | database | key | value |
//! |---|---|---|
//! | `claims` | nullifier | bincode `Claim` |
//! | `claim_ids` | claim id (16 bytes) | nullifier |
//! | `pending_claims` | created-at millis (BE) ++ nullifier | empty |
//! | `archived_claims` | claim id | bincode `Claim` replaced under a permissive conflict policy |
//! | `meta` | utf-8 key | raw bytes |

pub mod claim;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;

pub use claim::LmdbClaimStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use meta::LmdbMetaStore;
