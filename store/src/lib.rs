//! Abstract storage traits for the airdrop service.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. Intake and the broadcast engine depend only on the traits.

pub mod claim;
pub mod error;
pub mod meta;

pub use claim::{ClaimStore, ConflictPolicy};
pub use error::StoreError;
pub use meta::MetaStore;
