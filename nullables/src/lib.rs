//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the service (clock, claim store, ledger,
//! proof system) sits behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record what was asked of them
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod ledger;
pub mod proof;
pub mod store;

pub use clock::NullClock;
pub use ledger::{NullLedger, ScriptedBroadcast};
pub use proof::NullProofVerifier;
pub use store::NullClaimStore;
