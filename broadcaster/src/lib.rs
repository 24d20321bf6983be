//! Broadcast engine for accepted claims.
//!
//! Claim intake only writes `pending` rows. This crate drives each of them to
//! a terminal status by paying it out on the ledger:
//!
//! - [`Submitter`]: one transfer attempt (account lookup, simulation, gas
//!   margin, signing, block-mode broadcast).
//! - [`BroadcastEngine`]: the poll loop. Strictly one claim at a time so the
//!   sender's sequence numbers never race.
//! - [`Reconciler`]: status writes with bounded retry, the [`StatusGuard`]
//!   that marks a claim `failed` when processing unwinds, and startup
//!   recovery of attempts interrupted by a crash.

pub mod backoff;
pub mod engine;
pub mod error;
pub mod observer;
pub mod reconciler;
pub mod submit;

pub use backoff::{Backoff, RetryPolicy};
pub use engine::{BroadcastEngine, ClaimOutcome, CycleReport, EngineConfig};
pub use error::BroadcastError;
pub use observer::{BroadcastObserver, NoopObserver};
pub use reconciler::{Reconciler, RecoveryReport, StatusGuard};
pub use submit::{AttemptOutcome, PreparedTx, Submitter, Turn, DEFAULT_GAS_MULTIPLIER};
