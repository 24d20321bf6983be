//! Ledger client adapter.
//!
//! The service pays claims from one account on an external account-based
//! ledger. This crate builds and signs transfer transactions and talks to the
//! ledger's REST gateway. The ledger's consensus and account model are not
//! reimplemented: they are consumed through [`LedgerClient`].

pub mod client;
pub mod error;
pub mod rest;
pub mod tx;

pub use client::{AccountInfo, BroadcastResult, LedgerClient};
pub use error::LedgerError;
pub use rest::RestLedgerClient;
pub use tx::{Fee, SignDoc, SignedTx, TransferMsg, TxBuilder, UnsignedTx};
