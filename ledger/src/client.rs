//! The ledger RPC boundary.

use airdrop_types::{AccountAddress, TxHash};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Signing state of an account, re-read before every transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Outcome of a block-mode broadcast, or of a transaction lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    /// Absent when the ledger rejected the transaction before hashing it.
    pub tx_hash: Option<TxHash>,
    /// `0` means the transaction executed successfully.
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
}

impl BroadcastResult {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Account query, simulation, block-mode broadcast and transaction lookup.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn account(&self, address: &AccountAddress) -> Result<AccountInfo, LedgerError>;

    /// Dry-run a transaction and return the gas it used.
    async fn simulate(&self, tx_bytes: &[u8]) -> Result<u64, LedgerError>;

    /// Submit and wait for block inclusion.
    async fn broadcast(&self, tx_bytes: &[u8]) -> Result<BroadcastResult, LedgerError>;

    /// `None` when the ledger has no record of `hash`.
    async fn get_tx(&self, hash: &TxHash) -> Result<Option<BroadcastResult>, LedgerError>;
}
