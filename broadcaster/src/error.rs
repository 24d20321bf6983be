use airdrop_ledger::LedgerError;
use airdrop_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("gas estimate {estimate} overflows with multiplier {multiplier}")]
    GasOverflow { estimate: u64, multiplier: u64 },
}
