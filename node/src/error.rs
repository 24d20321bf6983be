use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] airdrop_store::StoreError),

    #[error("database error: {0}")]
    Lmdb(#[from] airdrop_store_lmdb::LmdbError),

    #[error("verification error: {0}")]
    Verification(#[from] airdrop_verification::VerificationError),

    #[error("ledger error: {0}")]
    Ledger(#[from] airdrop_ledger::LedgerError),

    #[error("broadcast error: {0}")]
    Broadcast(#[from] airdrop_broadcaster::BroadcastError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server error: {0}")]
    Rpc(String),

    #[error("shutdown timeout")]
    ShutdownTimeout,

    #[error("service already started")]
    AlreadyStarted,
}
