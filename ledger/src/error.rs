use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    #[error("ledger request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response from ledger: {0}")]
    InvalidResponse(String),

    #[error("account {0} not found on ledger")]
    AccountNotFound(String),

    #[error("simulation failed: {0}")]
    SimulationFailed(String),

    #[error("transaction encoding failed: {0}")]
    Encoding(String),
}

impl LedgerError {
    /// Network-level failures where the request may not have reached the ledger.
    pub fn is_transport(&self) -> bool {
        matches!(self, LedgerError::Unreachable(_))
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Encoding(e.to_string())
    }
}
