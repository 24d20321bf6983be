//! Nullable ledger: scriptable responses, recorded submissions.

use airdrop_crypto::hash_transaction;
use airdrop_ledger::{AccountInfo, BroadcastResult, LedgerClient, LedgerError, SignedTx};
use airdrop_types::{AccountAddress, TxHash};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Ledger code for a transaction signed with a stale sequence.
pub const CODE_WRONG_SEQUENCE: u32 = 32;

/// What the next broadcast should do.
pub enum ScriptedBroadcast {
    /// Include the transaction with this result code. With `with_hash` the
    /// response carries the transaction hash.
    Code { code: u32, with_hash: bool },
    /// Respond with this exact result.
    Result(BroadcastResult),
    /// Fail at the transport level after the ledger has included the transaction.
    LostAfterInclusion,
    /// Fail at the transport level before the ledger saw the transaction.
    Unreachable,
}

struct State {
    account: AccountInfo,
    gas_estimate: u64,
    simulate_error: Option<String>,
    account_error: Option<String>,
    script: VecDeque<ScriptedBroadcast>,
    broadcasts: Vec<SignedTx>,
    simulations: usize,
    account_queries: usize,
    known_txs: HashMap<String, BroadcastResult>,
    delay: Option<Duration>,
}

/// A ledger that keeps one account's sequence and records every submission.
///
/// Unscripted broadcasts succeed. A transaction whose sequence differs from
/// the account's current one is rejected with [`CODE_WRONG_SEQUENCE`] and no
/// hash, as a real ledger's ante handler would. Included transactions
/// (any code, with a hash) advance the sequence.
pub struct NullLedger {
    state: Mutex<State>,
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl NullLedger {
    pub fn new() -> Self {
        Self::with_account(1, 0)
    }

    pub fn with_account(account_number: u64, sequence: u64) -> Self {
        Self {
            state: Mutex::new(State {
                account: AccountInfo {
                    account_number,
                    sequence,
                },
                gas_estimate: 50_000,
                simulate_error: None,
                account_error: None,
                script: VecDeque::new(),
                broadcasts: Vec::new(),
                simulations: 0,
                account_queries: 0,
                known_txs: HashMap::new(),
                delay: None,
            }),
        }
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.state.lock().unwrap().gas_estimate = gas;
    }

    pub fn fail_simulation(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().simulate_error = Some(reason.into());
    }

    pub fn fail_account_lookup(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().account_error = Some(reason.into());
    }

    /// Queue the outcome of the next unscripted broadcast.
    pub fn script(&self, next: ScriptedBroadcast) {
        self.state.lock().unwrap().script.push_back(next);
    }

    /// Make every broadcast take this long (for shutdown tests).
    pub fn set_broadcast_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Register a transaction the ledger already knows about.
    pub fn insert_tx(&self, hash: &TxHash, result: BroadcastResult) {
        self.state
            .lock()
            .unwrap()
            .known_txs
            .insert(hash.as_str().to_string(), result);
    }

    /// Every transaction submitted so far, in order.
    pub fn broadcasts(&self) -> Vec<SignedTx> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.broadcasts().iter().map(|tx| tx.sequence).collect()
    }

    pub fn gas_limits(&self) -> Vec<u64> {
        self.broadcasts().iter().map(|tx| tx.body.fee.gas_limit).collect()
    }

    pub fn current_sequence(&self) -> u64 {
        self.state.lock().unwrap().account.sequence
    }

    pub fn simulations(&self) -> usize {
        self.state.lock().unwrap().simulations
    }

    pub fn account_queries(&self) -> usize {
        self.state.lock().unwrap().account_queries
    }

    fn include(state: &mut State, hash: &TxHash, code: u32) -> BroadcastResult {
        let result = BroadcastResult {
            tx_hash: Some(hash.clone()),
            code,
            raw_log: if code == 0 { String::new() } else { format!("failed with code {code}") },
        };
        state.account.sequence += 1;
        state
            .known_txs
            .insert(hash.as_str().to_string(), result.clone());
        result
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn account(&self, _address: &AccountAddress) -> Result<AccountInfo, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.account_queries += 1;
        if let Some(reason) = &state.account_error {
            return Err(LedgerError::RequestFailed(reason.clone()));
        }
        Ok(state.account)
    }

    async fn simulate(&self, tx_bytes: &[u8]) -> Result<u64, LedgerError> {
        SignedTx::decode(tx_bytes)?;
        let mut state = self.state.lock().unwrap();
        state.simulations += 1;
        match &state.simulate_error {
            Some(reason) => Err(LedgerError::SimulationFailed(reason.clone())),
            None => Ok(state.gas_estimate),
        }
    }

    async fn broadcast(&self, tx_bytes: &[u8]) -> Result<BroadcastResult, LedgerError> {
        let tx = SignedTx::decode(tx_bytes)?;
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let hash = hash_transaction(tx_bytes);
        let mut state = self.state.lock().unwrap();
        state.broadcasts.push(tx.clone());

        let scripted = state.script.pop_front();
        if matches!(scripted, Some(ScriptedBroadcast::Unreachable)) {
            return Err(LedgerError::Unreachable("scripted transport failure".into()));
        }
        if tx.sequence != state.account.sequence {
            return Ok(BroadcastResult {
                tx_hash: None,
                code: CODE_WRONG_SEQUENCE,
                raw_log: format!(
                    "account sequence mismatch, expected {}, got {}",
                    state.account.sequence, tx.sequence
                ),
            });
        }

        match scripted {
            None => Ok(Self::include(&mut state, &hash, 0)),
            Some(ScriptedBroadcast::Code { code, with_hash }) => {
                if with_hash {
                    Ok(Self::include(&mut state, &hash, code))
                } else {
                    Ok(BroadcastResult {
                        tx_hash: None,
                        code,
                        raw_log: format!("rejected with code {code}"),
                    })
                }
            }
            Some(ScriptedBroadcast::Result(result)) => {
                if result.tx_hash.is_some() {
                    state.account.sequence += 1;
                }
                Ok(result)
            }
            Some(ScriptedBroadcast::LostAfterInclusion) => {
                Self::include(&mut state, &hash, 0);
                Err(LedgerError::Unreachable("connection reset after submit".into()))
            }
            Some(ScriptedBroadcast::Unreachable) => {
                Err(LedgerError::Unreachable("scripted transport failure".into()))
            }
        }
    }

    async fn get_tx(&self, hash: &TxHash) -> Result<Option<BroadcastResult>, LedgerError> {
        Ok(self.state.lock().unwrap().known_txs.get(hash.as_str()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_crypto::{keypair_from_seed, AddressCodec};
    use airdrop_ledger::TxBuilder;
    use airdrop_types::Coin;

    fn signed(sequence: u64) -> Vec<u8> {
        let b = TxBuilder::new("test", keypair_from_seed(&[1u8; 32]), &AddressCodec::default());
        let body = b.transfer(&AccountAddress::from("drop_to"), &Coin::new(1, "urmo"), 100);
        b.sign(
            body,
            AccountInfo {
                account_number: 1,
                sequence,
            },
        )
        .unwrap()
        .encode()
        .unwrap()
    }

    #[tokio::test]
    async fn success_advances_sequence() {
        let ledger = NullLedger::new();
        let result = ledger.broadcast(&signed(0)).await.unwrap();
        assert!(result.is_success());
        assert_eq!(ledger.current_sequence(), 1);
        let hash = result.tx_hash.unwrap();
        assert_eq!(ledger.get_tx(&hash).await.unwrap().unwrap().code, 0);
    }

    #[tokio::test]
    async fn stale_sequence_rejected_without_hash() {
        let ledger = NullLedger::with_account(1, 5);
        let result = ledger.broadcast(&signed(4)).await.unwrap();
        assert_eq!(result.code, CODE_WRONG_SEQUENCE);
        assert!(result.tx_hash.is_none());
        assert_eq!(ledger.current_sequence(), 5);
    }

    #[tokio::test]
    async fn scripted_failure_with_hash_is_included() {
        let ledger = NullLedger::new();
        ledger.script(ScriptedBroadcast::Code {
            code: 5,
            with_hash: true,
        });
        let result = ledger.broadcast(&signed(0)).await.unwrap();
        assert_eq!(result.code, 5);
        assert!(result.tx_hash.is_some());
        assert_eq!(ledger.current_sequence(), 1);
    }

    #[tokio::test]
    async fn lost_response_still_lands() {
        let ledger = NullLedger::new();
        ledger.script(ScriptedBroadcast::LostAfterInclusion);
        let bytes = signed(0);
        assert!(ledger.broadcast(&bytes).await.is_err());
        let found = ledger.get_tx(&hash_transaction(&bytes)).await.unwrap();
        assert!(found.unwrap().is_success());
    }
}
