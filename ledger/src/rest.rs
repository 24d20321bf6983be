//! REST gateway client for a Cosmos-style ledger.
//!
//! | operation | request |
//! |---|---|
//! | account | `GET  /cosmos/auth/v1beta1/accounts/{address}` |
//! | simulate | `POST /cosmos/tx/v1beta1/simulate` |
//! | broadcast | `POST /cosmos/tx/v1beta1/txs` (block mode) |
//! | lookup | `GET  /cosmos/tx/v1beta1/txs/{hash}` |
//!
//! Transaction bytes travel base64-encoded. Integer fields are accepted either as
//! JSON numbers or as decimal strings, as gateways emit both.

use std::time::Duration;

use airdrop_types::{AccountAddress, TxHash};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{AccountInfo, BroadcastResult, LedgerClient, LedgerError};

/// Default timeout for ledger requests. Block-mode broadcasts wait for inclusion.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const BROADCAST_MODE_BLOCK: &str = "BROADCAST_MODE_BLOCK";

fn u64_from_str_or_num<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }
    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
struct AccountResponse {
    account: RawAccount,
}

#[derive(Deserialize)]
struct RawAccount {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    account_number: u64,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    sequence: u64,
}

#[derive(Serialize)]
struct SimulateRequest<'a> {
    tx_bytes: &'a str,
}

#[derive(Deserialize)]
struct SimulateResponse {
    gas_info: GasInfo,
}

#[derive(Deserialize)]
struct GasInfo {
    #[serde(deserialize_with = "u64_from_str_or_num")]
    gas_used: u64,
}

#[derive(Serialize)]
struct BroadcastRequest<'a> {
    tx_bytes: &'a str,
    mode: &'a str,
}

#[derive(Deserialize)]
struct TxResponseEnvelope {
    tx_response: RawTxResponse,
}

#[derive(Deserialize)]
struct RawTxResponse {
    #[serde(default)]
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
}

impl From<RawTxResponse> for BroadcastResult {
    fn from(raw: RawTxResponse) -> Self {
        BroadcastResult {
            tx_hash: (!raw.txhash.is_empty()).then(|| TxHash::new(raw.txhash)),
            code: raw.code,
            raw_log: raw.raw_log,
        }
    }
}

fn map_send_error(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Unreachable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        LedgerError::Unreachable(format!("connection failed: {e}"))
    } else {
        LedgerError::RequestFailed(e.to_string())
    }
}

/// [`LedgerClient`] over the ledger's REST gateway.
pub struct RestLedgerClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl RestLedgerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LedgerError> {
        response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("failed to parse ledger response: {e}")))
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("HTTP status {status}: {body}")
    }
}

#[async_trait]
impl LedgerClient for RestLedgerClient {
    async fn account(&self, address: &AccountAddress) -> Result<AccountInfo, LedgerError> {
        let url = self.url(&format!("/cosmos/auth/v1beta1/accounts/{address}"));
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(map_send_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(LedgerError::AccountNotFound(address.to_string())),
            s if s.is_success() => {
                let body: AccountResponse = Self::read_json(response).await?;
                Ok(AccountInfo {
                    account_number: body.account.account_number,
                    sequence: body.account.sequence,
                })
            }
            _ => Err(LedgerError::RequestFailed(Self::error_body(response).await)),
        }
    }

    async fn simulate(&self, tx_bytes: &[u8]) -> Result<u64, LedgerError> {
        let encoded = STANDARD.encode(tx_bytes);
        let response = self
            .http_client
            .post(self.url("/cosmos/tx/v1beta1/simulate"))
            .json(&SimulateRequest { tx_bytes: &encoded })
            .send()
            .await
            .map_err(map_send_error)?;
        if !response.status().is_success() {
            return Err(LedgerError::SimulationFailed(Self::error_body(response).await));
        }
        let body: SimulateResponse = Self::read_json(response).await?;
        Ok(body.gas_info.gas_used)
    }

    async fn broadcast(&self, tx_bytes: &[u8]) -> Result<BroadcastResult, LedgerError> {
        let encoded = STANDARD.encode(tx_bytes);
        let response = self
            .http_client
            .post(self.url("/cosmos/tx/v1beta1/txs"))
            .json(&BroadcastRequest {
                tx_bytes: &encoded,
                mode: BROADCAST_MODE_BLOCK,
            })
            .send()
            .await
            .map_err(map_send_error)?;
        if !response.status().is_success() {
            return Err(LedgerError::RequestFailed(Self::error_body(response).await));
        }
        let body: TxResponseEnvelope = Self::read_json(response).await?;
        Ok(body.tx_response.into())
    }

    async fn get_tx(&self, hash: &TxHash) -> Result<Option<BroadcastResult>, LedgerError> {
        let url = self.url(&format!("/cosmos/tx/v1beta1/txs/{hash}"));
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(map_send_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let body: TxResponseEnvelope = Self::read_json(response).await?;
                Ok(Some(body.tx_response.into()))
            }
            _ => Err(LedgerError::RequestFailed(Self::error_body(response).await)),
        }
    }
}
