//! Service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use airdrop_broadcaster::{EngineConfig, DEFAULT_GAS_MULTIPLIER};
use airdrop_crypto::DEFAULT_ADDRESS_PREFIX;
use airdrop_rpc::{CampaignParams, IntakeMode};
use airdrop_store::ConflictPolicy;
use airdrop_types::Coin;
use airdrop_verification::{AddressBindingMode, EligibilityPolicy, PublicInputSchema};
use chrono::DateTime;

use crate::NodeError;

/// Configuration for the airdrop service.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every section may be omitted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub airdrop: AirdropConfig,

    #[serde(default)]
    pub campaign: CampaignConfig,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub broadcaster: BroadcasterConfig,

    #[serde(default)]
    pub intake: IntakeConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// HTTP port. `0` picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the LMDB claim database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// What every successful claim is paid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AirdropConfig {
    #[serde(default = "default_amount")]
    pub amount: u64,

    #[serde(default = "default_denom")]
    pub denom: String,

    #[serde(default = "default_address_prefix")]
    pub address_prefix: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CampaignConfig {
    #[serde(default)]
    pub event_id: String,

    #[serde(default)]
    pub query_selector: String,

    /// Campaign start, unix seconds.
    #[serde(default)]
    pub started_at: i64,

    #[serde(default = "default_min_age")]
    pub min_age: u32,

    #[serde(default)]
    pub allowed_citizenships: Vec<String>,

    #[serde(default)]
    pub address_binding: AddressBindingMode,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    #[serde(default)]
    pub schema: PublicInputSchema,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Verification key file per proof algorithm.
    #[serde(default)]
    pub keys: BTreeMap<String, PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BroadcasterConfig {
    /// Base URL of the ledger's REST gateway.
    #[serde(default = "default_ledger_url")]
    pub ledger_url: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// Hex-encoded 32-byte Ed25519 secret of the paying account.
    #[serde(default, skip_serializing)]
    pub sender_key: Option<String>,

    #[serde(default)]
    pub memo: String,

    #[serde(default = "default_gas_multiplier")]
    pub gas_multiplier: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default)]
    pub mode: IntakeMode,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./airdrop_data")
}

fn default_map_size_mb() -> usize {
    1024
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_amount() -> u64 {
    100
}

fn default_denom() -> String {
    "urmo".to_string()
}

fn default_address_prefix() -> String {
    DEFAULT_ADDRESS_PREFIX.to_string()
}

fn default_min_age() -> u32 {
    18
}

fn default_ledger_url() -> String {
    "http://127.0.0.1:1317".to_string()
}

fn default_chain_id() -> String {
    "airdrop-local-1".to_string()
}

fn default_gas_multiplier() -> u64 {
    DEFAULT_GAS_MULTIPLIER
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size_mb: default_map_size_mb(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

impl Default for AirdropConfig {
    fn default() -> Self {
        Self {
            amount: default_amount(),
            denom: default_denom(),
            address_prefix: default_address_prefix(),
        }
    }
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            event_id: String::new(),
            query_selector: String::new(),
            started_at: 0,
            min_age: default_min_age(),
            allowed_citizenships: Vec::new(),
            address_binding: AddressBindingMode::default(),
            conflict_policy: ConflictPolicy::default(),
            schema: PublicInputSchema::default(),
        }
    }
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            ledger_url: default_ledger_url(),
            chain_id: default_chain_id(),
            sender_key: None,
            memo: String::new(),
            gas_multiplier: default_gas_multiplier(),
            request_timeout_ms: default_request_timeout_ms(),
            engine: EngineConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string. The sender key is never written.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// Reject settings the service cannot start with.
    pub fn validate(&self) -> Result<(), NodeError> {
        let campaign = &self.campaign;
        if campaign.event_id.trim().is_empty() {
            return Err(NodeError::Config("campaign.event_id must be set".into()));
        }
        if campaign.query_selector.trim().is_empty() {
            return Err(NodeError::Config("campaign.query_selector must be set".into()));
        }
        if self.verifier.keys.is_empty() {
            return Err(NodeError::Config(
                "verifier.keys must name at least one verification key".into(),
            ));
        }
        if self.airdrop.amount == 0 {
            return Err(NodeError::Config("airdrop.amount must be positive".into()));
        }
        if self.broadcaster.gas_multiplier == 0 {
            return Err(NodeError::Config(
                "broadcaster.gas_multiplier must be positive".into(),
            ));
        }
        if self.broadcaster.sender_key.is_none() {
            return Err(NodeError::Config(
                "sender key missing (broadcaster.sender_key or AIRDROP_SENDER_KEY)".into(),
            ));
        }
        campaign.schema.validate().map_err(NodeError::Config)?;
        Ok(())
    }

    pub fn amount(&self) -> Coin {
        Coin::new(u128::from(self.airdrop.amount), self.airdrop.denom.clone())
    }

    pub fn eligibility_policy(&self) -> EligibilityPolicy {
        let c = &self.campaign;
        EligibilityPolicy {
            min_age: c.min_age,
            allowed_citizenships: c.allowed_citizenships.clone(),
            query_selector: c.query_selector.clone(),
            event_id: c.event_id.clone(),
            address_binding: c.address_binding,
            conflict_policy: c.conflict_policy,
            schema: c.schema.clone(),
        }
    }

    pub fn campaign_params(&self) -> Result<CampaignParams, NodeError> {
        let started_at = DateTime::from_timestamp(self.campaign.started_at, 0).ok_or_else(|| {
            NodeError::Config(format!(
                "campaign.started_at {} is out of range",
                self.campaign.started_at
            ))
        })?;
        Ok(CampaignParams {
            event_id: self.campaign.event_id.clone(),
            query_selector: self.campaign.query_selector.clone(),
            started_at,
        })
    }

    pub fn map_size_bytes(&self) -> usize {
        self.store.map_size_mb.saturating_mul(1024 * 1024)
    }
}
