//! Airdrop service node: wires the claim store, identity verifier, HTTP API
//! and broadcast engine together and runs them until shutdown.
//!
//! Startup order:
//! 1. Open the LMDB claim database and check it belongs to this campaign
//! 2. Load verification keys (an unusable key aborts startup)
//! 3. Resolve transfers left in flight by an earlier process
//! 4. Start the broadcast engine and the HTTP API

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod shutdown;
pub mod tracing_spans;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::ServiceMetrics;
pub use service::AirdropService;
pub use shutdown::{ShutdownController, ShutdownReason};
