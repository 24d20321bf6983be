//! HTTP API for the airdrop service.
//!
//! - `POST /integrations/airdrop-svc/airdrops`: submit a claim
//! - `GET /integrations/airdrop-svc/airdrops/{nullifier}`: claim status
//! - `GET /integrations/airdrop-svc/airdrops/params`: campaign parameters
//! - `GET /metrics`, `GET /health`
//!
//! Bodies follow the JSON:API envelope (`data` / `errors`).

pub mod error;
pub mod handlers;
pub mod intake;
pub mod resources;
pub mod server;
pub mod state;

pub use error::RpcError;
pub use intake::{ClaimIntake, IntakeError, IntakeMode, IntakeObserver, NoopIntakeObserver};
pub use server::{router, RpcServer, AIRDROPS_PATH};
pub use state::{AppState, CampaignParams};
