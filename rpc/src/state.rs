//! Shared state handed to every handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prometheus::Registry;

use crate::intake::ClaimIntake;

/// Public campaign parameters clients need to build a proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CampaignParams {
    pub event_id: String,
    pub query_selector: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<ClaimIntake>,
    pub params: Arc<CampaignParams>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(intake: Arc<ClaimIntake>, params: CampaignParams, registry: Arc<Registry>) -> Self {
        Self {
            intake,
            params: Arc::new(params),
            registry,
        }
    }
}
