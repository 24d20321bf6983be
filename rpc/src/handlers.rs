//! Request handlers.

use airdrop_types::ClaimId;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tracing::Instrument;

use crate::error::RpcError;
use crate::resources::{
    airdrop_response, AirdropParamsAttributes, AirdropParamsResponse, AirdropResponse,
    CreateAirdropRequest, Document, Resource, AIRDROP_PARAMS, CREATE_AIRDROP,
};
use crate::state::AppState;

pub async fn create_airdrop(
    State(state): State<AppState>,
    body: Result<Json<CreateAirdropRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AirdropResponse>), RpcError> {
    let Json(body) = body.map_err(|e| RpcError::BadRequest(e.body_text()))?;
    if body.data.kind != CREATE_AIRDROP {
        return Err(RpcError::BadRequest(format!(
            "data/type must be {CREATE_AIRDROP}, got {:?}",
            body.data.kind
        )));
    }
    let span = tracing::info_span!(
        "claim_intake",
        address = %body.data.attributes.address,
        algorithm = %body.data.attributes.algorithm
    );
    let claim = state
        .intake
        .submit(body.data.attributes)
        .instrument(span)
        .await?;
    Ok((StatusCode::CREATED, Json(airdrop_response(&claim))))
}

pub async fn get_airdrop(
    State(state): State<AppState>,
    Path(nullifier): Path<String>,
) -> Result<Json<AirdropResponse>, RpcError> {
    if nullifier.trim().is_empty() {
        return Err(RpcError::BadRequest("nullifier is required".into()));
    }
    let claim = state.intake.lookup(&nullifier)?;
    Ok(Json(airdrop_response(&claim)))
}

pub async fn get_airdrop_by_id(
    State(state): State<AppState>,
    Path(claim_id): Path<String>,
) -> Result<Json<AirdropResponse>, RpcError> {
    let id = ClaimId::parse(claim_id.trim())
        .ok_or_else(|| RpcError::BadRequest(format!("claim id {claim_id:?} is not a UUID")))?;
    let claim = state.intake.lookup_by_id(&id)?;
    Ok(Json(airdrop_response(&claim)))
}

pub async fn get_airdrop_params(State(state): State<AppState>) -> Json<AirdropParamsResponse> {
    Json(Document {
        data: Resource {
            id: String::new(),
            kind: AIRDROP_PARAMS.to_string(),
            attributes: AirdropParamsAttributes {
                event_id: state.params.event_id.clone(),
                query_selector: state.params.query_selector.clone(),
                started_at: state.params.started_at.timestamp(),
            },
        },
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: &'static str,
    pub claims: u64,
    pub pending: u64,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, RpcError> {
    let store = state.intake.store();
    let claims = store
        .claim_count()
        .map_err(|e| RpcError::Intake(e.into()))?;
    let pending = store
        .pending_count()
        .map_err(|e| RpcError::Intake(e.into()))?;
    Ok(Json(HealthResponse {
        status: "ok",
        mode: state.intake.mode().as_str(),
        claims,
        pending,
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<Response, RpcError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&state.registry.gather(), &mut buffer)
        .map_err(|e| RpcError::Internal(format!("encode metrics: {e}")))?;
    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
        .into_response())
}
