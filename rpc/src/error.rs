//! HTTP errors, rendered as JSON:API error documents.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::intake::IntakeError;
use crate::resources::{ErrorDocument, ErrorObject};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Intake(e) => match e {
                IntakeError::Rejected(_) => StatusCode::BAD_REQUEST,
                IntakeError::Conflict(_) => StatusCode::CONFLICT,
                IntakeError::NotFound(_) => StatusCode::NOT_FOUND,
                IntakeError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                IntakeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            RpcError::Internal(_) | RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            RpcError::BadRequest(_) => "Bad Request",
            RpcError::Intake(IntakeError::Rejected(_)) => "Proof rejected",
            RpcError::Intake(IntakeError::Conflict(_)) => "Already claimed",
            RpcError::Intake(IntakeError::NotFound(_)) => "Not Found",
            RpcError::Intake(IntakeError::Unavailable(_)) => "Temporarily unavailable",
            _ => "Internal Server Error",
        }
    }

    /// Clients get the reason for their own mistakes only.
    fn detail(&self) -> Option<String> {
        match self {
            RpcError::BadRequest(_)
            | RpcError::Intake(IntakeError::Rejected(_))
            | RpcError::Intake(IntakeError::Conflict(_)) => Some(self.to_string()),
            _ => None,
        }
    }

    fn meta(&self) -> Option<serde_json::Value> {
        match self {
            RpcError::Intake(IntakeError::Rejected(rejection)) => {
                Some(serde_json::json!({ "reason": rejection.code() }))
            }
            RpcError::Intake(IntakeError::Conflict(_)) => {
                Some(serde_json::json!({ "reason": "already-claimed" }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorDocument {
            errors: vec![ErrorObject {
                title: self.title().to_string(),
                status: status.as_u16().to_string(),
                detail: self.detail(),
                meta: self.meta(),
            }],
        };
        (status, Json(body)).into_response()
    }
}
