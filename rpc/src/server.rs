//! Axum-based HTTP server.

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::RpcError;
use crate::handlers;
use crate::state::AppState;

pub const AIRDROPS_PATH: &str = "/integrations/airdrop-svc/airdrops";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(AIRDROPS_PATH, post(handlers::create_airdrop))
        .route(
            &format!("{AIRDROPS_PATH}/params"),
            get(handlers::get_airdrop_params),
        )
        .route(
            &format!("{AIRDROPS_PATH}/:nullifier"),
            get(handlers::get_airdrop),
        )
        .route(
            &format!("{AIRDROPS_PATH}/by-id/:claim_id"),
            get(handlers::get_airdrop_by_id),
        )
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub struct RpcServer {
    state: AppState,
}

impl RpcServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Serve on `listener` until `shutdown_rx` fires, then drain open requests.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), RpcError> {
        let addr = listener
            .local_addr()
            .map_err(|e| RpcError::Server(e.to_string()))?;
        tracing::info!(%addr, "HTTP API listening");
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                tracing::info!("HTTP API draining");
            })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
