//! [`tracing::Span`] constructors for the service's long-running tasks.
//!
//! Per-claim spans live next to the code they cover (`broadcast_attempt` in
//! the engine, `claim_intake` in the HTTP handler).

use tracing::{info_span, Span};

/// Span covering the broadcast engine's poll loop.
pub fn engine_span(query_limit: usize) -> Span {
    info_span!("broadcast_engine", query_limit = %query_limit)
}

/// Span covering the HTTP API server.
pub fn http_span(addr: &str) -> Span {
    info_span!("http_api", addr = %addr)
}

/// Span covering startup recovery of in-flight transfers.
pub fn recovery_span(data_dir: &str) -> Span {
    info_span!("recovery", data_dir = %data_dir)
}
