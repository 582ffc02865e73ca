use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::metrics::{PROXIED_TOTAL, UPSTREAM_ERRORS};
use crate::proxy::forward;
use crate::state::AppState;

/// Fallback for every path without a dedicated route: forward when a
/// routing rule matches, 404 otherwise.
pub async fn proxy_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let Some(rule) = state.routes.find(req.uri().path()) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let Some(backend) = rule.pool.pick() else {
        return GatewayError::NoBackend.into_response();
    };

    let client_addr = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    tracing::debug!(%method, %path, backend = %backend.url, "Forwarding");

    match forward(&state.client, req, &backend, rule, client_addr).await {
        Ok(response) => {
            PROXIED_TOTAL.inc();
            response
        }
        Err(e) => {
            UPSTREAM_ERRORS.inc();
            tracing::warn!(%method, %path, backend = %backend.url, error = %e, "Upstream request failed");
            e.into_response()
        }
    }
}
