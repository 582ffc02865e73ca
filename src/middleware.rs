use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::error::GatewayError;
use crate::metrics::{RATE_LIMITED, RATE_LIMIT_ENTRIES, REQUEST_LATENCY, REQUEST_TOTAL};
use crate::state::AppState;

const UNKNOWN_CLIENT: &str = "unknown";

// Client key used for rate limiting: the peer ip of the connection
pub fn client_key<B>(req: &axum::http::Request<B>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Admission control in front of every route. Rejected requests never reach
/// routing or the proxy.
pub async fn rate_limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    let admitted = state.rate_limiter.admit(&key);
    RATE_LIMIT_ENTRIES.set(state.rate_limiter.len() as f64);

    if !admitted {
        RATE_LIMITED.inc();
        tracing::debug!(client = %key, "Rate limit exceeded");
        return GatewayError::RateLimited.into_response();
    }

    next.run(req).await
}

// One access log line per request
pub async fn access_log(req: Request, next: Next) -> Response {
    REQUEST_TOTAL.inc();

    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client = client_key(&req);

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    REQUEST_LATENCY.observe(elapsed.as_secs_f64());
    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        %client,
        latency_ms = elapsed.as_millis() as u64,
        "request"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn key_is_peer_ip_without_port() {
        let addr: SocketAddr = "10.1.2.3:51234".parse().unwrap();
        let mut req = axum::http::Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_key(&req), "10.1.2.3");
    }

    #[test]
    fn missing_connect_info_falls_back_to_unknown() {
        let req = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&req), UNKNOWN_CLIENT);
    }
}
