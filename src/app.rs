use axum::{
    Router, middleware,
    routing::get,
};
use std::sync::Arc;

use crate::handlers::{health_handler, metrics_handler, proxy_handler, root_handler};
use crate::middleware::{access_log, rate_limit};
use crate::state::AppState;

/// Gateway pipeline: access log -> rate limiter -> (fixed routes | prefix proxy).
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        // other methods on `/` go through routing like any unrouted request
        .route("/", get(root_handler).fallback(proxy_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(proxy_handler)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), rate_limit))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}
