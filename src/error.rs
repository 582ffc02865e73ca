use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later";
pub const BAD_GATEWAY_MESSAGE: &str = "Bad Gateway";

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("invalid upstream url: {0}")]
    InvalidUpstreamUrl(String),

    #[error("malformed upstream response: {0}")]
    BadUpstreamResponse(String),

    #[error("no backend available for route")]
    NoBackend,

    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream(_)
            | GatewayError::UpstreamTimeout
            | GatewayError::InvalidUpstreamUrl(_)
            | GatewayError::BadUpstreamResponse(_)
            | GatewayError::NoBackend => StatusCode::BAD_GATEWAY,
            GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            GatewayError::RateLimited => RATE_LIMIT_MESSAGE,
            GatewayError::Config(_) => "Internal Server Error",
            // upstream details stay in the logs
            _ => BAD_GATEWAY_MESSAGE,
        };
        (status, body).into_response()
    }
}
