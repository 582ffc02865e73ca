//! Relays a request to a chosen backend and streams the answer back.
//!
//! Bodies are never buffered: the inbound body is handed to reqwest as a
//! stream and the upstream body is handed back to axum as a stream. If the
//! caller goes away, axum drops the handler future and with it the pending
//! reqwest call, so the upstream request is abandoned rather than finished.
//!
//! Failures are reported immediately. There is no retry against another
//! backend.

use axum::body::{Body, HttpBody};
use axum::http::{HeaderMap, HeaderValue, Request, Response, Uri, header};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::GatewayError;
use crate::load_balancer::Backend;
use crate::router::RouteRule;

// Headers that describe a single connection and must not be relayed
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

pub fn build_client(connect_timeout: Duration, timeout: Duration) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        // redirects are the caller's business
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| GatewayError::Config(format!("failed to build upstream client: {}", e)))
}

/// Outbound URL: backend base + path (prefix removed when `strip_prefix`
/// is set on the rule) + original query string.
pub fn upstream_url(backend: &Backend, rule: &RouteRule, uri: &Uri) -> String {
    let mut path = uri.path();
    if rule.strip_prefix {
        // only strip at a segment boundary, `/service1` keeps its full path
        if let Some(rest) = path.strip_prefix(rule.prefix.as_str()) {
            if rest.is_empty() || rest.starts_with('/') || rule.prefix.ends_with('/') {
                path = rest;
            }
        }
    }

    let mut url = backend.url.clone();
    if !path.starts_with('/') {
        url.push('/');
    }
    url.push_str(path);

    if let Some(query) = uri.query() {
        url.push('?');
        url.push_str(query);
    }
    url
}

fn is_hop_by_hop(name: &header::HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

// Copy end-to-end headers only
fn relay_headers(src: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(src.len());
    for (name, value) in src {
        if !is_hop_by_hop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

fn outbound_headers(src: &HeaderMap, client_addr: Option<SocketAddr>) -> HeaderMap {
    let mut headers = relay_headers(src);

    // reqwest sets Host from the upstream url
    if let Some(host) = headers.remove(header::HOST) {
        headers.insert(X_FORWARDED_HOST, host);
    }

    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let chain = match src.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    headers
}

/// Forward `req` to `backend` and relay the upstream response.
pub async fn forward(
    client: &reqwest::Client,
    req: Request<Body>,
    backend: &Backend,
    rule: &RouteRule,
    client_addr: Option<SocketAddr>,
) -> Result<Response<Body>, GatewayError> {
    let (parts, body) = req.into_parts();

    let url = upstream_url(backend, rule, &parts.uri);
    let url = reqwest::Url::parse(&url).map_err(|e| GatewayError::InvalidUpstreamUrl(format!("{}: {}", url, e)))?;

    let mut outbound = client
        .request(parts.method, url)
        .headers(outbound_headers(&parts.headers, client_addr));
    // HTTP/2 bodies may carry no length header, so ask the body itself
    if !body.is_end_stream() {
        outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream = outbound.send().await.map_err(|e| {
        if e.is_timeout() {
            GatewayError::UpstreamTimeout
        } else {
            GatewayError::Upstream(e)
        }
    })?;

    let mut response = Response::builder().status(upstream.status());
    if let Some(headers) = response.headers_mut() {
        *headers = relay_headers(upstream.headers());
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| GatewayError::BadUpstreamResponse(e.to_string()))
}
