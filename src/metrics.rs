use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of requests").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("gateway_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref PROXIED_TOTAL: Counter =
        register_counter!("gateway_proxied_total", "Requests relayed to a backend").unwrap();
    pub static ref UPSTREAM_ERRORS: Counter =
        register_counter!("gateway_upstream_errors_total", "Forwards that failed with a gateway error").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "gateway_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref RATE_LIMIT_ENTRIES: Gauge =
        register_gauge!("gateway_rate_limit_entries", "Client keys currently tracked by the rate limiter").unwrap();
}
