use axum::{Json, Router, body::Bytes, extract::Request, http::StatusCode};
use edge_gateway::error::{BAD_GATEWAY_MESSAGE, RATE_LIMIT_MESSAGE};
use edge_gateway::handlers::WELCOME_MESSAGE;
use edge_gateway::load_balancer::{LoadBalancer, StrategyKind};
use edge_gateway::proxy::build_client;
use edge_gateway::rate_limit::RateLimiter;
use edge_gateway::router::{RouteRule, RouteTable};
use edge_gateway::{AppState, build_app};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// Fixed-response backend, answers "<name> response" on every path
async fn spawn_backend(name: &'static str) -> SocketAddr {
    serve(Router::new().fallback(move || async move { format!("{} response", name) })).await
}

// Backend that reflects the request it received
async fn spawn_echo_backend() -> SocketAddr {
    async fn echo(req: Request) -> Json<Value> {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(json!({
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "custom": header("x-custom"),
            "forwarded_for": header("x-forwarded-for"),
            "body": String::from_utf8_lossy(&body),
        }))
    }
    serve(Router::new().fallback(echo)).await
}

async fn spawn_slow_backend(delay: Duration) -> SocketAddr {
    serve(Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "too late"
    }))
    .await
}

async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

struct GatewayBuilder {
    backends: Vec<SocketAddr>,
    strategy: StrategyKind,
    strip_prefix: bool,
    rate_limit: u32,
    timeout: Duration,
}

impl GatewayBuilder {
    fn new(backends: Vec<SocketAddr>) -> Self {
        Self {
            backends,
            strategy: StrategyKind::Random,
            strip_prefix: false,
            rate_limit: 1000,
            timeout: Duration::from_secs(5),
        }
    }

    fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    fn strip_prefix(mut self) -> Self {
        self.strip_prefix = true;
        self
    }

    fn rate_limit(mut self, n: u32) -> Self {
        self.rate_limit = n;
        self
    }

    fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn state(&self) -> Arc<AppState> {
        let list = self
            .backends
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let pool = LoadBalancer::from_list(&list, self.strategy.build()).unwrap();
        let routes = RouteTable::new()
            .with_rule(RouteRule::new("/service", Arc::new(pool)).with_strip_prefix(self.strip_prefix));
        let client = build_client(Duration::from_secs(1), self.timeout).unwrap();
        let limiter = Arc::new(RateLimiter::new(self.rate_limit, Duration::from_secs(60)));
        Arc::new(AppState::new(client, limiter, routes))
    }

    async fn spawn(self) -> String {
        let app = build_app(self.state());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });
        format!("http://{}", addr)
    }
}

#[tokio::test]
async fn root_returns_welcome_message() {
    let backend = spawn_backend("service 1").await;
    let gateway = GatewayBuilder::new(vec![backend]).spawn().await;

    let res = reqwest::get(format!("{}/", gateway)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), WELCOME_MESSAGE);
}

#[tokio::test]
async fn unmatched_path_is_not_found() {
    let backend = spawn_backend("service 1").await;
    let gateway = GatewayBuilder::new(vec![backend]).spawn().await;

    let res = reqwest::get(format!("{}/elsewhere", gateway)).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn proxied_request_reaches_exactly_one_backend() {
    let a = spawn_backend("service 1").await;
    let b = spawn_backend("service 2").await;
    let c = spawn_backend("service 3").await;
    let gateway = GatewayBuilder::new(vec![a, b, c]).spawn().await;

    let res = reqwest::get(format!("{}/service/users", gateway)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(
        ["service 1 response", "service 2 response", "service 3 response"].contains(&body.as_str()),
        "unexpected body {:?}",
        body
    );
}

#[tokio::test]
async fn random_selection_covers_all_backends() {
    let a = spawn_backend("service 1").await;
    let b = spawn_backend("service 2").await;
    let c = spawn_backend("service 3").await;
    let gateway = GatewayBuilder::new(vec![a, b, c]).spawn().await;
    let client = reqwest::Client::new();

    let mut hits: HashMap<String, usize> = HashMap::new();
    for _ in 0..300 {
        let body = client
            .get(format!("{}/service", gateway))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        *hits.entry(body).or_default() += 1;
    }

    assert_eq!(hits.len(), 3);
    for (body, count) in hits {
        assert!(count >= 50, "{} only hit {} times out of 300", body, count);
    }
}

#[tokio::test]
async fn forwards_method_headers_body_and_full_path() {
    let echo = spawn_echo_backend().await;
    let gateway = GatewayBuilder::new(vec![echo]).spawn().await;

    let res = reqwest::Client::new()
        .post(format!("{}/service/orders?limit=5", gateway))
        .header("x-custom", "abc")
        .body("hello upstream")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["uri"], "/service/orders?limit=5");
    assert_eq!(seen["custom"], "abc");
    assert_eq!(seen["forwarded_for"], "127.0.0.1");
    assert_eq!(seen["body"], "hello upstream");
}

#[tokio::test]
async fn strip_prefix_removes_route_prefix() {
    let echo = spawn_echo_backend().await;
    let gateway = GatewayBuilder::new(vec![echo]).strip_prefix().spawn().await;

    let seen: Value = reqwest::get(format!("{}/service/orders/9", gateway))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen["uri"], "/orders/9");
}

#[tokio::test]
async fn unreachable_backend_yields_502_and_gateway_keeps_serving() {
    let dead = dead_addr().await;
    let alive = spawn_backend("service 2").await;
    let gateway = GatewayBuilder::new(vec![dead, alive])
        .strategy(StrategyKind::RoundRobin)
        .spawn()
        .await;
    let client = reqwest::Client::new();

    let first = client.get(format!("{}/service", gateway)).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(first.text().await.unwrap(), BAD_GATEWAY_MESSAGE);

    let second = client.get(format!("{}/service", gateway)).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.text().await.unwrap(), "service 2 response");

    let root = client.get(format!("{}/", gateway)).send().await.unwrap();
    assert_eq!(root.status(), StatusCode::OK);
}

#[tokio::test]
async fn slow_backend_times_out_as_502() {
    let slow = spawn_slow_backend(Duration::from_secs(5)).await;
    let gateway = GatewayBuilder::new(vec![slow])
        .timeout(Duration::from_millis(300))
        .spawn()
        .await;

    let res = reqwest::get(format!("{}/service", gateway)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn rate_limited_requests_get_429_and_skip_the_backend() {
    let echo = spawn_echo_backend().await;
    let gateway = GatewayBuilder::new(vec![echo]).rate_limit(3).spawn().await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let res = client.get(format!("{}/service/x", gateway)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client.get(format!("{}/service/x", gateway)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.text().await.unwrap(), RATE_LIMIT_MESSAGE);

    // the default route is behind the limiter too
    let res = client.get(format!("{}/", gateway)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn concurrent_burst_at_the_boundary_admits_exactly_limit() {
    let backend = spawn_backend("service 1").await;
    let gateway = GatewayBuilder::new(vec![backend]).rate_limit(10).spawn().await;
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let client = client.clone();
        let url = format!("{}/service", gateway);
        tasks.push(tokio::spawn(async move { client.get(url).send().await.unwrap().status() }));
    }

    let mut ok = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(ok, 10);
    assert_eq!(limited, 10);
}

#[tokio::test]
async fn health_reports_backends() {
    let a = spawn_backend("service 1").await;
    let b = spawn_backend("service 2").await;
    let gateway = GatewayBuilder::new(vec![a, b]).spawn().await;

    let health: Value = reqwest::get(format!("{}/health", gateway))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["backends"], 2);
}

#[tokio::test]
async fn metrics_endpoint_exposes_gateway_counters() {
    let backend = spawn_backend("service 1").await;
    let gateway = GatewayBuilder::new(vec![backend]).spawn().await;

    reqwest::get(format!("{}/service", gateway)).await.unwrap();
    let text = reqwest::get(format!("{}/metrics", gateway))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("gateway_requests_total"));
    assert!(text.contains("gateway_proxied_total"));
}

#[tokio::test]
async fn request_body_is_streamed_through() {
    let echo = spawn_echo_backend().await;
    let gateway = GatewayBuilder::new(vec![echo]).spawn().await;

    let chunks: Vec<Result<Bytes, std::io::Error>> =
        vec![Ok(Bytes::from_static(b"part-1,")), Ok(Bytes::from_static(b"part-2"))];
    let body = reqwest::Body::wrap_stream(futures::stream::iter(chunks));

    let seen: Value = reqwest::Client::new()
        .put(format!("{}/service/upload", gateway))
        .body(body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen["method"], "PUT");
    assert_eq!(seen["body"], "part-1,part-2");
}

#[tokio::test]
async fn http2_streamed_body_without_length_is_forwarded() {
    let echo = spawn_echo_backend().await;
    let gateway = GatewayBuilder::new(vec![echo]).spawn().await;

    let client = reqwest::Client::builder().http2_prior_knowledge().build().unwrap();
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from_static(b"abc"))];

    let res = client
        .post(format!("{}/service/up", gateway))
        .body(reqwest::Body::wrap_stream(futures::stream::iter(chunks)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.version(), reqwest::Version::HTTP_2);
    assert_eq!(res.status(), StatusCode::OK);

    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["uri"], "/service/up");
    assert_eq!(seen["body"], "abc");
}

#[tokio::test]
async fn caller_disconnect_abandons_upstream_call() {
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));

    let backend = {
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        serve(Router::new().fallback(move || {
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            async move {
                started.store(true, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                finished.store(true, Ordering::SeqCst);
                "finished"
            }
        }))
        .await
    };
    let gateway = GatewayBuilder::new(vec![backend]).spawn().await;

    // caller gives up long before the backend would answer
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let err = client.get(format!("{}/service/slow", gateway)).send().await.unwrap_err();
    assert!(err.is_timeout());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(started.load(Ordering::SeqCst));
    assert!(!finished.load(Ordering::SeqCst), "backend handler ran to completion after caller left");
}
