use std::sync::Arc;

use crate::config::Args;
use crate::error::GatewayError;
use crate::load_balancer::LoadBalancer;
use crate::proxy::build_client;
use crate::rate_limit::RateLimiter;
use crate::router::{RouteRule, RouteTable};

// app's shared state, one instance per gateway
pub struct AppState {
    pub client: reqwest::Client,
    pub rate_limiter: Arc<RateLimiter>,
    pub routes: RouteTable,
}

impl AppState {
    pub fn new(client: reqwest::Client, rate_limiter: Arc<RateLimiter>, routes: RouteTable) -> Self {
        Self {
            client,
            rate_limiter,
            routes,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, GatewayError> {
        args.validate()?;

        let pool = LoadBalancer::from_list(&args.backends, args.strategy.build())?;
        let routes = RouteTable::new().with_rule(
            RouteRule::new(args.route_prefix.clone(), Arc::new(pool)).with_strip_prefix(args.strip_prefix),
        );
        let client = build_client(args.connect_timeout(), args.upstream_timeout())?;
        let rate_limiter = Arc::new(RateLimiter::new(args.rate_limit, args.rate_window()));

        Ok(Self::new(client, rate_limiter, routes))
    }

    pub fn backend_count(&self) -> usize {
        self.routes.rules().iter().map(|r| r.candidates().len()).sum()
    }
}
