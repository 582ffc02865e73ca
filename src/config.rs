use clap::Parser;
use std::time::Duration;

use crate::error::GatewayError;
use crate::load_balancer::StrategyKind;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "edge-gateway")]
#[command(about = "Rate limited edge gateway that load balances across backend services")]
pub struct Args {
    // Port to run the gateway on
    #[arg(short, long, env = "GATEWAY_PORT", default_value_t = 3000)]
    pub port: u16,

    // Backend servers (comma-separated)
    // Example: "localhost:3001,localhost:3002"
    #[arg(
        short,
        long,
        env = "GATEWAY_BACKENDS",
        default_value = "localhost:3001,localhost:3002,localhost:3003"
    )]
    pub backends: String,

    // Path prefix routed to the backends
    #[arg(long, env = "GATEWAY_ROUTE_PREFIX", default_value = "/service")]
    pub route_prefix: String,

    // Remove the route prefix before forwarding
    #[arg(long, env = "GATEWAY_STRIP_PREFIX")]
    pub strip_prefix: bool,

    // Backend selection: random | round-robin
    #[arg(long, env = "GATEWAY_STRATEGY", default_value_t = StrategyKind::Random)]
    pub strategy: StrategyKind,

    // Rate limit max requests per window
    #[arg(long, env = "GATEWAY_RATE_LIMIT", default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "GATEWAY_RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    // Total upstream request timeout in seconds
    #[arg(long, env = "GATEWAY_UPSTREAM_TIMEOUT", default_value_t = 30)]
    pub upstream_timeout: u64,

    // Upstream connect timeout in seconds
    #[arg(long, env = "GATEWAY_CONNECT_TIMEOUT", default_value_t = 5)]
    pub connect_timeout: u64,

    // Stale rate limit entry sweep interval in seconds, defaults to the window
    #[arg(long, env = "GATEWAY_EVICT_INTERVAL")]
    pub evict_interval: Option<u64>,
}

impl Args {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.rate_limit == 0 {
            return Err(GatewayError::Config("--rate-limit must be at least 1".to_string()));
        }
        if self.rate_window == 0 {
            return Err(GatewayError::Config("--rate-window must be at least 1 second".to_string()));
        }
        if !self.route_prefix.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "--route-prefix must start with '/', got '{}'",
                self.route_prefix
            )));
        }
        if self.evict_interval == Some(0) {
            return Err(GatewayError::Config("--evict-interval must be at least 1 second".to_string()));
        }
        Ok(())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn evict_interval(&self) -> Duration {
        Duration::from_secs(self.evict_interval.unwrap_or(self.rate_window))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}
