pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod load_balancer;
pub mod logging;
pub mod middleware;
pub mod metrics;
pub mod models;
pub mod proxy;
pub mod rate_limit;
pub mod router;
pub mod state;

pub use app::build_app;
pub use error::GatewayError;
pub use state::AppState;
