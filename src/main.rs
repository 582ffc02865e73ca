use clap::Parser; // for cli
use edge_gateway::config::Args;
use edge_gateway::logging::init_logging;
use edge_gateway::rate_limit::evict_stale_entries;
use edge_gateway::{AppState, build_app};
use std::net::SocketAddr;
use std::sync::Arc;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    // parse cli arguments
    let args = Args::parse();

    // creating shared state
    let state = Arc::new(AppState::from_args(&args)?);

    // spawn the stale entry sweeper
    tokio::spawn(evict_stale_entries(Arc::clone(&state.rate_limiter), args.evict_interval()));

    let app = build_app(Arc::clone(&state));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Edge gateway is running on http://localhost:{}", args.port);
    for rule in state.routes.rules() {
        tracing::info!(
            prefix = %rule.prefix,
            strip_prefix = rule.strip_prefix,
            strategy = rule.pool.strategy_name(),
            "Route"
        );
        for (i, backend) in rule.candidates().iter().enumerate() {
            tracing::info!("  [{}] {}", i + 1, backend.url);
        }
    }
    tracing::info!(
        "Rate limit: {} requests per {:?}",
        state.rate_limiter.max_requests(),
        state.rate_limiter.window()
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Edge gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
