//! Fixed-response backend for trying the gateway locally. Run one process
//! per port, e.g. `demo-backend --port 3001 --name "service 1"`.

use axum::Router;
use clap::Parser;
use edge_gateway::logging::init_logging;
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "demo-backend")]
#[command(about = "Backend stand-in that answers every request with a fixed body")]
struct Args {
    #[arg(short, long, default_value_t = 3001)]
    port: u16,

    // Used in the response body: "<name> response"
    #[arg(short, long, default_value = "service 1")]
    name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let body = format!("{} response", args.name);
    let app = Router::new().fallback(move || {
        let body = body.clone();
        async move { body }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("{} listening on http://{}", args.name, addr);

    axum::serve(listener, app).await?;
    Ok(())
}
