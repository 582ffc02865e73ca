use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edge_gateway=info,demo_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
