mod health;
mod metrics;
mod proxy;
mod root;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use proxy::proxy_handler;
pub use root::{WELCOME_MESSAGE, root_handler};
