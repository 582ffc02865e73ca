use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::GatewayError;

// Single backend server, immutable once configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub url: String,
}

impl Backend {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        // add http:// if not present
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url
        } else {
            format!("http://{}", url)
        };
        Self {
            url: url.trim_end_matches('/').to_string(),
        }
    }
}

/// Picks one backend out of a candidate list.
///
/// Selection ignores backend health: a target that is down stays eligible
/// and requests sent to it fail with a gateway error.
pub trait SelectionStrategy: Send + Sync {
    fn select(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;

    fn name(&self) -> &'static str;
}

// Uniform random choice per request
#[derive(Debug, Default)]
pub struct UniformRandom;

impl SelectionStrategy for UniformRandom {
    fn select(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..backends.len());
        Some(Arc::clone(&backends[idx]))
    }

    fn name(&self) -> &'static str {
        "uniform-random"
    }
}

// Round robin over the list in order
#[derive(Debug, Default)]
pub struct RoundRobin {
    current: AtomicUsize,
}

impl SelectionStrategy for RoundRobin {
    fn select(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let len = backends.len();
        if len == 0 {
            return None;
        }
        let idx = self.current.fetch_add(1, Ordering::Relaxed) % len;
        Some(Arc::clone(&backends[idx]))
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    Random,
    RoundRobin,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn SelectionStrategy> {
        match self {
            StrategyKind::Random => Box::new(UniformRandom),
            StrategyKind::RoundRobin => Box::new(RoundRobin::default()),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" | "uniform-random" => Ok(StrategyKind::Random),
            "round-robin" | "roundrobin" => Ok(StrategyKind::RoundRobin),
            other => Err(format!("unknown selection strategy '{}'", other)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Random => write!(f, "random"),
            StrategyKind::RoundRobin => write!(f, "round-robin"),
        }
    }
}

// Load balancer over an ordered list of backends
pub struct LoadBalancer {
    backends: Vec<Arc<Backend>>,
    strategy: Box<dyn SelectionStrategy>,
}

impl LoadBalancer {
    pub fn new(backends: Vec<Backend>, strategy: Box<dyn SelectionStrategy>) -> Result<Self, GatewayError> {
        if backends.is_empty() {
            return Err(GatewayError::Config("at least one backend required".to_string()));
        }
        Ok(Self {
            backends: backends.into_iter().map(Arc::new).collect(),
            strategy,
        })
    }

    // Create from comma-separated urls "localhost:3001, localhost:3002"
    pub fn from_list(backends_str: &str, strategy: Box<dyn SelectionStrategy>) -> Result<Self, GatewayError> {
        let backends = backends_str
            .split(',')
            .map(|s| s.trim()) // remove spaces
            .filter(|s| !s.is_empty()) // remove empty strings
            .map(Backend::new)
            .collect();
        Self::new(backends, strategy)
    }

    pub fn pick(&self) -> Option<Arc<Backend>> {
        self.strategy.select(&self.backends)
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}

impl fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("backends", &self.backends)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
