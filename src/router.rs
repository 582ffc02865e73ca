//! Prefix routing from request paths to backend pools.
//!
//! A rule matches when the request path starts with its prefix as a literal
//! string, so `/service` also matches `/service1/orders`. When several rules
//! match, the longest prefix wins.

use std::sync::Arc;

use crate::load_balancer::{Backend, LoadBalancer};

/// A path prefix and the backends eligible to serve it.
#[derive(Debug)]
pub struct RouteRule {
    pub prefix: String,
    pub strip_prefix: bool,
    pub pool: Arc<LoadBalancer>,
}

impl RouteRule {
    pub fn new(prefix: impl Into<String>, pool: Arc<LoadBalancer>) -> Self {
        Self {
            prefix: prefix.into(),
            strip_prefix: false,
            pool,
        }
    }

    pub fn with_strip_prefix(mut self, strip: bool) -> Self {
        self.strip_prefix = strip;
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    pub fn candidates(&self) -> &[Arc<Backend>] {
        self.pool.backends()
    }
}

#[derive(Debug, Default)]
pub struct RouteTable {
    // kept sorted by prefix length, longest first
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: RouteRule) {
        let pos = self
            .rules
            .iter()
            .position(|r| r.prefix.len() < rule.prefix.len())
            .unwrap_or(self.rules.len());
        self.rules.insert(pos, rule);
    }

    pub fn with_rule(mut self, rule: RouteRule) -> Self {
        self.add(rule);
        self
    }

    /// Most specific rule whose prefix matches `path`, if any.
    pub fn find(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|r| r.matches(path))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
