use serde::{Deserialize, Serialize};

// Health endpoint response format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub backends: usize,
    pub tracked_clients: usize,
}
