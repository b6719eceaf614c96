use std::time::Duration;

use uuid::Uuid;

pub type ConnectionId = Uuid;

#[derive(Debug, Clone)]
pub struct OutboundMessage(pub String);

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub outbound_queue_capacity: usize,
    pub max_frame_bytes: usize,
    pub heartbeat_interval: Duration,
    pub miss_threshold: u32,
    pub max_consecutive_drops: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 64,
            max_frame_bytes: 64 * 1024,
            heartbeat_interval: Duration::from_secs(20),
            miss_threshold: 3,
            max_consecutive_drops: 5,
        }
    }
}

impl HubConfig {
    pub fn pong_timeout(&self) -> Duration {
        self.heartbeat_interval * self.miss_threshold
    }
}

/// Read-only snapshot the hub exposes for observability. Never includes
/// identities — only counts, so cross-tenant identity lists can never leak
/// through a stats endpoint.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HubStats {
    pub total_connections: usize,
    pub per_tenant_connections: Vec<TenantConnectionCount>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TenantConnectionCount {
    pub tenant_id: Uuid,
    pub connections: usize,
}
