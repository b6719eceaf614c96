//! Tenant-partitioned WebSocket notification hub: connection registry,
//! origin checking for the upgrade handshake, and the per-connection
//! reader/writer tasks with heartbeat monitoring.

mod connection;
mod origin;
mod registry;
mod types;

pub use connection::run as handle_connection;
pub use origin::is_allowed_origin;
pub use registry::Hub;
pub use types::{ConnectionId, HubConfig, HubStats, OutboundMessage, TenantConnectionCount};
