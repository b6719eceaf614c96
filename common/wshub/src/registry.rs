use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use eduhub_observability::CoreMetrics;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::{ConnectionId, HubConfig, HubStats, OutboundMessage, TenantConnectionCount};

struct ConnectionHandle {
    identity_id: Uuid,
    sender: mpsc::Sender<OutboundMessage>,
    channels: RwLock<HashSet<String>>,
    consecutive_drops: AtomicU32,
}

#[derive(Default)]
struct TenantPartition {
    connections: HashMap<ConnectionId, Arc<ConnectionHandle>>,
}

/// Tenant-partitioned connection registry. Every lookup and broadcast is
/// scoped to one tenant's partition; there is no operation that iterates
/// across tenants, which is what makes `BroadcastToTenant` never leaking
/// to other tenants a structural property rather than a checked one.
pub struct Hub {
    config: HubConfig,
    tenants: RwLock<HashMap<Uuid, TenantPartition>>,
    metrics: CoreMetrics,
}

impl Hub {
    pub fn new(config: HubConfig, metrics: CoreMetrics) -> Self {
        Self { config, tenants: RwLock::new(HashMap::new()), metrics }
    }

    pub fn config(&self) -> HubConfig {
        self.config
    }

    /// Register a freshly-upgraded connection, returning the receiver side
    /// of its bounded outbound queue for the writer task to drain.
    pub fn register(
        &self,
        tenant_id: Uuid,
        identity_id: Uuid,
    ) -> (ConnectionId, mpsc::Receiver<OutboundMessage>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.config.outbound_queue_capacity);
        let handle = Arc::new(ConnectionHandle {
            identity_id,
            sender: tx,
            channels: RwLock::new(HashSet::new()),
            consecutive_drops: AtomicU32::new(0),
        });

        let mut tenants = self.tenants.write().expect("tenant map poisoned");
        tenants.entry(tenant_id).or_default().connections.insert(connection_id, handle);
        self.metrics.ws_connections_current.with_label_values(&[&tenant_id.to_string()]).inc();

        (connection_id, rx)
    }

    /// Remove a connection's registration and drop its outbound queue. The
    /// receiver end going out of scope in the writer task drains whatever
    /// was left unsent.
    pub fn deregister(&self, tenant_id: Uuid, connection_id: ConnectionId) {
        let mut tenants = self.tenants.write().expect("tenant map poisoned");
        if let Some(partition) = tenants.get_mut(&tenant_id) {
            if partition.connections.remove(&connection_id).is_some() {
                self.metrics.ws_connections_current.with_label_values(&[&tenant_id.to_string()]).dec();
            }
            if partition.connections.is_empty() {
                tenants.remove(&tenant_id);
            }
        }
    }

    pub fn subscribe(&self, tenant_id: Uuid, connection_id: ConnectionId, channel: String) {
        self.with_connection(tenant_id, connection_id, |handle| {
            handle.channels.write().expect("channel set poisoned").insert(channel);
        });
    }

    pub fn unsubscribe(&self, tenant_id: Uuid, connection_id: ConnectionId, channel: &str) {
        self.with_connection(tenant_id, connection_id, |handle| {
            handle.channels.write().expect("channel set poisoned").remove(channel);
        });
    }

    fn with_connection(
        &self,
        tenant_id: Uuid,
        connection_id: ConnectionId,
        f: impl FnOnce(&ConnectionHandle),
    ) {
        let tenants = self.tenants.read().expect("tenant map poisoned");
        if let Some(handle) = tenants.get(&tenant_id).and_then(|p| p.connections.get(&connection_id)) {
            f(handle);
        }
    }

    pub fn broadcast_to_tenant(&self, tenant_id: Uuid, message: OutboundMessage) {
        let tenants = self.tenants.read().expect("tenant map poisoned");
        let Some(partition) = tenants.get(&tenant_id) else { return };
        for (connection_id, handle) in &partition.connections {
            self.try_send(tenant_id, *connection_id, handle, message.clone());
        }
    }

    pub fn broadcast_to_user(&self, tenant_id: Uuid, identity_id: Uuid, message: OutboundMessage) {
        let tenants = self.tenants.read().expect("tenant map poisoned");
        let Some(partition) = tenants.get(&tenant_id) else { return };
        for (connection_id, handle) in &partition.connections {
            if handle.identity_id == identity_id {
                self.try_send(tenant_id, *connection_id, handle, message.clone());
            }
        }
    }

    pub fn broadcast_to_channel(&self, tenant_id: Uuid, channel: &str, message: OutboundMessage) {
        let tenants = self.tenants.read().expect("tenant map poisoned");
        let Some(partition) = tenants.get(&tenant_id) else { return };
        for (connection_id, handle) in &partition.connections {
            let subscribed = handle.channels.read().expect("channel set poisoned").contains(channel);
            if subscribed {
                self.try_send(tenant_id, *connection_id, handle, message.clone());
            }
        }
    }

    /// Never blocks the publisher: a full queue means the message is
    /// dropped for that one connection, and we count the drop toward that
    /// connection's slow-consumer threshold. Exceeding the threshold is
    /// reported back to the caller, which closes the connection.
    fn try_send(&self, tenant_id: Uuid, connection_id: ConnectionId, handle: &ConnectionHandle, message: OutboundMessage) {
        match handle.sender.try_send(message) {
            Ok(()) => {
                handle.consecutive_drops.store(0, Ordering::Relaxed);
            }
            Err(_) => {
                self.metrics.ws_messages_dropped_total.inc();
                let drops = handle.consecutive_drops.fetch_add(1, Ordering::Relaxed) + 1;
                if drops >= self.config.max_consecutive_drops {
                    tracing::warn!(%tenant_id, %connection_id, drops, "closing slow websocket consumer");
                    self.metrics.ws_connections_closed_slow_total.inc();
                    self.deregister(tenant_id, connection_id);
                }
            }
        }
    }

    pub fn stats(&self) -> HubStats {
        let tenants = self.tenants.read().expect("tenant map poisoned");
        let per_tenant_connections = tenants
            .iter()
            .map(|(tenant_id, partition)| TenantConnectionCount {
                tenant_id: *tenant_id,
                connections: partition.connections.len(),
            })
            .collect::<Vec<_>>();
        let total_connections = per_tenant_connections.iter().map(|c| c.connections).sum();
        HubStats { total_connections, per_tenant_connections }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub() -> Hub {
        Hub::new(HubConfig { outbound_queue_capacity: 2, ..HubConfig::default() }, CoreMetrics::new())
    }

    #[test]
    fn broadcast_to_tenant_never_reaches_another_tenant() {
        let hub = hub();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let (_, mut rx_a) = hub.register(tenant_a, Uuid::new_v4());
        let (_, mut rx_b) = hub.register(tenant_b, Uuid::new_v4());

        hub.broadcast_to_tenant(tenant_a, OutboundMessage("hello".into()));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn broadcast_to_user_targets_only_that_identity() {
        let hub = hub();
        let tenant = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_, mut alice_rx) = hub.register(tenant, alice);
        let (_, mut bob_rx) = hub.register(tenant, bob);

        hub.broadcast_to_user(tenant, alice, OutboundMessage("hi alice".into()));

        assert!(alice_rx.try_recv().is_ok());
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_to_channel_only_reaches_subscribers() {
        let hub = hub();
        let tenant = Uuid::new_v4();
        let (conn, mut rx) = hub.register(tenant, Uuid::new_v4());
        let (_, mut other_rx) = hub.register(tenant, Uuid::new_v4());

        hub.subscribe(tenant, conn, "announcements".to_string());
        hub.broadcast_to_channel(tenant, "announcements", OutboundMessage("new post".into()));

        assert!(rx.try_recv().is_ok());
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn slow_connection_is_closed_after_consecutive_drops() {
        let hub = Hub::new(
            HubConfig { outbound_queue_capacity: 1, max_consecutive_drops: 2, ..HubConfig::default() },
            CoreMetrics::new(),
        );
        let tenant = Uuid::new_v4();
        let (_, _rx) = hub.register(tenant, Uuid::new_v4());

        for _ in 0..3 {
            hub.broadcast_to_tenant(tenant, OutboundMessage("x".into()));
        }

        assert_eq!(hub.stats().total_connections, 0);
    }

    #[test]
    fn deregister_is_idempotent_and_updates_stats() {
        let hub = hub();
        let tenant = Uuid::new_v4();
        let (conn, _rx) = hub.register(tenant, Uuid::new_v4());
        assert_eq!(hub.stats().total_connections, 1);

        hub.deregister(tenant, conn);
        hub.deregister(tenant, conn);

        assert_eq!(hub.stats().total_connections, 0);
    }
}
