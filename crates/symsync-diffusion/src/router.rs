//! Topology router - picks the connectors an outgoing message goes to

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use symsync_core::{ActorId, ConnectorNum};
use symsync_wire::SyncMessage;

use crate::{Connector, ConnectorSet, Role};

/// Routing counters
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Messages handed to at least one connector
    pub routed: AtomicU64,
    /// Copies queued across all connectors
    pub deliveries: AtomicU64,
    /// Relay re-sends of inbound messages
    pub forwarded: AtomicU64,
    /// Connectors dropped after their link went down
    pub pruned: AtomicU64,
}

/// Routes messages over the live connector set
#[derive(Debug)]
pub struct TopologyRouter {
    role: Role,
    connectors: ConnectorSet,
    stats: RouterStats,
}

impl TopologyRouter {
    pub fn new(role: Role) -> Self {
        TopologyRouter {
            role,
            connectors: ConnectorSet::new(),
            stats: RouterStats::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_relay(&self) -> bool {
        self.role.is_relay()
    }

    pub fn connectors(&self) -> &ConnectorSet {
        &self.connectors
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Connectors a message should go to
    ///
    /// A relay skips the connector whose peer is `exclude`; a leaf sends to
    /// every connector. Dead connectors found on the way are pruned after the
    /// scan.
    pub fn destinations_for(&self, exclude: Option<&ActorId>) -> Vec<Arc<Connector>> {
        let snapshot = self.connectors.snapshot();
        let mut saw_dead = false;
        let destinations = snapshot
            .iter()
            .filter(|c| {
                if !c.is_connected() {
                    saw_dead = true;
                    return false;
                }
                match (self.role, exclude) {
                    (Role::Relay, Some(actor)) => c.peer() != Some(actor),
                    _ => true,
                }
            })
            .cloned()
            .collect();
        if saw_dead {
            let pruned = self.connectors.prune_dead();
            self.stats.pruned.fetch_add(pruned as u64, Ordering::Relaxed);
            tracing::debug!(pruned, "pruned dead connectors");
        }
        destinations
    }

    /// Send to every destination, returning how many accepted the message
    pub fn route(&self, msg: &SyncMessage, exclude: Option<&ActorId>) -> usize {
        let sent = self
            .destinations_for(exclude)
            .iter()
            .filter(|c| c.send(msg.clone()))
            .count();
        if sent > 0 {
            self.stats.routed.fetch_add(1, Ordering::Relaxed);
            self.stats.deliveries.fetch_add(sent as u64, Ordering::Relaxed);
        }
        tracing::trace!(msg_type = %msg.msg_type(), sent, "routed");
        sent
    }

    /// Re-send an inbound message on a relay
    ///
    /// Skips the connector whose peer is `origin` and the connector the
    /// message arrived on. A leaf never forwards.
    pub fn forward(&self, msg: &SyncMessage, origin: &ActorId, arrived_on: Option<ConnectorNum>) -> usize {
        if !self.is_relay() {
            return 0;
        }
        let sent = self
            .destinations_for(Some(origin))
            .iter()
            .filter(|c| Some(c.num()) != arrived_on)
            .filter(|c| c.send(msg.clone()))
            .count();
        if sent > 0 {
            self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            self.stats.deliveries.fetch_add(sent as u64, Ordering::Relaxed);
        }
        tracing::trace!(msg_type = %msg.msg_type(), origin = %origin, sent, "forwarded");
        sent
    }

    /// Send to one connector only
    pub fn send_to(&self, connector: &Connector, msg: SyncMessage) -> bool {
        let sent = connector.send(msg);
        if sent {
            self.stats.deliveries.fetch_add(1, Ordering::Relaxed);
        }
        sent
    }

    /// Close every connector and empty the set
    pub fn close_all(&self) -> usize {
        let all = self.connectors.take_all();
        for c in all.iter() {
            c.close();
        }
        all.len()
    }
}
