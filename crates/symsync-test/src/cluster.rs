//! Multi-node clusters over in-memory links
//!
//! A star: one relay in the middle, leaves linked to it. Heartbeats are set
//! far apart so tests decide when each node flushes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use symsync_core::{ActorId, SyncResult};
use symsync_diffusion::Role;
use symsync_runtime::{SyncConfig, SyncNode};

use crate::MemoryScene;

/// Heartbeat used by cluster nodes; long enough never to fire mid-test
pub const CLUSTER_FLUSH_INTERVAL: Duration = Duration::from_secs(3600);

/// How long cluster helpers wait for messages to cross the links
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// A node plus the scene it syncs
#[derive(Clone)]
pub struct ClusterNode {
    pub node: SyncNode,
    pub scene: Arc<MemoryScene>,
}

impl ClusterNode {
    /// Build and start a node with an in-memory scene
    pub async fn start(actor: &str, role: Role) -> SyncResult<Self> {
        let mut config = SyncConfig::for_actor(actor, role);
        config.listener.enabled = Some(false);
        config.flush_interval = CLUSTER_FLUSH_INTERVAL;
        Self::start_with(config).await
    }

    pub async fn start_with(config: SyncConfig) -> SyncResult<Self> {
        let scene = Arc::new(MemoryScene::new());
        let node = SyncNode::activate(config, scene.clone());
        node.start().await?;
        Ok(ClusterNode { node, scene })
    }

    pub fn actor(&self) -> &ActorId {
        self.node.actor()
    }
}

/// One relay and its leaves
pub struct SyncCluster {
    pub relay: ClusterNode,
    pub leaves: Vec<ClusterNode>,
}

impl SyncCluster {
    /// Start a relay and `leaves` leaves, each linked to the relay
    pub async fn star(leaves: usize) -> SyncResult<Self> {
        let relay = ClusterNode::start("relay", Role::Relay).await?;
        let mut cluster = SyncCluster {
            relay,
            leaves: Vec::with_capacity(leaves),
        };
        for _ in 0..leaves {
            cluster.join_leaf().await?;
        }
        Ok(cluster)
    }

    /// Start one more leaf and link it; it pulls the relay's scene
    pub async fn join_leaf(&mut self) -> SyncResult<&ClusterNode> {
        let leaf = ClusterNode::start(&format!("leaf-{}", self.leaves.len()), Role::Leaf).await?;
        let (local, remote) = leaf.node.link_with(&self.relay.node);
        let identified = wait_until(SETTLE_TIMEOUT, || local.peer().is_some() && remote.peer().is_some()).await;
        if !identified {
            tracing::warn!(leaf = %leaf.actor(), "handshake did not complete");
        }
        self.leaves.push(leaf);
        Ok(&self.leaves[self.leaves.len() - 1])
    }

    pub fn leaf(&self, i: usize) -> &ClusterNode {
        &self.leaves[i]
    }

    /// Relay first, then the leaves
    pub fn nodes(&self) -> impl Iterator<Item = &ClusterNode> {
        std::iter::once(&self.relay).chain(self.leaves.iter())
    }

    /// Flush every node once; returns the units sent
    pub fn flush_all(&self) -> usize {
        self.nodes().map(|n| n.node.flush()).sum()
    }

    pub fn stop(&self) {
        for n in self.nodes() {
            n.node.stop();
        }
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_star_identifies_peers() {
        let cluster = SyncCluster::star(2).await.unwrap();
        let peers: Vec<ActorId> = cluster
            .relay
            .node
            .router()
            .connectors()
            .snapshot()
            .iter()
            .filter_map(|c| c.peer().cloned())
            .collect();
        assert_eq!(peers.len(), 2);
        assert!(peers.contains(&ActorId::new("leaf-0")));
        assert!(peers.contains(&ActorId::new("leaf-1")));
        assert_eq!(cluster.leaf(0).node.connector_count(), 1);
        cluster.stop();
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(20), || false).await);
        assert!(wait_until(Duration::from_millis(20), || true).await);
    }
}
