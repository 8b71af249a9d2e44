//! Topology - node role and the set of live connectors
//!
//! The connector set is copy-on-write: every mutation builds a new vector and
//! swaps it in, so an iteration over a loaded snapshot is never disturbed by
//! a concurrent add or remove.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use symsync_core::{ConnectorNum, SyncError};

use crate::Connector;

/// Role of a node in the star overlay
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Forwards every update to all other connectors
    Relay,
    /// Never forwards
    #[default]
    Leaf,
}

impl Role {
    pub fn is_relay(self) -> bool {
        self == Role::Relay
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Relay => f.write_str("relay"),
            Role::Leaf => f.write_str("leaf"),
        }
    }
}

impl FromStr for Role {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relay" => Ok(Role::Relay),
            "leaf" => Ok(Role::Leaf),
            other => Err(SyncError::InvalidConfig(format!("unknown role: {}", other))),
        }
    }
}

/// Snapshot of the live connectors
pub type ConnectorList = Arc<Vec<Arc<Connector>>>;

/// Copy-on-write set of active connectors
pub struct ConnectorSet {
    connectors: ArcSwap<Vec<Arc<Connector>>>,
    next_num: AtomicU32,
}

impl ConnectorSet {
    pub fn new() -> Self {
        ConnectorSet {
            connectors: ArcSwap::from_pointee(Vec::new()),
            next_num: AtomicU32::new(1),
        }
    }

    /// Allocate the next connector number
    pub fn next_num(&self) -> ConnectorNum {
        ConnectorNum(self.next_num.fetch_add(1, Ordering::Relaxed))
    }

    /// Current connectors; never blocks writers
    pub fn snapshot(&self) -> ConnectorList {
        self.connectors.load_full()
    }

    pub fn add(&self, connector: Arc<Connector>) {
        self.connectors.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(connector.clone());
            next
        });
    }

    pub fn remove(&self, num: ConnectorNum) -> Option<Arc<Connector>> {
        let previous = self.connectors.rcu(|current| {
            current
                .iter()
                .filter(|c| c.num() != num)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().find(|c| c.num() == num).cloned()
    }

    /// Drop every connector whose link is down, returning how many went
    pub fn prune_dead(&self) -> usize {
        let previous = self.connectors.rcu(|current| {
            current
                .iter()
                .filter(|c| c.is_connected())
                .cloned()
                .collect::<Vec<_>>()
        });
        let remaining = self.connectors.load().len();
        previous.len().saturating_sub(remaining)
    }

    /// Empty the set, handing back what it held
    pub fn take_all(&self) -> ConnectorList {
        self.connectors.swap(Arc::new(Vec::new()))
    }

    pub fn get(&self, num: ConnectorNum) -> Option<Arc<Connector>> {
        self.snapshot().iter().find(|c| c.num() == num).cloned()
    }

    pub fn len(&self) -> usize {
        self.connectors.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.load().is_empty()
    }
}

impl Default for ConnectorSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.snapshot().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(set: &ConnectorSet) -> (Arc<Connector>, crate::ConnectorIo) {
        let (c, io) = Connector::new(set.next_num(), "test");
        (Arc::new(c), io)
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("relay".parse::<Role>().unwrap(), Role::Relay);
        assert_eq!("Leaf".parse::<Role>().unwrap(), Role::Leaf);
        assert!("hub".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Leaf);
        assert_eq!(serde_json::to_string(&Role::Relay).unwrap(), "\"relay\"");
    }

    #[test]
    fn test_add_remove() {
        let set = ConnectorSet::new();
        let (a, _io_a) = connector(&set);
        let (b, _io_b) = connector(&set);
        set.add(a.clone());
        set.add(b.clone());
        assert_eq!(set.len(), 2);
        assert_ne!(a.num(), b.num());

        let removed = set.remove(a.num()).unwrap();
        assert!(Arc::ptr_eq(&removed, &a));
        assert_eq!(set.len(), 1);
        assert!(set.remove(a.num()).is_none());
    }

    #[test]
    fn test_snapshot_survives_mutation() {
        let set = ConnectorSet::new();
        let (a, _io_a) = connector(&set);
        let (b, _io_b) = connector(&set);
        set.add(a.clone());
        set.add(b);

        let snapshot = set.snapshot();
        set.remove(a.num());
        let (c, _io_c) = connector(&set);
        set.add(c);

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().any(|x| Arc::ptr_eq(x, &a)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_prune_dead() {
        let set = ConnectorSet::new();
        let (a, _io_a) = connector(&set);
        let (b, io_b) = connector(&set);
        set.add(a.clone());
        set.add(b);
        drop(io_b);

        assert_eq!(set.prune_dead(), 1);
        assert_eq!(set.len(), 1);
        assert!(set.get(a.num()).is_some());
        assert_eq!(set.prune_dead(), 0);
    }

    #[test]
    fn test_take_all_empties_set() {
        let set = ConnectorSet::new();
        let (a, _io_a) = connector(&set);
        set.add(a);

        assert_eq!(set.take_all().len(), 1);
        assert!(set.is_empty());
    }
}
