//! PrimSyncInfo manager - sync state of every replicated object

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use symsync_core::ObjectId;

use crate::PrimSyncInfo;

/// Shared handle to one object's sync state
pub type PrimHandle = Arc<Mutex<PrimSyncInfo>>;

/// All replicated objects, each behind its own lock
///
/// The map lock is only held to look up, insert or remove a handle; the
/// compare-and-update step runs under the per-object mutex.
#[derive(Debug, Default)]
pub struct PrimSyncInfoManager {
    prims: RwLock<HashMap<ObjectId, PrimHandle>>,
}

impl PrimSyncInfoManager {
    pub fn new() -> Self {
        PrimSyncInfoManager::default()
    }

    /// Get an object's sync state
    pub fn get(&self, id: ObjectId) -> Option<PrimHandle> {
        self.prims.read().get(&id).cloned()
    }

    /// Insert or replace an object's sync state
    pub fn insert(&self, prim: PrimSyncInfo) -> PrimHandle {
        let handle = Arc::new(Mutex::new(prim));
        let id = handle.lock().object_id();
        self.prims.write().insert(id, handle.clone());
        handle
    }

    /// Get the existing state or create it with `init`
    pub fn get_or_insert_with(&self, id: ObjectId, init: impl FnOnce() -> PrimSyncInfo) -> PrimHandle {
        if let Some(handle) = self.get(id) {
            return handle;
        }
        self.prims
            .write()
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    /// Drop an object's sync state
    pub fn remove(&self, id: ObjectId) -> Option<PrimHandle> {
        self.prims.write().remove(&id)
    }

    pub fn clear(&self) {
        self.prims.write().clear();
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.prims.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.prims.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.read().is_empty()
    }

    /// Ids of every tracked object, sorted
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.prims.read().keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObjectSnapshot, PropertyRegistry};
    use symsync_core::{ActorId, Property, SyncTime};

    fn prim(n: u128) -> PrimSyncInfo {
        let host = ObjectSnapshot::new(ObjectId::from_u128(n)).with(Property::Name, "box");
        PrimSyncInfo::from_host(&host, &PropertyRegistry::with_defaults(), SyncTime::ZERO, &ActorId::new("a"))
    }

    #[test]
    fn test_manager_basic() {
        let manager = PrimSyncInfoManager::new();
        manager.insert(prim(2));
        manager.insert(prim(1));

        assert_eq!(manager.len(), 2);
        assert!(manager.contains(ObjectId::from_u128(1)));
        assert_eq!(manager.ids(), vec![ObjectId::from_u128(1), ObjectId::from_u128(2)]);

        assert!(manager.remove(ObjectId::from_u128(1)).is_some());
        assert!(!manager.contains(ObjectId::from_u128(1)));
        assert!(manager.remove(ObjectId::from_u128(1)).is_none());
    }

    #[test]
    fn test_get_or_insert_keeps_existing() {
        let manager = PrimSyncInfoManager::new();
        let first = manager.insert(prim(7));
        let again = manager.get_or_insert_with(ObjectId::from_u128(7), || panic!("must not re-create"));
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_concurrent_get_or_insert_creates_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Barrier;

        let manager = PrimSyncInfoManager::new();
        let created = AtomicUsize::new(0);
        let barrier = Barrier::new(8);
        let handles: Vec<PrimHandle> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        manager.get_or_insert_with(ObjectId::from_u128(9), || {
                            created.fetch_add(1, Ordering::SeqCst);
                            prim(9)
                        })
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert!(Arc::ptr_eq(&manager.get(ObjectId::from_u128(9)).unwrap(), &handles[0]));
    }

    #[test]
    fn test_handles_outlive_removal() {
        let manager = PrimSyncInfoManager::new();
        let handle = manager.insert(prim(3));
        manager.clear();
        assert!(manager.is_empty());
        assert_eq!(handle.lock().object_id(), ObjectId::from_u128(3));
    }
}
