//! Outbound update batcher
//!
//! Local writes mark (object, bucket) pairs dirty. A flush swaps each
//! bucket's pending set for an empty one and works on the swapped-out copy,
//! so marks made during a flush wait for the next one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use symsync_core::ObjectId;
use symsync_state::BucketId;

/// Pending objects per bucket, plus the single-flight flag
#[derive(Debug)]
pub struct OutboundBatcher {
    pending: Vec<Mutex<HashSet<ObjectId>>>,
    flushing: AtomicBool,
}

/// Held for the duration of one flush
#[derive(Debug)]
pub struct FlushGuard<'a> {
    batcher: &'a OutboundBatcher,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.batcher.flushing.store(false, Ordering::Release);
    }
}

impl OutboundBatcher {
    pub fn new(bucket_count: usize) -> Self {
        OutboundBatcher {
            pending: (0..bucket_count).map(|_| Mutex::new(HashSet::new())).collect(),
            flushing: AtomicBool::new(false),
        }
    }

    /// Record `object` as pending in `bucket`; repeated marks collapse
    pub fn mark_dirty(&self, object: ObjectId, bucket: BucketId) {
        match self.pending.get(bucket.0 as usize) {
            Some(set) => {
                set.lock().insert(object);
            }
            None => tracing::error!(bucket = %bucket, object = %object, "mark for unknown bucket"),
        }
    }

    /// Start a flush, or `None` if one is already running
    pub fn try_begin_flush(&self) -> Option<FlushGuard<'_>> {
        self.flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlushGuard { batcher: self })
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Swap out one bucket's pending set
    pub fn take(&self, bucket: BucketId) -> HashSet<ObjectId> {
        self.pending
            .get(bucket.0 as usize)
            .map(|set| std::mem::take(&mut *set.lock()))
            .unwrap_or_default()
    }

    /// Swap out every non-empty bucket, in bucket order, objects sorted
    pub fn take_all(&self) -> Vec<(BucketId, Vec<ObjectId>)> {
        (0..self.pending.len())
            .filter_map(|i| {
                let bucket = BucketId(i as u8);
                let mut objects: Vec<ObjectId> = self.take(bucket).into_iter().collect();
                if objects.is_empty() {
                    return None;
                }
                objects.sort();
                Some((bucket, objects))
            })
            .collect()
    }

    pub fn pending_len(&self, bucket: BucketId) -> usize {
        self.pending
            .get(bucket.0 as usize)
            .map_or(0, |set| set.lock().len())
    }

    /// Total pending (object, bucket) pairs
    pub fn pending_total(&self) -> usize {
        self.pending.iter().map(|set| set.lock().len()).sum()
    }
}
