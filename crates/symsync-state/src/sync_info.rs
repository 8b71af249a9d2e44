//! Per-property sync record and the last-writer-wins rule

use std::cmp::Ordering;
use std::fmt;

use sha2::{Digest, Sha256};

use symsync_core::{ActorId, Property, SyncTime, Value};

use crate::CompareMode;

/// Where the last accepted write came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateSource {
    Local,
    FromSync,
}

/// SHA-256 over a value's serialized form
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(value: &Value) -> Self {
        let mut hasher = Sha256::new();
        match value {
            Value::Bytes(b) => hasher.update(b),
            Value::Text(s) => hasher.update(s.as_bytes()),
            other => match serde_json::to_vec(other) {
                Ok(buf) => hasher.update(&buf),
                // Value serialization has no failure path; hash the debug form regardless
                Err(_) => hasher.update(format!("{:?}", other).as_bytes()),
            },
        }
        ContentHash(hasher.finalize().into())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..6] {
            write!(f, "{:02x}", b)?;
        }
        f.write_str("…")
    }
}

/// Outcome of offering a write to a stored record
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Value already stored; nothing to do or propagate
    Unchanged,
    /// Incoming write is newer and now stored
    Accepted,
    /// Incoming write is stale; the writer must take `stored` instead
    Rejected { stored: Value },
}

/// Decide whether an incoming write beats the stored one
///
/// Newer timestamp wins. On equal timestamps, a repeat write by the same
/// actor wins, otherwise the lexicographically greater actor id wins.
pub fn incoming_wins(
    stored_time: SyncTime,
    stored_origin: &ActorId,
    incoming_time: SyncTime,
    incoming_origin: &ActorId,
) -> bool {
    match incoming_time.cmp(&stored_time) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => incoming_origin >= stored_origin,
    }
}

/// Sync record of one property of one object
#[derive(Clone, Debug)]
pub struct PropertySyncInfo {
    property: Property,
    value: Value,
    hash: Option<ContentHash>,
    timestamp: SyncTime,
    origin: ActorId,
    source: UpdateSource,
    locally_dirty: bool,
}

impl PropertySyncInfo {
    pub fn new(
        property: Property,
        compare: CompareMode,
        value: Value,
        timestamp: SyncTime,
        origin: ActorId,
        source: UpdateSource,
    ) -> Self {
        let hash = match compare {
            CompareMode::Hash => Some(ContentHash::of(&value)),
            CompareMode::Value => None,
        };
        PropertySyncInfo {
            property,
            value,
            hash,
            timestamp,
            origin,
            source,
            locally_dirty: false,
        }
    }

    pub fn property(&self) -> Property {
        self.property
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn timestamp(&self) -> SyncTime {
        self.timestamp
    }

    pub fn origin(&self) -> &ActorId {
        &self.origin
    }

    pub fn source(&self) -> UpdateSource {
        self.source
    }

    pub fn content_hash(&self) -> Option<ContentHash> {
        self.hash
    }

    /// Changed locally since the last send of its bucket
    pub fn is_locally_dirty(&self) -> bool {
        self.locally_dirty
    }

    pub fn clear_dirty(&mut self) {
        self.locally_dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.locally_dirty = true;
    }

    /// Equality against the stored value, by hash for hashed properties
    pub fn matches(&self, value: &Value) -> bool {
        match self.hash {
            Some(hash) => hash == ContentHash::of(value),
            None => self.value == *value,
        }
    }

    /// Offer a write. Equal values short-circuit; otherwise the newer write wins.
    ///
    /// An equal value arriving from sync with a newer stamp still moves the
    /// stored stamp forward, so every replica ends on the same winning write.
    pub fn offer(
        &mut self,
        value: &Value,
        timestamp: SyncTime,
        origin: &ActorId,
        source: UpdateSource,
    ) -> Resolution {
        if self.matches(value) {
            if source == UpdateSource::FromSync
                && incoming_wins(self.timestamp, &self.origin, timestamp, origin)
            {
                self.timestamp = timestamp;
                self.origin = origin.clone();
                self.source = source;
            }
            return Resolution::Unchanged;
        }
        if incoming_wins(self.timestamp, &self.origin, timestamp, origin) {
            self.overwrite(value.clone(), timestamp, origin.clone(), source);
            Resolution::Accepted
        } else {
            Resolution::Rejected {
                stored: self.value.clone(),
            }
        }
    }

    /// Store a write without comparing timestamps
    pub fn overwrite(&mut self, value: Value, timestamp: SyncTime, origin: ActorId, source: UpdateSource) {
        if self.hash.is_some() {
            self.hash = Some(ContentHash::of(&value));
        }
        self.value = value;
        self.timestamp = timestamp;
        self.origin = origin;
        self.source = source;
        self.locally_dirty = source == UpdateSource::Local;
    }
}
