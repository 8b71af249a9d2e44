//! Scene collaborator
//!
//! The sync engine never touches the scene graph directly. Everything it
//! reads or changes goes through this trait, implemented by the host.

use symsync_core::ObjectId;
use symsync_state::{ObjectSnapshot, PropertyHost};

use crate::RemoteEvent;

/// How an object is removed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteMode {
    /// Removed from the scene, kept in persistence
    Soft,
    Hard,
}

impl DeleteMode {
    pub fn from_soft(soft: bool) -> Self {
        if soft {
            DeleteMode::Soft
        } else {
            DeleteMode::Hard
        }
    }

    pub fn is_soft(self) -> bool {
        self == DeleteMode::Soft
    }
}

/// Scene graph operations the sync engine needs
///
/// Implementations must be callable from any thread. `with_object` holds the
/// scene's own lock for the object while `f` runs; the engine takes its
/// per-object sync lock inside it, never the other way round.
pub trait Scene: Send + Sync {
    /// Run `f` against the live object; false if there is no such object
    fn with_object(&self, id: ObjectId, f: &mut dyn FnMut(&mut dyn PropertyHost)) -> bool;

    /// Detached copy of an object
    fn object(&self, id: ObjectId) -> Option<ObjectSnapshot>;

    /// Every object currently in the scene
    fn object_ids(&self) -> Vec<ObjectId>;

    fn contains(&self, id: ObjectId) -> bool {
        self.object(id).is_some()
    }

    /// Add an object received from a peer
    fn apply_new_object(&self, object: ObjectSnapshot);

    /// Remove an object; false if it was not there
    fn delete_object(&self, id: ObjectId, mode: DeleteMode) -> bool;

    /// Remove every object, before pulling the peer's scene
    fn delete_all_objects(&self);

    /// Merge `children` into `root`; `linked` is the resulting object
    fn link_objects(&self, root: ObjectId, children: &[ObjectId], linked: ObjectSnapshot);

    /// Split `parts` off their objects; `after` are the resulting objects
    fn delink_objects(&self, parts: &[ObjectId], before: &[ObjectId], after: Vec<ObjectSnapshot>);

    /// Current terrain blob
    fn terrain(&self) -> Vec<u8>;

    /// Replace the terrain with one received from a peer
    fn set_terrain(&self, data: Vec<u8>);

    /// Hand a remote event to the scene's event surface
    fn deliver_event(&self, event: &RemoteEvent);
}
