//! Inbound message dispatch
//!
//! Every envelope read from a connector lands here. Pull requests are
//! answered on the requesting connector only. State messages are reconciled
//! and, on a relay, forwarded when they changed something. Events are
//! forwarded by relays and handed to the scene.

use std::sync::Arc;

use symsync_core::{ActorId, ObjectId, SyncError, SyncResult, SyncTime, Value};
use symsync_diffusion::Connector;
use symsync_state::{
    decode_object, encode_object, incoming_wins, DecodedObject, ObjectSnapshot, PrimHandle, PrimSyncInfo, PropertyHost,
    PropertyUpdate,
};
use symsync_wire::{keys, MsgCategory, MsgType, Payload, SyncMessage};

use crate::node::{NodeInner, TerrainStamp};
use crate::{DeleteMode, EventKind, RemoteEvent, SyncStats};

impl NodeInner {
    pub(crate) fn dispatch(&self, connector: &Arc<Connector>, msg: SyncMessage) {
        SyncStats::incr(&self.stats.msgs_in);
        let msg_type = msg.msg_type();
        let payload = match msg.payload() {
            Ok(payload) => payload,
            Err(e) => {
                self.report_decode_error(connector, Some(msg_type), &e);
                return;
            }
        };

        match msg_type.category() {
            MsgCategory::Handshake => {
                if let Err(e) = self.on_handshake(connector, msg_type, &payload) {
                    self.report_decode_error(connector, Some(msg_type), &e);
                }
            }
            MsgCategory::PullRequest => self.on_pull_request(connector, msg_type),
            MsgCategory::State => {
                if msg_type.is_special_update() {
                    SyncStats::incr(&self.stats.special_in);
                }
                match self.on_state(msg_type, &payload) {
                    Ok(true) => self.forward(connector, &msg, &payload),
                    Ok(false) => {}
                    Err(e) => self.on_state_error(connector, msg_type, e),
                }
            }
            MsgCategory::Event => self.on_event(connector, msg_type, payload, &msg),
            MsgCategory::Diagnostic => self.on_state_report(connector, &payload),
        }
    }

    /// Relay a changed state message, never back toward its origin
    fn forward(&self, connector: &Connector, msg: &SyncMessage, payload: &Payload) {
        if !self.router.is_relay() {
            return;
        }
        match payload.actor_id() {
            Ok(origin) => {
                let sent = self.router.forward(msg, &origin, Some(connector.num()));
                SyncStats::add(&self.stats.msgs_out, sent as u64);
            }
            Err(e) => tracing::warn!(msg_type = %msg.msg_type(), error = %e, "not forwarded, no origin actor"),
        }
    }

    fn on_handshake(&self, connector: &Connector, msg_type: MsgType, payload: &Payload) -> SyncResult<()> {
        match msg_type {
            MsgType::ActorId => {
                let actor = payload.actor_id()?;
                if actor.is_empty() {
                    return Err(SyncError::MissingActorId);
                }
                if connector.set_peer(actor.clone()) {
                    tracing::info!(actor = %self.actor, connector = %connector.num(), peer = %actor, "peer identified");
                }
            }
            MsgType::RegionName => {
                let region = payload.get_str(keys::REGION_NAME)?;
                if region != self.config.region_name {
                    tracing::warn!(
                        connector = %connector.num(),
                        local = %self.config.region_name,
                        remote = %region,
                        "peer serves a different region"
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_pull_request(&self, connector: &Connector, msg_type: MsgType) {
        match msg_type {
            MsgType::GetTerrain => {
                let payload = self.terrain_payload();
                self.send_direct(connector, MsgType::Terrain, &payload);
            }
            MsgType::GetObjects => {
                let now = SyncTime::now();
                let mut sent = 0;
                for id in self.scene.object_ids() {
                    let Some(snapshot) = self.scene.object(id) else {
                        continue;
                    };
                    let handle = match self.prims.get(id) {
                        Some(handle) => handle,
                        None => self.refresh_prim(&snapshot, now),
                    };
                    let payload = encode_object(&handle.lock(), snapshot.physics_actor)
                        .with(keys::ACTOR_ID, self.actor.as_str());
                    self.send_direct(connector, MsgType::NewObject, &payload);
                    sent += 1;
                }
                tracing::info!(actor = %self.actor, connector = %connector.num(), objects = sent, "scene sent to peer");
            }
            _ => {}
        }
    }

    /// Apply a state message; true if it changed local state
    fn on_state(&self, msg_type: MsgType, payload: &Payload) -> SyncResult<bool> {
        match msg_type {
            MsgType::Terrain => self.on_terrain(payload),
            MsgType::NewObject => self.on_new_object(decode_object(payload)?),
            MsgType::UpdatedObject | MsgType::UpdatedBucketProperties => self.on_bucket_update(payload),
            MsgType::RemovedObject => self.on_removed_object(payload),
            MsgType::LinkObject => self.on_link(payload),
            MsgType::DelinkObject => self.on_delink(payload),
            other => Err(SyncError::InvalidPayload(format!("{} is not a state message", other))),
        }
    }

    fn on_state_error(&self, connector: &Connector, msg_type: MsgType, error: SyncError) {
        match error {
            SyncError::MissingPhysicsActor(id) => {
                SyncStats::incr(&self.stats.physics_skips);
                tracing::debug!(object = %id, msg_type = %msg_type, "no physics actor, update skipped");
            }
            SyncError::UnknownObject(id) => {
                SyncStats::incr(&self.stats.unknown_objects);
                tracing::error!(object = %id, msg_type = %msg_type, "update for object without sync state");
            }
            other => self.report_decode_error(connector, Some(msg_type), &other),
        }
    }

    fn on_terrain(&self, payload: &Payload) -> SyncResult<bool> {
        let data = match payload.get(keys::TERRAIN) {
            Some(Value::Bytes(data)) => data.clone(),
            Some(other) => {
                return Err(SyncError::FieldType {
                    field: keys::TERRAIN.to_string(),
                    expected: "bytes",
                    actual: other.type_name(),
                })
            }
            None => return Err(SyncError::MissingField(keys::TERRAIN.to_string())),
        };
        let timestamp = payload.get_time(keys::TIMESTAMP)?;
        let actor = payload.actor_id()?;

        {
            let mut record = self.terrain.lock();
            let stamp = &record.stamp;
            if stamp.timestamp == timestamp && stamp.actor == actor {
                return Ok(false);
            }
            if !incoming_wins(stamp.timestamp, &stamp.actor, timestamp, &actor) {
                tracing::debug!(stored = %stamp.timestamp, incoming = %timestamp, "stale terrain ignored");
                return Ok(false);
            }
            record.stamp = TerrainStamp { timestamp, actor };
            record.data = Some(data.clone());
        }
        self.scene.set_terrain(data);
        Ok(true)
    }

    fn on_new_object(&self, object: DecodedObject) -> SyncResult<bool> {
        let id = object.snapshot.id;
        if let Some(handle) = self.prims.get(id) {
            if self.scene.contains(id) {
                return self.apply_updates(id, &handle, &object.updates);
            }
            self.prims.remove(id);
        } else if self.scene.contains(id) {
            return Err(SyncError::UnknownObject(id));
        }
        self.prims
            .insert(PrimSyncInfo::from_updates(id, &object.updates, &self.registry));
        self.scene.apply_new_object(object.snapshot);
        tracing::debug!(object = %id, "new object applied");
        Ok(true)
    }

    fn on_bucket_update(&self, payload: &Payload) -> SyncResult<bool> {
        let codec = self.registry.codec_for(payload.get_str(keys::BUCKET)?)?;
        let update = codec.decode(payload)?;
        SyncStats::incr(self.bucket_counter(&update.bucket, true));

        if let Some(handle) = self.prims.get(update.object) {
            return self.apply_updates(update.object, &handle, &update.updates);
        }
        if !update.whole_object || self.scene.contains(update.object) {
            return Err(SyncError::UnknownObject(update.object));
        }

        // A whole-object update carries enough to create the object
        let mut snapshot = ObjectSnapshot::new(update.object);
        for u in &update.updates {
            snapshot.properties.insert(u.property, u.value.clone());
        }
        self.prims
            .insert(PrimSyncInfo::from_updates(update.object, &update.updates, &self.registry));
        self.scene.apply_new_object(snapshot);
        tracing::debug!(object = %update.object, sender = %update.sender, "unknown object created from update");
        Ok(true)
    }

    /// Reconcile remote writes into the live object and its sync state
    fn apply_updates(
        &self,
        id: ObjectId,
        handle: &PrimHandle,
        updates: &[PropertyUpdate],
    ) -> SyncResult<bool> {
        let mut result = None;
        let found = self.scene.with_object(id, &mut |host: &mut dyn PropertyHost| {
            result = Some(handle.lock().update_by_sync(host, updates, &self.registry));
        });
        if !found {
            tracing::trace!(object = %id, "update for object removed meanwhile");
            return Ok(false);
        }
        let outcome = result.ok_or(SyncError::UnknownObject(id))??;
        if outcome.rejected > 0 {
            tracing::trace!(object = %id, rejected = outcome.rejected, "stale remote writes ignored");
        }
        Ok(!outcome.applied.is_empty())
    }

    fn on_removed_object(&self, payload: &Payload) -> SyncResult<bool> {
        let id = payload.get_object_id(keys::UUID)?;
        let mode = DeleteMode::from_soft(payload.get_bool(keys::SOFT_DELETE).unwrap_or(false));
        self.prims.remove(id);
        let removed = self.scene.delete_object(id, mode);
        tracing::debug!(object = %id, ?mode, removed, "remote remove");
        Ok(removed)
    }

    fn on_link(&self, payload: &Payload) -> SyncResult<bool> {
        let root = payload.get_object_id(keys::ROOT_ID)?;
        let children = payload.get_object_ids(keys::CHILDREN)?;
        let linked = decode_object(&payload.get_payload(keys::LINKED_GROUP)?)?;
        if !self.scene.contains(root) {
            return Err(SyncError::UnknownObject(root));
        }
        if !children.iter().any(|c| self.scene.contains(*c)) {
            return Ok(false);
        }

        for child in &children {
            self.prims.remove(*child);
        }
        self.prims
            .insert(PrimSyncInfo::from_updates(root, &linked.updates, &self.registry));
        self.scene.link_objects(root, &children, linked.snapshot);
        tracing::debug!(root = %root, children = children.len(), "remote link");
        Ok(true)
    }

    fn on_delink(&self, payload: &Payload) -> SyncResult<bool> {
        let parts = payload.get_object_ids(keys::PARTS)?;
        let before = payload.get_object_ids(keys::BEFORE_GROUPS)?;
        let after = payload
            .get_array(keys::AFTER_GROUPS)?
            .iter()
            .map(|group| match group.as_map() {
                Some(map) => decode_object(&Payload::from(map.clone())),
                None => Err(SyncError::FieldType {
                    field: keys::AFTER_GROUPS.to_string(),
                    expected: "map",
                    actual: group.type_name(),
                }),
            })
            .collect::<SyncResult<Vec<_>>>()?;

        if after.iter().all(|g| self.scene.contains(g.snapshot.id)) {
            return Ok(false);
        }

        for id in &before {
            self.prims.remove(*id);
        }
        let mut snapshots = Vec::with_capacity(after.len());
        for group in after {
            self.prims
                .insert(PrimSyncInfo::from_updates(group.snapshot.id, &group.updates, &self.registry));
            snapshots.push(group.snapshot);
        }
        self.scene.delink_objects(&parts, &before, snapshots);
        tracing::debug!(parts = parts.len(), "remote delink");
        Ok(true)
    }

    fn on_event(&self, connector: &Connector, msg_type: MsgType, payload: Payload, msg: &SyncMessage) {
        let Some(kind) = EventKind::from_msg_type(msg_type) else {
            return;
        };
        let event = match RemoteEvent::decode(kind, payload) {
            Ok(event) => event,
            Err(e) => {
                self.report_decode_error(connector, Some(msg_type), &e);
                return;
            }
        };

        let seen = self.tracker.observe(&event.origin, event.seq);
        if seen.is_anomaly() {
            SyncStats::incr(&self.stats.event_seq_gaps);
            tracing::debug!(event = %kind, origin = %event.origin, ?seen, "event sequence anomaly");
        }

        if self.router.is_relay() {
            let sent = self.router.forward(msg, &event.origin, Some(connector.num()));
            SyncStats::add(&self.stats.msgs_out, sent as u64);
        }

        if let Some(prim) = event.prim_id() {
            if !self.scene.contains(prim) {
                SyncStats::incr(&self.stats.events_dropped);
                tracing::warn!(event = %kind, object = %prim, "event for unknown object dropped");
                return;
            }
        }
        self.scene.deliver_event(&event);
        SyncStats::incr(&self.stats.events_in);
    }

    fn on_state_report(&self, connector: &Connector, payload: &Payload) {
        let origin = payload.actor_id().unwrap_or_else(|_| ActorId::new("?"));
        let remote = payload.get_u64(keys::OBJECT_COUNT).ok();
        let local = self.scene.object_ids().len();
        tracing::info!(
            actor = %self.actor,
            connector = %connector.num(),
            origin = %origin,
            remote_objects = ?remote,
            local_objects = local,
            "sync state report"
        );
    }

    /// Count a malformed message; log only the first of each kind
    pub(crate) fn report_decode_error(&self, connector: &Connector, msg_type: Option<MsgType>, error: &SyncError) {
        SyncStats::incr(&self.stats.decode_errors);
        let label = msg_type.map_or("envelope", MsgType::name);
        if self.stats.first_occurrence(label, error.kind()) {
            SyncStats::incr(&self.stats.decode_errors_logged);
            tracing::warn!(
                actor = %self.actor,
                connector = %connector.num(),
                msg_type = label,
                error = %error,
                "dropping malformed message"
            );
        } else {
            tracing::trace!(connector = %connector.num(), msg_type = label, error = %error, "dropping malformed message");
        }
    }
}
