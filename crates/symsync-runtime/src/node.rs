//! Sync node - the per-process sync engine
//!
//! Local scene changes enter through the `on_*` methods. Bucket updates are
//! batched and sent by the heartbeat flush; structural changes and events go
//! out immediately. Inbound messages are handled by the dispatcher, on one
//! worker task per connector.
//!
//! Lock order: the scene's object lock (held around `Scene::with_object`),
//! then the object's sync mutex. No lock is held while a message is queued.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use symsync_core::{ActorId, ConnectorNum, EventSeq, ObjectId, Property, SyncError, SyncResult, SyncTime, Value};
use symsync_diffusion::{Connector, Role, TopologyRouter};
use symsync_state::{
    encode_object, incoming_wins, ObjectSnapshot, PrimHandle, PrimSyncInfo, PrimSyncInfoManager,
    PropertyHost, PropertyRegistry,
};
use symsync_transport::{connect, memory_link, ConnectionEvent, EventSender, SyncListener};
use symsync_wire::{keys, MsgType, Payload, SyncMessage};

use crate::{
    append_stats_line, DeleteMode, EventKind, EventSequencer, EventTracker, OutboundBatcher, Scene,
    SyncConfig, SyncStats,
};

/// Last accepted terrain write
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainStamp {
    pub timestamp: SyncTime,
    pub actor: ActorId,
}

/// Winning terrain write and its heightmap
#[derive(Debug)]
pub(crate) struct TerrainRecord {
    pub(crate) stamp: TerrainStamp,
    /// None until a write has been accepted
    pub(crate) data: Option<Vec<u8>>,
}

/// Handle to a sync node; cheap to clone
#[derive(Clone)]
pub struct SyncNode {
    pub(crate) inner: Arc<NodeInner>,
}

pub(crate) struct NodeInner {
    pub(crate) config: SyncConfig,
    pub(crate) actor: ActorId,
    pub(crate) active: bool,
    pub(crate) registry: PropertyRegistry,
    pub(crate) scene: Arc<dyn Scene>,
    pub(crate) prims: PrimSyncInfoManager,
    pub(crate) router: TopologyRouter,
    pub(crate) batcher: OutboundBatcher,
    pub(crate) stats: SyncStats,
    pub(crate) sequencer: EventSequencer,
    pub(crate) tracker: EventTracker,
    pub(crate) terrain: Mutex<TerrainRecord>,
    running: AtomicBool,
    conn_tx: EventSender,
    conn_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnectionEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    listener_addr: Mutex<Option<SocketAddr>>,
}

impl SyncNode {
    /// Build a node from configuration
    ///
    /// A disabled or invalid configuration yields an inert node: it accepts
    /// every call and does nothing.
    pub fn activate(config: SyncConfig, scene: Arc<dyn Scene>) -> Self {
        let registry = if !config.enabled {
            tracing::info!("sync disabled by configuration");
            None
        } else {
            match config.validate().and_then(|_| config.registry()) {
                Ok(registry) => Some(registry),
                Err(e) => {
                    tracing::error!(error = %e, "sync configuration invalid, node stays inert");
                    None
                }
            }
        };
        let active = registry.is_some();
        let registry = registry.unwrap_or_default();
        let actor = config.actor();
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();

        if active {
            tracing::info!(actor = %actor, role = %config.role, buckets = registry.buckets().len(), "sync node activated");
        }

        SyncNode {
            inner: Arc::new(NodeInner {
                batcher: OutboundBatcher::new(registry.buckets().len()),
                router: TopologyRouter::new(config.role),
                terrain: Mutex::new(TerrainRecord {
                    stamp: TerrainStamp {
                        timestamp: SyncTime::ZERO,
                        actor: actor.clone(),
                    },
                    data: None,
                }),
                config,
                actor,
                active,
                registry,
                scene,
                prims: PrimSyncInfoManager::new(),
                stats: SyncStats::new(),
                sequencer: EventSequencer::default(),
                tracker: EventTracker::default(),
                running: AtomicBool::new(false),
                conn_tx,
                conn_rx: Mutex::new(Some(conn_rx)),
                tasks: Mutex::new(Vec::new()),
                listener_addr: Mutex::new(None),
            }),
        }
    }

    pub fn actor(&self) -> &ActorId {
        &self.inner.actor
    }

    pub fn role(&self) -> Role {
        self.inner.router.role()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &PropertyRegistry {
        &self.inner.registry
    }

    pub fn router(&self) -> &TopologyRouter {
        &self.inner.router
    }

    pub fn stats(&self) -> &SyncStats {
        &self.inner.stats
    }

    pub fn prims(&self) -> &PrimSyncInfoManager {
        &self.inner.prims
    }

    pub fn batcher(&self) -> &OutboundBatcher {
        &self.inner.batcher
    }

    pub fn terrain_stamp(&self) -> TerrainStamp {
        self.inner.terrain.lock().stamp.clone()
    }

    /// Copy of an object's sync state
    pub fn prim_info(&self, id: ObjectId) -> Option<PrimSyncInfo> {
        self.inner.prims.get(id).map(|handle| handle.lock().clone())
    }

    /// Bound listener address, once started
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        *self.inner.listener_addr.lock()
    }

    pub fn connector_count(&self) -> usize {
        self.inner.router.connectors().len()
    }

    /// Start background tasks, the listener, and dial the remote listeners
    pub async fn start(&self) -> SyncResult<()> {
        if !self.inner.active {
            return Err(SyncError::Inactive);
        }
        let listener_addr = self.inner.config.listener_addr()?;
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.spawn_inbound();
        self.spawn_heartbeat();
        if self.inner.config.stats_log.enabled {
            self.spawn_stats_log();
        }

        if let Some(addr) = listener_addr {
            match SyncListener::bind(addr).await {
                Ok(listener) => {
                    *self.inner.listener_addr.lock() = Some(listener.local_addr());
                    tracing::info!(actor = %self.inner.actor, addr = %listener.local_addr(), "sync listener started");
                    self.spawn_accept_loop(listener);
                }
                Err(e) => {
                    self.stop();
                    return Err(e);
                }
            }
        }

        for remote in &self.inner.config.remote_listeners {
            let addr = remote.socket_addr()?;
            if let Err(e) = self.connect(addr).await {
                tracing::warn!(actor = %self.inner.actor, remote = %addr, error = %e, "failed to dial remote listener");
            }
        }

        tracing::info!(actor = %self.inner.actor, role = %self.role(), "sync started");
        Ok(())
    }

    /// Close every connector and stop the listener and heartbeat
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Release);
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        *self.inner.listener_addr.lock() = None;
        let closed = self.inner.router.close_all();
        tracing::info!(actor = %self.inner.actor, closed, "sync stopped");
    }

    /// Dial a remote listener and run initial sync over it
    pub async fn connect(&self, addr: SocketAddr) -> SyncResult<Arc<Connector>> {
        let num = self.inner.router.connectors().next_num();
        let connector = connect(addr, num, self.inner.conn_tx.clone()).await?;
        self.adopt(connector.clone(), true);
        Ok(connector)
    }

    /// Join this node to `other` with an in-memory link; this side dials
    pub fn link_with(&self, other: &SyncNode) -> (Arc<Connector>, Arc<Connector>) {
        let link = memory_link(
            (self.inner.router.connectors().next_num(), self.inner.conn_tx.clone()),
            (other.inner.router.connectors().next_num(), other.inner.conn_tx.clone()),
            &format!("{}-{}", self.inner.actor, other.inner.actor),
        );
        other.adopt(link.right.clone(), false);
        self.adopt(link.left.clone(), true);
        (link.left, link.right)
    }

    /// Take a started connector into the active set and handshake
    ///
    /// The dialing side also clears its scene and pulls the peer's.
    pub fn adopt(&self, connector: Arc<Connector>, dialed: bool) {
        let inner = &self.inner;
        inner.router.connectors().add(connector.clone());

        let handshake = [
            (MsgType::ActorId, Payload::new().with(keys::ACTOR_ID, inner.actor.as_str())),
            (
                MsgType::RegionName,
                Payload::new().with(keys::REGION_NAME, inner.config.region_name.as_str()),
            ),
        ];
        for (msg_type, payload) in handshake {
            inner.send_direct(&connector, msg_type, &payload);
        }

        if dialed {
            inner.scene.delete_all_objects();
            inner.prims.clear();
            inner.send_direct(&connector, MsgType::GetTerrain, &Payload::new());
            inner.send_direct(&connector, MsgType::GetObjects, &Payload::new());
            tracing::info!(actor = %inner.actor, connector = %connector.num(), "initial sync requested");
        }
    }

    /// Fan connection events out to one worker per connector
    ///
    /// Messages of one connector are handled in arrival order; a slow
    /// message on one link does not hold up the others.
    fn spawn_inbound(&self) {
        let Some(mut rx) = self.inner.conn_rx.lock().take() else {
            return;
        };
        let weak: Weak<NodeInner> = Arc::downgrade(&self.inner);
        // Lives as long as the node, across stop and start
        tokio::spawn(async move {
            let mut workers: HashMap<ConnectorNum, mpsc::UnboundedSender<ConnectionEvent>> = HashMap::new();
            while let Some(event) = rx.recv().await {
                if weak.strong_count() == 0 {
                    break;
                }
                let num = event.connector().num();
                let closed = matches!(event, ConnectionEvent::Closed(_));
                let worker = workers
                    .entry(num)
                    .or_insert_with(|| spawn_connector_worker(weak.clone()));
                if worker.send(event).is_err() || closed {
                    workers.remove(&num);
                }
            }
        });
    }

    fn spawn_heartbeat(&self) {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.flush_interval;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                inner.flush();
            }
        });
        self.inner.tasks.lock().push(task);
    }

    fn spawn_stats_log(&self) {
        let weak = Arc::downgrade(&self.inner);
        let config = self.inner.config.stats_log.clone();
        let path = config.file_for(&self.inner.actor);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let line = inner.stats.statistic_line(true);
                tracing::info!(target: "symsync::stats", actor = %inner.actor, %line, "statistics");
                drop(inner);
                if let Err(e) = append_stats_line(&path, &SyncStats::statistic_title(), &line).await {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write statistics");
                }
            }
        });
        self.inner.tasks.lock().push(task);
    }

    fn spawn_accept_loop(&self, listener: SyncListener) {
        let node = Arc::downgrade(&self.inner);
        let events = self.inner.conn_tx.clone();
        let task = tokio::spawn(async move {
            loop {
                let Some(inner) = node.upgrade() else { break };
                let num = inner.router.connectors().next_num();
                drop(inner);
                match listener.accept(num, events.clone()).await {
                    Ok(connector) => {
                        let Some(inner) = node.upgrade() else { break };
                        SyncNode { inner }.adopt(connector, false);
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }
        });
        self.inner.tasks.lock().push(task);
    }

    // Local changes

    /// Local writes to `properties` of an object, stamped now
    pub fn on_local_update(&self, id: ObjectId, properties: &[Property]) {
        self.record_local_update(id, properties, SyncTime::now());
    }

    /// Local writes to `properties` of an object, stamped `timestamp`
    ///
    /// Stale writes are corrected in the scene right away; accepted ones are
    /// queued for the next flush. Never blocks on the network.
    pub fn record_local_update(&self, id: ObjectId, properties: &[Property], timestamp: SyncTime) {
        let inner = &self.inner;
        if !inner.active || properties.is_empty() {
            return;
        }

        let mut outcome = None;
        let found = inner.scene.with_object(id, &mut |host: &mut dyn PropertyHost| {
            let mut fresh = false;
            let handle = inner.prims.get_or_insert_with(id, || {
                fresh = true;
                PrimSyncInfo::from_host(&*host, &inner.registry, timestamp, &inner.actor)
            });
            let properties: &[Property] = if fresh { &[Property::FullUpdate] } else { properties };
            let mut prim = handle.lock();
            outcome = Some(prim.update_by_local(host, properties, timestamp, &inner.actor, &inner.registry));
        });

        if !found {
            tracing::debug!(object = %id, "local update for object not in scene");
            return;
        }
        if let Some(outcome) = outcome {
            if !outcome.corrected.is_empty() {
                SyncStats::add(&inner.stats.stale_corrections, outcome.corrected.len() as u64);
            }
            for bucket in outcome.dirty_buckets {
                inner.batcher.mark_dirty(id, bucket);
            }
        }
    }

    /// A new object appeared in the local scene
    pub fn on_object_added(&self, id: ObjectId) {
        let inner = &self.inner;
        if !inner.active {
            return;
        }
        let Some(snapshot) = inner.scene.object(id) else {
            tracing::warn!(object = %id, "added object not found in scene");
            return;
        };
        let handle = inner.refresh_prim(&snapshot, SyncTime::now());
        let payload = encode_object(&handle.lock(), snapshot.physics_actor).with(keys::ACTOR_ID, inner.actor.as_str());
        inner.send_special(MsgType::NewObject, &payload);
    }

    /// An object left the local scene
    pub fn on_object_removed(&self, id: ObjectId, mode: DeleteMode) {
        let inner = &self.inner;
        if !inner.active {
            return;
        }
        inner.prims.remove(id);
        let payload = Payload::new()
            .with(keys::UUID, id)
            .with(keys::SOFT_DELETE, mode.is_soft())
            .with(keys::ACTOR_ID, inner.actor.as_str());
        inner.send_special(MsgType::RemovedObject, &payload);
    }

    /// `children` were linked into `root` locally
    pub fn on_objects_linked(&self, root: ObjectId, children: &[ObjectId]) {
        let inner = &self.inner;
        if !inner.active {
            return;
        }
        let Some(snapshot) = inner.scene.object(root) else {
            tracing::warn!(object = %root, "linked root not found in scene");
            return;
        };
        for child in children {
            inner.prims.remove(*child);
        }
        let handle = inner.refresh_prim(&snapshot, SyncTime::now());
        let linked = encode_object(&handle.lock(), snapshot.physics_actor);
        let payload = Payload::new()
            .with(keys::ROOT_ID, root)
            .with(keys::CHILDREN, ids_value(children))
            .with(keys::LINKED_GROUP, linked)
            .with(keys::ACTOR_ID, inner.actor.as_str());
        inner.send_special(MsgType::LinkObject, &payload);
    }

    /// `parts` were split off `before`, producing `after`
    pub fn on_objects_delinked(&self, parts: &[ObjectId], before: &[ObjectId], after: &[ObjectId]) {
        let inner = &self.inner;
        if !inner.active {
            return;
        }
        let now = SyncTime::now();
        let mut groups = Vec::with_capacity(after.len());
        for id in after {
            let Some(snapshot) = inner.scene.object(*id) else {
                tracing::warn!(object = %id, "delinked object not found in scene");
                continue;
            };
            let handle = inner.refresh_prim(&snapshot, now);
            groups.push(Value::from(encode_object(&handle.lock(), snapshot.physics_actor)));
        }
        for id in before.iter().filter(|id| !after.contains(id)) {
            inner.prims.remove(*id);
        }
        let payload = Payload::new()
            .with(keys::PARTS, ids_value(parts))
            .with(keys::BEFORE_GROUPS, ids_value(before))
            .with(keys::AFTER_GROUPS, groups)
            .with(keys::ACTOR_ID, inner.actor.as_str());
        inner.send_special(MsgType::DelinkObject, &payload);
    }

    /// The local terrain changed
    ///
    /// A change stamped older than the stored winner is undone: the scene
    /// gets the winning heightmap back.
    pub fn on_terrain_changed(&self) {
        let inner = &self.inner;
        if !inner.active {
            return;
        }
        let now = SyncTime::now();
        let data = inner.scene.terrain();
        let restore = {
            let mut record = inner.terrain.lock();
            if incoming_wins(record.stamp.timestamp, &record.stamp.actor, now, &inner.actor) {
                record.stamp = TerrainStamp {
                    timestamp: now,
                    actor: inner.actor.clone(),
                };
                record.data = Some(data.clone());
                None
            } else {
                tracing::debug!(stored = %record.stamp.timestamp, "local terrain change older than stored, restored");
                record.data.clone()
            }
        };
        if let Some(winner) = restore {
            SyncStats::incr(&inner.stats.stale_corrections);
            inner.scene.set_terrain(winner);
            return;
        }
        let payload = inner.terrain_payload_with(data);
        inner.send_special(MsgType::Terrain, &payload);
    }

    /// Send a local event to every peer
    pub fn publish_event(&self, kind: EventKind, mut payload: Payload) -> Option<EventSeq> {
        let inner = &self.inner;
        if !inner.active {
            return None;
        }
        let seq = inner.sequencer.next();
        payload.insert(keys::ACTOR_ID, inner.actor.as_str());
        payload.insert(keys::SEQ_NUM, seq.0);
        let msg = match SyncMessage::new(kind.msg_type(), &payload) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(event = %kind, error = %e, "failed to encode event");
                return None;
            }
        };
        let sent = inner.router.route(&msg, None);
        SyncStats::incr(&inner.stats.events_out);
        SyncStats::add(&inner.stats.msgs_out, sent as u64);
        Some(seq)
    }

    /// Send every pending bucket update now; no-op while another flush runs
    pub fn flush(&self) -> usize {
        self.inner.flush()
    }

    /// Run a flush on a runtime task, off the caller's thread
    pub fn request_flush(&self) {
        let inner = self.inner.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    inner.flush();
                });
            }
            Err(_) => tracing::debug!("no runtime for flush, waiting for heartbeat"),
        }
    }
}

impl NodeInner {
    /// Send each pending (object, bucket) once, in bucket order
    pub(crate) fn flush(&self) -> usize {
        let Some(_guard) = self.batcher.try_begin_flush() else {
            tracing::trace!("flush already running, skipped");
            return 0;
        };

        let mut units = 0;
        for (bucket_id, objects) in self.batcher.take_all() {
            let Some(bucket) = self.registry.bucket(bucket_id) else {
                continue;
            };
            let codec = bucket.codec();
            for id in objects {
                if !self.scene.contains(id) {
                    tracing::trace!(object = %id, "deleted before flush");
                    continue;
                }
                let Some(handle) = self.prims.get(id) else {
                    continue;
                };
                let payload = {
                    let mut prim = handle.lock();
                    if !prim.needs_send(bucket_id, &self.registry) {
                        continue;
                    }
                    let payload = codec.encode(bucket, &prim, &self.actor);
                    prim.clear_dirty(bucket_id, &self.registry);
                    payload
                };
                let msg = match SyncMessage::new(codec.message_type(), &payload) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::error!(object = %id, bucket = %bucket.name, error = %e, "failed to encode bucket");
                        continue;
                    }
                };
                let sent = self.router.route(&msg, None);
                SyncStats::add(&self.stats.msgs_out, sent as u64);
                SyncStats::incr(self.bucket_counter(&bucket.name, false));
                units += 1;
            }
        }
        if units > 0 {
            tracing::trace!(actor = %self.actor, units, "flushed");
        }
        units
    }

    pub(crate) fn bucket_counter(&self, bucket: &str, inbound: bool) -> &std::sync::atomic::AtomicU64 {
        match (bucket, inbound) {
            (symsync_state::GENERAL_BUCKET, true) => &self.stats.general_in,
            (symsync_state::GENERAL_BUCKET, false) => &self.stats.general_out,
            (symsync_state::PHYSICS_BUCKET, true) => &self.stats.physics_in,
            (symsync_state::PHYSICS_BUCKET, false) => &self.stats.physics_out,
            (_, true) => &self.stats.other_bucket_in,
            (_, false) => &self.stats.other_bucket_out,
        }
    }

    /// Bring an object's sync state up to its live values, stamped `now`
    ///
    /// Used before the whole object is sent, so nothing is left dirty.
    pub(crate) fn refresh_prim(&self, snapshot: &ObjectSnapshot, now: SyncTime) -> PrimHandle {
        let mut fresh = false;
        let handle = self.prims.get_or_insert_with(snapshot.id, || {
            fresh = true;
            let mut prim = PrimSyncInfo::from_host(snapshot, &self.registry, now, &self.actor);
            for bucket in self.registry.bucket_ids() {
                prim.clear_dirty(bucket, &self.registry);
            }
            prim
        });
        if !fresh {
            let mut prim = handle.lock();
            let mut host = snapshot.clone();
            prim.update_by_local(&mut host, &[Property::FullUpdate], now, &self.actor, &self.registry);
            for bucket in self.registry.bucket_ids() {
                prim.clear_dirty(bucket, &self.registry);
            }
        }
        handle
    }

    pub(crate) fn terrain_payload(&self) -> Payload {
        self.terrain_payload_with(self.scene.terrain())
    }

    pub(crate) fn terrain_payload_with(&self, data: Vec<u8>) -> Payload {
        let stamp = self.terrain.lock().stamp.clone();
        Payload::new()
            .with(keys::TERRAIN, data)
            .with(keys::TIMESTAMP, stamp.timestamp.as_micros())
            .with(keys::ACTOR_ID, stamp.actor.as_str())
    }

    /// Send a structural change immediately, bypassing the batcher
    pub(crate) fn send_special(&self, msg_type: MsgType, payload: &Payload) {
        match SyncMessage::new(msg_type, payload) {
            Ok(msg) => {
                let sent = self.router.route(&msg, None);
                SyncStats::incr(&self.stats.special_out);
                SyncStats::add(&self.stats.msgs_out, sent as u64);
            }
            Err(e) => tracing::error!(msg_type = %msg_type, error = %e, "failed to encode message"),
        }
    }

    /// Send to one connector only
    pub(crate) fn send_direct(&self, connector: &Connector, msg_type: MsgType, payload: &Payload) {
        match SyncMessage::new(msg_type, payload) {
            Ok(msg) => {
                if self.router.send_to(connector, msg) {
                    SyncStats::incr(&self.stats.msgs_out);
                }
            }
            Err(e) => tracing::error!(msg_type = %msg_type, error = %e, "failed to encode message"),
        }
    }

    fn handle_connection_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Message { connector, msg } => self.dispatch(&connector, msg),
            ConnectionEvent::DecodeError { connector, error } => {
                self.report_decode_error(&connector, None, &error);
            }
            ConnectionEvent::Closed(connector) => {
                if self.router.connectors().remove(connector.num()).is_some() {
                    tracing::info!(
                        actor = %self.actor,
                        connector = %connector.num(),
                        peer = ?connector.peer(),
                        "connector closed"
                    );
                }
            }
        }
    }
}

/// Handle one connector's events in order until it closes
fn spawn_connector_worker(node: Weak<NodeInner>) -> mpsc::UnboundedSender<ConnectionEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(inner) = node.upgrade() else { break };
            inner.handle_connection_event(event);
        }
    });
    tx
}

fn ids_value(ids: &[ObjectId]) -> Value {
    Value::Array(ids.iter().copied().map(Value::from).collect())
}
