//! Connector - one link to one remote actor
//!
//! A connector owns the bounded outgoing queue of its link. Queuing never
//! blocks; the transport's writer task drains the queue and the reader task
//! reports what arrives. A peer that lets its queue fill up is disconnected
//! and pulls the scene again when it reconnects.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

use tokio::sync::{mpsc, watch};

use symsync_core::{ActorId, ConnectorNum};
use symsync_wire::SyncMessage;

/// Messages a connector queues before its peer counts as stalled
pub const OUTBOX_CAPACITY: usize = 64 * 1024;

/// Transport side of a connector: the outgoing queue and the shutdown signal
#[derive(Debug)]
pub struct ConnectorIo {
    pub outbox: mpsc::Receiver<SyncMessage>,
    pub shutdown: watch::Receiver<bool>,
}

/// Per-connector traffic counters
#[derive(Debug, Default)]
pub struct ConnectorStats {
    pub msgs_in: AtomicU64,
    pub msgs_out: AtomicU64,
    pub bytes_in: AtomicU64,
    pub bytes_out: AtomicU64,
}

impl ConnectorStats {
    fn read(counter: &AtomicU64, clear: bool) -> u64 {
        if clear {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    }
}

/// A live link to one remote actor
pub struct Connector {
    num: ConnectorNum,
    description: String,
    peer: OnceLock<ActorId>,
    connected: AtomicBool,
    outbox: mpsc::Sender<SyncMessage>,
    shutdown: watch::Sender<bool>,
    stats: ConnectorStats,
}

impl Connector {
    /// Create a connector and the queue ends its transport drives
    pub fn new(num: ConnectorNum, description: impl Into<String>) -> (Self, ConnectorIo) {
        Self::with_capacity(num, description, OUTBOX_CAPACITY)
    }

    pub fn with_capacity(num: ConnectorNum, description: impl Into<String>, capacity: usize) -> (Self, ConnectorIo) {
        let (outbox_tx, outbox_rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connector = Connector {
            num,
            description: description.into(),
            peer: OnceLock::new(),
            connected: AtomicBool::new(true),
            outbox: outbox_tx,
            shutdown: shutdown_tx,
            stats: ConnectorStats::default(),
        };
        let io = ConnectorIo {
            outbox: outbox_rx,
            shutdown: shutdown_rx,
        };
        (connector, io)
    }

    pub fn num(&self) -> ConnectorNum {
        self.num
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Remote actor, once its handshake arrived
    pub fn peer(&self) -> Option<&ActorId> {
        self.peer.get()
    }

    /// Record the remote actor; the first handshake wins
    pub fn set_peer(&self, actor: ActorId) -> bool {
        match self.peer.set(actor) {
            Ok(()) => true,
            Err(rejected) => {
                if self.peer.get() != Some(&rejected) {
                    tracing::warn!(
                        connector = %self.num,
                        peer = ?self.peer.get(),
                        claimed = %rejected,
                        "peer actor changed mid-connection, ignoring"
                    );
                }
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.outbox.is_closed()
    }

    /// Queue a message for sending. Returns false if the link is down.
    ///
    /// A full queue closes the link.
    pub fn send(&self, msg: SyncMessage) -> bool {
        if !self.connected.load(Ordering::Acquire) {
            return false;
        }
        let len = msg.encoded_len() as u64;
        match self.outbox.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    connector = %self.num,
                    peer = ?self.peer(),
                    queued = self.outbox.max_capacity(),
                    "outgoing queue full, closing connector"
                );
                self.close();
                return false;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.connected.store(false, Ordering::Release);
                return false;
            }
        }
        self.stats.msgs_out.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_out.fetch_add(len, Ordering::Relaxed);
        true
    }

    /// Count one received message
    pub fn record_inbound(&self, bytes: usize) {
        self.stats.msgs_in.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Mark the link down after the transport lost it
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Close the link and stop its transport tasks
    pub fn close(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::debug!(connector = %self.num, peer = ?self.peer(), "closing connector");
        }
        self.shutdown.send_replace(true);
    }

    pub fn stats(&self) -> &ConnectorStats {
        &self.stats
    }

    pub fn statistic_title() -> &'static str {
        "connector,peer,description,msgs_in,msgs_out,bytes_in,bytes_out"
    }

    /// One CSV statistics line; `clear` resets the counters
    pub fn statistic_line(&self, clear: bool) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.num,
            self.peer().map(ActorId::as_str).unwrap_or("-"),
            self.description,
            ConnectorStats::read(&self.stats.msgs_in, clear),
            ConnectorStats::read(&self.stats.msgs_out, clear),
            ConnectorStats::read(&self.stats.bytes_in, clear),
            ConnectorStats::read(&self.stats.bytes_out, clear),
        )
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("num", &self.num)
            .field("peer", &self.peer())
            .field("description", &self.description)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symsync_wire::{MsgType, Payload};

    #[test]
    fn test_send_queues_and_counts() {
        let (connector, mut io) = Connector::new(ConnectorNum(1), "test");
        let msg = SyncMessage::new(MsgType::GetObjects, &Payload::new()).unwrap();
        let len = msg.encoded_len() as u64;

        assert!(connector.send(msg.clone()));
        assert_eq!(io.outbox.try_recv().unwrap(), msg);
        assert_eq!(connector.stats().msgs_out.load(Ordering::Relaxed), 1);
        assert_eq!(connector.stats().bytes_out.load(Ordering::Relaxed), len);
    }

    #[test]
    fn test_full_queue_closes_connector() {
        let (connector, mut io) = Connector::with_capacity(ConnectorNum(4), "slow", 2);
        assert!(connector.send(SyncMessage::empty(MsgType::GetTerrain)));
        assert!(connector.send(SyncMessage::empty(MsgType::GetObjects)));

        assert!(!connector.send(SyncMessage::empty(MsgType::GetTerrain)));
        assert!(!connector.is_connected());
        assert!(*io.shutdown.borrow());
        assert_eq!(connector.stats().msgs_out.load(Ordering::Relaxed), 2);
        assert_eq!(io.outbox.try_recv().unwrap().msg_type(), MsgType::GetTerrain);
    }

    #[test]
    fn test_send_fails_after_close() {
        let (connector, io) = Connector::new(ConnectorNum(1), "test");
        connector.close();
        assert!(*io.shutdown.borrow());
        assert!(!connector.is_connected());
        assert!(!connector.send(SyncMessage::empty(MsgType::GetTerrain)));
    }

    #[test]
    fn test_dropped_transport_marks_disconnected() {
        let (connector, io) = Connector::new(ConnectorNum(2), "test");
        drop(io);
        assert!(!connector.is_connected());
        assert!(!connector.send(SyncMessage::empty(MsgType::GetTerrain)));
    }

    #[test]
    fn test_first_peer_wins() {
        let (connector, _io) = Connector::new(ConnectorNum(3), "test");
        assert!(connector.peer().is_none());
        assert!(connector.set_peer(ActorId::new("a")));
        assert!(!connector.set_peer(ActorId::new("b")));
        assert_eq!(connector.peer(), Some(&ActorId::new("a")));
    }

    #[test]
    fn test_statistic_line_clears() {
        let (connector, _io) = Connector::new(ConnectorNum(4), "test");
        connector.set_peer(ActorId::new("a"));
        connector.record_inbound(10);
        connector.record_inbound(5);

        assert_eq!(connector.statistic_line(true), "4,a,test,2,0,15,0");
        assert_eq!(connector.statistic_line(false), "4,a,test,0,0,0,0");
    }
}
