//! Per-connection reader and writer tasks
//!
//! Any byte stream becomes a connector: the writer task drains the
//! connector's queue onto the stream, the reader task cuts the stream into
//! envelopes and reports them as `ConnectionEvent`s.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use symsync_core::{ConnectorNum, SyncError};
use symsync_diffusion::Connector;
use symsync_wire::SyncMessage;

/// Initial read buffer capacity
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// What a connection reports to the node
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A whole envelope arrived
    Message {
        connector: Arc<Connector>,
        msg: SyncMessage,
    },
    /// An envelope could not be cut from the stream
    DecodeError {
        connector: Arc<Connector>,
        error: SyncError,
    },
    /// The link is gone; no further events follow for this connector
    Closed(Arc<Connector>),
}

impl ConnectionEvent {
    /// The connector the event came from
    pub fn connector(&self) -> &Arc<Connector> {
        match self {
            ConnectionEvent::Message { connector, .. } | ConnectionEvent::DecodeError { connector, .. } => connector,
            ConnectionEvent::Closed(connector) => connector,
        }
    }
}

/// Sender half the node hands to every connection
pub type EventSender = mpsc::UnboundedSender<ConnectionEvent>;

/// Turn a stream into a live connector and start its tasks
pub fn spawn_connection<S>(
    stream: S,
    num: ConnectorNum,
    description: impl Into<String>,
    events: EventSender,
) -> Arc<Connector>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (connector, io) = Connector::new(num, description);
    let connector = Arc::new(connector);
    let (reader, writer) = tokio::io::split(stream);

    tokio::spawn(write_loop(writer, io.outbox, io.shutdown.clone(), connector.clone()));
    tokio::spawn(read_loop(reader, io.shutdown, connector.clone(), events));

    tracing::debug!(connector = %num, description = %connector.description(), "connection started");
    connector
}

async fn write_loop<W>(
    mut writer: W,
    mut outbox: mpsc::Receiver<SyncMessage>,
    mut shutdown: watch::Receiver<bool>,
    connector: Arc<Connector>,
) where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    loop {
        tokio::select! {
            next = outbox.recv() => {
                let Some(msg) = next else { break };
                buf.clear();
                msg.encode_into(&mut buf);
                if let Err(e) = writer.write_all(&buf).await {
                    tracing::debug!(connector = %connector.num(), error = %e, "write failed");
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    connector.mark_disconnected();
    let _ = writer.shutdown().await;
}

async fn read_loop<R>(
    mut reader: R,
    mut shutdown: watch::Receiver<bool>,
    connector: Arc<Connector>,
    events: EventSender,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    'outer: loop {
        tokio::select! {
            read = reader.read_buf(&mut buf) => {
                match read {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(connector = %connector.num(), error = %e, "read failed");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => break,
        }

        loop {
            let before = buf.len();
            match SyncMessage::decode_from(&mut buf) {
                Ok(Some(msg)) => {
                    connector.record_inbound(msg.encoded_len());
                    let event = ConnectionEvent::Message {
                        connector: connector.clone(),
                        msg,
                    };
                    if events.send(event).is_err() {
                        break 'outer;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    let consumed = buf.len() < before;
                    let event = ConnectionEvent::DecodeError {
                        connector: connector.clone(),
                        error,
                    };
                    if events.send(event).is_err() || !consumed {
                        // Nothing was consumed, so the stream cannot realign
                        break 'outer;
                    }
                }
            }
        }
    }

    connector.close();
    let _ = events.send(ConnectionEvent::Closed(connector));
}

#[cfg(test)]
mod tests {
    use super::*;
    use symsync_wire::{keys, MsgType, Payload};

    #[tokio::test]
    async fn test_messages_cross_a_duplex_stream() {
        let (left, right) = tokio::io::duplex(1024);
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let a = spawn_connection(left, ConnectorNum(1), "a", tx_a);
        let _b = spawn_connection(right, ConnectorNum(2), "b", tx_b);

        let payload = Payload::new().with(keys::ACTOR_ID, "a");
        let msg = SyncMessage::new(MsgType::ActorId, &payload).unwrap();
        assert!(a.send(msg.clone()));
        assert!(a.send(SyncMessage::empty(MsgType::GetObjects)));

        match rx_b.recv().await.unwrap() {
            ConnectionEvent::Message { msg: got, connector } => {
                assert_eq!(got, msg);
                assert_eq!(connector.num(), ConnectorNum(2));
            }
            other => panic!("unexpected {:?}", other),
        }
        match rx_b.recv().await.unwrap() {
            ConnectionEvent::Message { msg: got, .. } => assert_eq!(got.msg_type(), MsgType::GetObjects),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_type_is_reported_and_stream_continues() {
        let (mut raw, right) = tokio::io::duplex(1024);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _b = spawn_connection(right, ConnectorNum(2), "b", tx);

        let mut bytes = vec![0xEE, 0, 0, 0, 0];
        bytes.extend_from_slice(&SyncMessage::empty(MsgType::GetTerrain).encode());
        raw.write_all(&bytes).await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            ConnectionEvent::DecodeError { error: SyncError::UnknownMessageType(0xEE), .. }
        ));
        match rx.recv().await.unwrap() {
            ConnectionEvent::Message { msg, .. } => assert_eq!(msg.msg_type(), MsgType::GetTerrain),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_peer_hangup_reports_closed() {
        let (left, right) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let b = spawn_connection(right, ConnectorNum(9), "b", tx);

        drop(left);
        match rx.recv().await.unwrap() {
            ConnectionEvent::Closed(c) => assert_eq!(c.num(), ConnectorNum(9)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!b.is_connected());
    }
}
