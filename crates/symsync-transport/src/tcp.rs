//! TCP transport

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use symsync_core::{ConnectorNum, SyncError, SyncResult};
use symsync_diffusion::Connector;

use crate::{spawn_connection, EventSender};

/// Listener accepting inbound sync connections
pub struct SyncListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl SyncListener {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> SyncResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SyncError::TransportError(e.to_string()))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| SyncError::TransportError(e.to_string()))?;

        Ok(SyncListener { listener, local_addr })
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the next inbound connection and start it
    pub async fn accept(&self, num: ConnectorNum, events: EventSender) -> SyncResult<Arc<Connector>> {
        let (stream, remote) = self
            .listener
            .accept()
            .await
            .map_err(|e| SyncError::TransportError(e.to_string()))?;
        configure(&stream);
        tracing::info!(remote = %remote, connector = %num, "accepted sync connection");
        Ok(spawn_connection(stream, num, format!("in:{}", remote), events))
    }
}

/// Dial a remote listener
pub async fn connect(addr: SocketAddr, num: ConnectorNum, events: EventSender) -> SyncResult<Arc<Connector>> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| SyncError::ConnectionFailed(format!("{}: {}", addr, e)))?;
    configure(&stream);
    tracing::info!(remote = %addr, connector = %num, "connected to sync listener");
    Ok(spawn_connection(stream, num, format!("out:{}", addr), events))
}

fn configure(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionEvent;
    use symsync_wire::{MsgType, SyncMessage};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_tcp_bind_connect_exchange() {
        let listener = SyncListener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_ne!(listener.local_addr().port(), 0);

        let (server_tx, mut server_rx) = mpsc::unbounded_channel();
        let (client_tx, _client_rx) = mpsc::unbounded_channel();

        let addr = listener.local_addr();
        let (accepted, dialed) = tokio::join!(
            listener.accept(ConnectorNum(1), server_tx),
            connect(addr, ConnectorNum(2), client_tx)
        );
        let _accepted = accepted.unwrap();
        let dialed = dialed.unwrap();

        assert!(dialed.send(SyncMessage::empty(MsgType::GetTerrain)));
        match server_rx.recv().await.unwrap() {
            ConnectionEvent::Message { msg, .. } => assert_eq!(msg.msg_type(), MsgType::GetTerrain),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = SyncListener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr();
        drop(listener);

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = connect(addr, ConnectorNum(1), tx).await;
        assert!(matches!(result, Err(SyncError::ConnectionFailed(_))));
    }
}
