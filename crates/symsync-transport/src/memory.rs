//! In-memory link between two nodes in one process

use std::sync::Arc;

use symsync_core::ConnectorNum;
use symsync_diffusion::Connector;

use crate::{spawn_connection, EventSender};

/// Buffer size of each direction of an in-memory link
pub const MEMORY_LINK_BUFFER: usize = 256 * 1024;

/// Both ends of an in-memory link
#[derive(Debug)]
pub struct MemoryLink {
    pub left: Arc<Connector>,
    pub right: Arc<Connector>,
}

/// Join two nodes with an in-memory byte stream
///
/// Frames cross the link exactly as they would cross TCP.
pub fn memory_link(
    left: (ConnectorNum, EventSender),
    right: (ConnectorNum, EventSender),
    label: &str,
) -> MemoryLink {
    let (a, b) = tokio::io::duplex(MEMORY_LINK_BUFFER);
    MemoryLink {
        left: spawn_connection(a, left.0, format!("mem:{}:left", label), left.1),
        right: spawn_connection(b, right.0, format!("mem:{}:right", label), right.1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionEvent;
    use symsync_wire::{MsgType, SyncMessage};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_memory_link_closes_both_ends() {
        let (ltx, mut lrx) = mpsc::unbounded_channel();
        let (rtx, mut rrx) = mpsc::unbounded_channel();
        let link = memory_link((ConnectorNum(1), ltx), (ConnectorNum(1), rtx), "t");

        assert!(link.left.send(SyncMessage::empty(MsgType::GetObjects)));
        assert!(matches!(rrx.recv().await.unwrap(), ConnectionEvent::Message { .. }));

        link.left.close();
        assert!(matches!(lrx.recv().await.unwrap(), ConnectionEvent::Closed(_)));
        assert!(matches!(rrx.recv().await.unwrap(), ConnectionEvent::Closed(_)));
    }
}
