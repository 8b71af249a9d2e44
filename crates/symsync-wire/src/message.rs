//! Sync message envelope
//!
//! Envelope = Type (1) + Payload length (4, LE) + Payload
//!
//! The payload stays encoded until a handler asks for it, so relays can
//! forward a message byte-for-byte without re-serializing it.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use symsync_core::{SyncError, SyncResult};

use crate::{MsgType, Payload};

/// Envelope header size
pub const ENVELOPE_HEADER_SIZE: usize = 5;

/// Maximum payload size accepted from a peer
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// A tagged sync message
#[derive(Clone, Debug, PartialEq)]
pub struct SyncMessage {
    msg_type: MsgType,
    data: Bytes,
}

impl SyncMessage {
    /// Build a message from a payload
    pub fn new(msg_type: MsgType, payload: &Payload) -> SyncResult<Self> {
        Ok(SyncMessage {
            msg_type,
            data: Bytes::from(payload.to_json()?),
        })
    }

    /// A message with an empty payload
    pub fn empty(msg_type: MsgType) -> Self {
        SyncMessage {
            msg_type,
            data: Bytes::new(),
        }
    }

    /// Wrap already-encoded payload bytes
    pub fn from_raw(msg_type: MsgType, data: Bytes) -> Self {
        SyncMessage { msg_type, data }
    }

    #[inline]
    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    /// Raw payload bytes
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Decode the payload; an empty body decodes to an empty map
    pub fn payload(&self) -> SyncResult<Payload> {
        if self.data.is_empty() {
            return Ok(Payload::new());
        }
        Payload::from_json(&self.data)
    }

    /// Size on the wire
    pub fn encoded_len(&self) -> usize {
        ENVELOPE_HEADER_SIZE + self.data.len()
    }

    /// Encode the envelope
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u8(self.msg_type.to_byte());
        buf.put_u32_le(self.data.len() as u32);
        buf.put_slice(&self.data);
    }

    /// Decode exactly one envelope from `buf`
    pub fn decode(buf: &[u8]) -> SyncResult<Self> {
        let mut bytes = BytesMut::from(buf);
        match Self::decode_from(&mut bytes)? {
            Some(msg) if bytes.is_empty() => Ok(msg),
            Some(_) => Err(SyncError::InvalidPayload(format!(
                "{} trailing bytes after envelope",
                bytes.len()
            ))),
            None => Err(SyncError::BufferTooShort {
                expected: Self::needed(buf),
                actual: buf.len(),
            }),
        }
    }

    /// Decode one envelope from the front of a stream buffer
    ///
    /// Returns `Ok(None)` when more bytes are needed. On an unknown type the
    /// envelope is still consumed, so the stream stays aligned.
    pub fn decode_from(buf: &mut BytesMut) -> SyncResult<Option<Self>> {
        if buf.len() < ENVELOPE_HEADER_SIZE {
            return Ok(None);
        }

        let type_byte = buf[0];
        let len = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        if len > MAX_PAYLOAD_SIZE {
            return Err(SyncError::InvalidPayload(format!(
                "payload too large: {} > {}",
                len, MAX_PAYLOAD_SIZE
            )));
        }
        if buf.len() < ENVELOPE_HEADER_SIZE + len {
            return Ok(None);
        }

        buf.advance(ENVELOPE_HEADER_SIZE);
        let data = buf.split_to(len).freeze();
        let msg_type = MsgType::parse(type_byte)?;

        Ok(Some(SyncMessage { msg_type, data }))
    }

    fn needed(buf: &[u8]) -> usize {
        if buf.len() < ENVELOPE_HEADER_SIZE {
            return ENVELOPE_HEADER_SIZE;
        }
        ENVELOPE_HEADER_SIZE + u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize
    }
}
