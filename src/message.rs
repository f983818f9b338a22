//! Outbound message assembly and wire layout.

use bytes::{BufMut, Bytes, BytesMut};

use crate::encode::EncodedPayload;
use crate::stamp::Timestamp;

/// One published sample: identifier, stamp, format tag, compressed bytes.
///
/// Built once per capture cycle and dropped after the publish call returns.
#[derive(Debug, Clone)]
pub struct Message {
    pub frame_id: String,
    pub stamp: Timestamp,
    pub format: String,
    pub data: Bytes,
}

impl Message {
    /// Assemble a message from an encoded payload.
    ///
    /// The non-empty payload invariant is the encoder's contract; this is
    /// pure assembly.
    pub fn build(frame_id: &str, stamp: Timestamp, payload: &EncodedPayload) -> Self {
        debug_assert!(!payload.data.is_empty());
        Self {
            frame_id: frame_id.to_owned(),
            stamp,
            format: payload.format.tag().to_owned(),
            data: payload.data.clone(),
        }
    }

    /// Serialize for the transport.
    ///
    /// Layout, all integers little-endian, strings u32 length-prefixed:
    ///
    /// ```text
    /// frame_id_len: u32 | frame_id | sec: i64 | nanosec: u32
    ///   | format_len: u32 | format | data_len: u32 | data
    /// ```
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            4 + self.frame_id.len() + 8 + 4 + 4 + self.format.len() + 4 + self.data.len(),
        );
        buf.put_u32_le(self.frame_id.len() as u32);
        buf.put_slice(self.frame_id.as_bytes());
        buf.put_i64_le(self.stamp.sec);
        buf.put_u32_le(self.stamp.nanosec);
        buf.put_u32_le(self.format.len() as u32);
        buf.put_slice(self.format.as_bytes());
        buf.put_u32_le(self.data.len() as u32);
        buf.put_slice(&self.data);
        buf.freeze()
    }
}
