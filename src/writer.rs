//! Outbound framing.
//!
//! Every message handed to the transport is preceded by its 2-byte
//! big-endian length. Prefix and message go out as two separate sends.
//!
//! ```text
//! Engine ─► OutboundFrame { prefix, payload } ─► send(prefix) ─► send(payload)
//! ```

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{encode_length, LENGTH_FIELD_SIZE};
use crate::transport::Transport;

/// A message ready to be written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Pre-encoded length prefix.
    pub prefix: [u8; LENGTH_FIELD_SIZE],
    /// Message bytes.
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Frame `payload`. Fails if it does not fit the 16-bit length field.
    pub fn new(payload: Bytes) -> Result<Self> {
        Ok(Self {
            prefix: encode_length(payload.len())?,
            payload,
        })
    }

    /// Total size on the wire (prefix + payload).
    #[inline]
    pub fn size(&self) -> usize {
        LENGTH_FIELD_SIZE + self.payload.len()
    }
}

/// Write one frame: the length, then the message.
pub async fn write_frame(transport: &mut dyn Transport, frame: &OutboundFrame) -> Result<()> {
    tracing::debug!("Sending {} bytes", frame.payload.len());
    transport.send(&frame.prefix).await?;
    transport.send(&frame.payload).await?;
    Ok(())
}

/// Frame and write `payload`.
pub async fn send_message(transport: &mut dyn Transport, payload: Bytes) -> Result<()> {
    let frame = OutboundFrame::new(payload)?;
    write_frame(transport, &frame).await
}
