//! Wire format encoding and decoding.
//!
//! Every message on the DM byte stream is preceded by its length:
//! ```text
//! ┌──────────┬──────────────────────┐
//! │ Length   │ Payload (CoAP)       │
//! │ 2 bytes  │ `Length` bytes       │
//! │ uint16 BE│                      │
//! └──────────┴──────────────────────┘
//! ```
//!
//! The receive buffer holds prefix and payload together and is capped at
//! [`MAX_FRAME_BUFFER`] bytes.

use crate::error::{DmError, Result};

/// Length prefix size in bytes (fixed, exactly 2).
pub const LENGTH_FIELD_SIZE: usize = 2;

/// Maximum combined size of length prefix and payload.
pub const MAX_FRAME_BUFFER: usize = 1024;

/// Encode a payload length as the 2-byte big-endian prefix.
///
/// Fails if the length cannot be represented in 16 bits.
///
/// # Example
///
/// ```
/// use iotdm_client::protocol::encode_length;
///
/// assert_eq!(encode_length(0x0102).unwrap(), [0x01, 0x02]);
/// ```
pub fn encode_length(len: usize) -> Result<[u8; LENGTH_FIELD_SIZE]> {
    let len = u16::try_from(len).map_err(|_| {
        DmError::InvalidArgument(format!("Payload of {} bytes exceeds u16 length field", len))
    })?;
    Ok(len.to_be_bytes())
}

/// Combine the two prefix bytes into a frame length.
#[inline]
pub fn length_from_bytes(high: u8, low: u8) -> u16 {
    (u16::from(high) << 8) | u16::from(low)
}

/// Check whether a frame of `payload_len` bytes fits a receive buffer of
/// `capacity` bytes, prefix included.
#[inline]
pub fn fits_buffer(payload_len: usize, capacity: usize) -> bool {
    payload_len + LENGTH_FIELD_SIZE <= capacity
}
