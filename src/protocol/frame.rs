//! Frame struct and outbound frame construction.
//!
//! A [`Frame`] is one complete application message taken off the byte
//! stream, with the length prefix already stripped.
//!
//! # Example
//!
//! ```
//! use iotdm_client::protocol::{build_frame, Frame};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Bytes::from_static(b"hello"));
//! assert_eq!(frame.payload(), b"hello");
//!
//! let wire = build_frame(b"hello").unwrap();
//! assert_eq!(&wire[..], &[0, 5, b'h', b'e', b'l', b'l', b'o']);
//! ```

use bytes::Bytes;

use super::wire_format::{encode_length, LENGTH_FIELD_SIZE};
use crate::error::Result;

/// A complete inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from its payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Build a complete length-prefixed frame as a single byte vector.
pub fn build_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let prefix = encode_length(payload.len())?;
    let mut buf = Vec::with_capacity(LENGTH_FIELD_SIZE + payload.len());
    buf.extend_from_slice(&prefix);
    buf.extend_from_slice(payload);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(Bytes::from_static(b"hello"));

        assert_eq!(frame.payload(), b"hello");
        assert_eq!(frame.len(), 5);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_build_frame() {
        let bytes = build_frame(&[0xAA; 300]).unwrap();
        assert_eq!(bytes.len(), 302);
        assert_eq!(&bytes[..2], &[0x01, 0x2C]);
        assert!(bytes[2..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_build_empty_frame() {
        assert_eq!(build_frame(b"").unwrap(), vec![0, 0]);
    }
}
