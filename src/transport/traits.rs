//! Byte-stream transport seam.
//!
//! The session never touches sockets directly. Anything that can open a
//! connection and move bytes (plain TCP, a TLS stream, an in-memory mock)
//! plugs in through [`Transport`].

use async_trait::async_trait;

use crate::error::Result;

/// Connection-oriented byte transport.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection.
    ///
    /// # Errors
    /// Returns error if the peer is unreachable. The caller decides
    /// whether to retry.
    async fn open(&mut self) -> Result<()>;

    /// Send all of `data`.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever bytes are ready into `buf` without waiting for more.
    ///
    /// `Ok(0)` means nothing is pending right now. A closed or broken
    /// connection is reported as an error.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Close the connection. Closing an already closed transport is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;
}
