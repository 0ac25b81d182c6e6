//! [`Transport`] over any tokio byte stream.
//!
//! A [`Connector`] produces the stream (plain TCP via [`TcpConnector`], or a
//! caller-supplied TLS connector) and [`StreamTransport`] adapts it to the
//! poll-style `recv` the session expects: each call waits at most
//! `read_timeout` for data and reports `Ok(0)` when none arrived.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::traits::Transport;
use crate::error::{DmError, Result};

/// Default wait for inbound data per `recv` call.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Produces a connected byte stream.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self) -> std::io::Result<Self::Stream>;
}

/// Plain TCP connector.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = tokio::net::TcpStream;

    async fn connect(&self) -> std::io::Result<Self::Stream> {
        let stream = tokio::net::TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Transport over a stream produced by a [`Connector`].
pub struct StreamTransport<C: Connector> {
    connector: C,
    stream: Option<C::Stream>,
    read_timeout: Duration,
}

impl<C: Connector> StreamTransport<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            stream: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set how long `recv` waits for data.
    ///
    /// Default: 10 milliseconds
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

#[async_trait]
impl<C: Connector> Transport for StreamTransport<C> {
    async fn open(&mut self) -> Result<()> {
        let stream = self.connector.connect().await?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(DmError::ConnectionClosed)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(DmError::ConnectionClosed)?;
        if buf.is_empty() {
            return Ok(0);
        }

        match tokio::time::timeout(self.read_timeout, stream.read(buf)).await {
            Err(_elapsed) => Ok(0),
            Ok(Ok(0)) => Err(DmError::ConnectionClosed),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(DmError::Io(e)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("Stream shutdown failed: {}", e);
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
