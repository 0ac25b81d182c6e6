//! In-memory transport for tests.
//!
//! `MockTransport` is a cheap handle over shared state: clone it before
//! handing it to a client and keep the clone to inject inbound bytes, force
//! failures and inspect what was sent.
//!
//! ```
//! use iotdm_client::transport::{MockTransport, Transport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> iotdm_client::error::Result<()> {
//! let mut transport = MockTransport::new();
//! let handle = transport.clone();
//!
//! transport.open().await?;
//! transport.send(b"hello").await?;
//!
//! assert_eq!(handle.take_sent(), vec![b"hello".to_vec()]);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::Transport;
use crate::error::{DmError, Result};

/// Maximum number of inbound chunks to queue.
const MAX_QUEUE_SIZE: usize = 1000;

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    /// Chunks waiting to be returned by `recv`.
    inbound: VecDeque<Vec<u8>>,
    /// One entry per `send` call.
    sent: Vec<Vec<u8>>,
    open_count: u32,
    close_count: u32,
    failing_opens: u32,
    failing_sends: u32,
    failing_recvs: u32,
}

/// Scriptable transport backed by in-memory queues.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a chunk to be returned by a later `recv`.
    ///
    /// # Panics
    /// Panics if the queue is full.
    pub fn inject(&self, chunk: impl Into<Vec<u8>>) {
        let mut state = self.state.lock();
        if state.inbound.len() >= MAX_QUEUE_SIZE {
            panic!("Mock transport inbound queue overflow");
        }
        state.inbound.push_back(chunk.into());
    }

    /// Make the next `count` calls to `open` fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.state.lock().failing_opens = count;
    }

    /// Make the next `count` calls to `send` fail.
    pub fn fail_next_sends(&self, count: u32) {
        self.state.lock().failing_sends = count;
    }

    /// Make the next `count` calls to `recv` report a broken connection.
    pub fn fail_next_recvs(&self, count: u32) {
        self.state.lock().failing_recvs = count;
    }

    /// Drain everything sent so far, one entry per `send` call.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state.lock().sent)
    }

    /// Drain everything sent so far as one contiguous byte string.
    pub fn take_sent_bytes(&self) -> Vec<u8> {
        self.take_sent().concat()
    }

    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    pub fn close_count(&self) -> u32 {
        self.state.lock().close_count
    }

    pub fn pending_inbound(&self) -> usize {
        self.state.lock().inbound.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.open_count += 1;
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(DmError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock open failure",
            )));
        }
        state.open = true;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(DmError::ConnectionClosed);
        }
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(DmError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock send failure",
            )));
        }
        state.sent.push(data.to_vec());
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(DmError::ConnectionClosed);
        }
        if state.failing_recvs > 0 {
            state.failing_recvs -= 1;
            return Err(DmError::ConnectionClosed);
        }

        let Some(mut chunk) = state.inbound.pop_front() else {
            return Ok(0);
        };

        let len = chunk.len().min(buf.len());
        buf[..len].copy_from_slice(&chunk[..len]);
        if len < chunk.len() {
            state.inbound.push_front(chunk.split_off(len));
        }
        Ok(len)
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.close_count += 1;
        state.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }
}
