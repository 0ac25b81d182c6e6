//! Transport module - the byte pipe under the DM session.
//!
//! Provides:
//! - [`Transport`]: the seam the session drives
//! - [`StreamTransport`]: adapter over tokio streams (TCP or caller-provided TLS)
//! - [`MockTransport`]: in-memory transport for tests

mod mock;
mod stream;
mod traits;

pub use mock::MockTransport;
pub use stream::{Connector, StreamTransport, TcpConnector, DEFAULT_READ_TIMEOUT};
pub use traits::Transport;
