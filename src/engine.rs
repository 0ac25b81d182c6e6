//! Seam to the CoAP/LWM2M protocol engine.
//!
//! The client owns framing, connection management and the object registry.
//! Message encoding, request routing, observe subscriptions and
//! retransmission belong to a [`ProtocolEngine`]. The engine never touches
//! the transport: it returns [`EngineEvent`]s and the client acts on them.

use std::time::{Duration, SystemTime};

use bytes::Bytes;

use crate::error::Result;
use crate::object::{ObjectRegistry, ResourcePath};
use crate::session::{RegistrationReply, RegistrationRequest};

/// Default time an engine waits on a confirmable notification.
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 60;

/// Action requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Send this CoAP message (the client adds the length prefix).
    Send(Bytes),
    /// The registration exchange finished. `None` means it timed out.
    RegistrationReply(Option<RegistrationReply>),
}

/// CoAP/LWM2M message engine driven by the client.
pub trait ProtocolEngine: Send {
    /// Encode the registration POST.
    fn encode_registration(&mut self, request: &RegistrationRequest) -> Result<Bytes>;

    /// Handle one inbound CoAP message.
    ///
    /// Server requests are answered by dispatching into `registry`
    /// (`read`, `write`, `execute`) and mapping the outcome to a response
    /// code.
    fn handle_message(&mut self, message: &[u8], registry: &mut ObjectRegistry)
        -> Vec<EngineEvent>;

    /// Periodic work: observe notifications, retransmissions and timeouts.
    ///
    /// A confirmable notification left unacknowledged for `notify_timeout`
    /// is abandoned.
    fn step(
        &mut self,
        now: SystemTime,
        notify_timeout: Duration,
        registry: &mut ObjectRegistry,
    ) -> Vec<EngineEvent>;

    /// Resources whose value may have changed since the last step.
    fn resource_changed(&mut self, paths: &[ResourcePath]);

    /// Drop in-flight exchanges after the connection was lost.
    fn reset(&mut self) {}
}
