//! LWM2M registration handshake.
//!
//! The client advertises its objects in a CoRE Link-Format payload and
//! authenticates with a SAS token in the query:
//!
//! ```text
//! POST /rd?ep=<endpoint>&b=T&tk=<token>
//! Uri-Host: <host>
//! Content-Format: application/link-format
//!
//! </>;rt="oma.lwm2m",</1/0>,</3/0>
//! ```
//!
//! The server answers 2.01 Created with the registration location.

use std::time::SystemTime;

use bytes::Bytes;

use super::auth::{build_registration_query, TokenSigner};
use crate::error::Result;
use crate::object::{object_ids, ObjectRegistry};
use crate::protocol::StatusCode;

/// Registration resource path on the server.
pub const REGISTRATION_PATH: &str = "/rd";

/// CoAP Content-Format for `application/link-format`.
pub const LINK_FORMAT: u16 = 40;

/// Leading link of every registration payload.
pub const PAYLOAD_PREFIX: &str = "</>;rt=\"oma.lwm2m\",";

/// Registration state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationStatus {
    #[default]
    Idle,
    Pending,
    Registered,
    Failed,
}

/// Everything the protocol engine needs to encode the registration POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub path: &'static str,
    /// Query string including the leading `?`.
    pub query: String,
    pub uri_host: String,
    pub content_format: u16,
    /// Registration lifetime in seconds. The engine advertises it as `lt`.
    pub lifetime_secs: u64,
    pub payload: Bytes,
}

impl RegistrationRequest {
    /// Build the request for the objects currently in `registry`.
    pub fn new(
        endpoint_name: &str,
        host_name: &str,
        device_key: &str,
        lifetime_secs: u64,
        registry: &ObjectRegistry,
        signer: &dyn TokenSigner,
    ) -> Result<Self> {
        let payload = build_registration_payload(registry);
        let query = build_registration_query(endpoint_name, host_name, device_key, signer)?;

        Ok(Self {
            path: REGISTRATION_PATH,
            query,
            uri_host: host_name.to_string(),
            content_format: LINK_FORMAT,
            lifetime_secs,
            payload: Bytes::from(payload),
        })
    }
}

/// The server's answer to the registration POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReply {
    /// CoAP code byte, `(class << 5) | detail`.
    pub code: u8,
    /// Location-Path options joined with `/`, if present.
    pub location_path: Option<String>,
}

impl RegistrationReply {
    pub fn new(code: u8, location_path: Option<String>) -> Self {
        Self {
            code,
            location_path,
        }
    }

    /// A 2.01 Created reply.
    pub fn created(location_path: impl Into<String>) -> Self {
        Self::new(StatusCode::Created.to_byte(), Some(location_path.into()))
    }

    pub fn is_created(&self) -> bool {
        self.code == StatusCode::Created.to_byte()
    }
}

/// Build the CoRE Link-Format payload advertising every registered object.
///
/// The security object is never advertised. Each object is listed with
/// instance 0 and the trailing separator is trimmed.
pub fn build_registration_payload(registry: &ObjectRegistry) -> String {
    let mut payload = String::from(PAYLOAD_PREFIX);

    registry.for_each_object(|object_id| {
        if object_id != object_ids::SECURITY {
            payload.push_str(&format!("</{}/{}>,", object_id, 0));
        }
        true
    });

    if payload.ends_with(',') {
        payload.pop();
    }
    payload
}

/// Registration state machine: `Idle -> Pending -> Registered | Failed`.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    status: RegistrationStatus,
    location: Option<String>,
    last_attempt: Option<SystemTime>,
    registered_at: Option<SystemTime>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    /// Location path assigned by the server.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// When the last registration request was about to be sent.
    pub fn last_attempt(&self) -> Option<SystemTime> {
        self.last_attempt
    }

    /// When the last reply was processed.
    pub fn registered_at(&self) -> Option<SystemTime> {
        self.registered_at
    }

    /// Record that a request was sent; `started` is the pre-send time.
    pub fn mark_pending(&mut self, started: SystemTime) {
        self.last_attempt = Some(started);
        self.status = RegistrationStatus::Pending;
        tracing::info!("Registration request sent, pending reply");
    }

    /// Process the server's reply.
    ///
    /// Only a pending registration reacts. A missing reply (timeout) or any
    /// code other than 2.01 fails the registration. A 2.01 without a
    /// location still succeeds.
    pub fn on_reply(&mut self, reply: Option<&RegistrationReply>) -> RegistrationStatus {
        if self.status != RegistrationStatus::Pending {
            tracing::debug!("Ignoring registration reply in state {:?}", self.status);
            return self.status;
        }

        self.registered_at = Some(SystemTime::now());

        match reply {
            Some(reply) if reply.is_created() => {
                self.status = RegistrationStatus::Registered;
                self.location = reply.location_path.clone();
                tracing::info!(
                    "Registered ({})",
                    self.location.as_deref().unwrap_or("")
                );
            }
            Some(reply) => {
                self.status = RegistrationStatus::Failed;
                tracing::error!("Registration failed, code 0x{:02X}", reply.code);
            }
            None => {
                self.status = RegistrationStatus::Failed;
                tracing::error!("Registration failed, no reply");
            }
        }

        self.status
    }

    /// Mark the session failed, e.g. after the connect budget ran out.
    pub fn fail(&mut self) {
        self.status = RegistrationStatus::Failed;
    }

    /// Forget the session state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::object::{ObjectDescriptor, ObjectInstance};

    struct Nothing;

    impl ObjectInstance for Nothing {
        fn instance_id(&self) -> u16 {
            0
        }
    }

    struct FixedSigner;

    impl TokenSigner for FixedSigner {
        fn create_token(&self, _resource_uri: &str, _device_key: &str) -> Result<String> {
            Ok("token".to_string())
        }
    }

    fn registry_with(ids: &[u16]) -> ObjectRegistry {
        let mut registry = ObjectRegistry::new();
        for &id in ids {
            registry
                .register(ObjectDescriptor::<Nothing>::new(id).with_instance(Nothing))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_payload_lists_objects() {
        let registry = registry_with(&[1, 3, 5]);
        assert_eq!(
            build_registration_payload(&registry),
            "</>;rt=\"oma.lwm2m\",</1/0>,</3/0>,</5/0>"
        );
    }

    #[test]
    fn test_payload_skips_security() {
        let registry = registry_with(&[0, 1, 3]);
        assert_eq!(
            build_registration_payload(&registry),
            "</>;rt=\"oma.lwm2m\",</1/0>,</3/0>"
        );
    }

    #[test]
    fn test_payload_without_objects() {
        let registry = registry_with(&[0]);
        assert_eq!(build_registration_payload(&registry), "</>;rt=\"oma.lwm2m\"");
    }

    #[test]
    fn test_request() {
        let registry = registry_with(&[1, 3]);
        let request = RegistrationRequest::new(
            "endpoint",
            "myhub.azure-devices.net",
            "key",
            300,
            &registry,
            &FixedSigner,
        )
        .unwrap();

        assert_eq!(request.path, "/rd");
        assert_eq!(request.query, "?ep=endpoint&b=T&tk=token");
        assert_eq!(request.uri_host, "myhub.azure-devices.net");
        assert_eq!(request.content_format, LINK_FORMAT);
        assert_eq!(request.lifetime_secs, 300);
        assert_eq!(&request.payload[..], b"</>;rt=\"oma.lwm2m\",</1/0>,</3/0>");
    }

    #[test]
    fn test_registered_on_created() {
        let mut registration = Registration::new();
        assert_eq!(registration.status(), RegistrationStatus::Idle);

        let started = SystemTime::now();
        registration.mark_pending(started);
        assert_eq!(registration.status(), RegistrationStatus::Pending);
        assert_eq!(registration.last_attempt(), Some(started));

        let status = registration.on_reply(Some(&RegistrationReply::created("rd/5a3f")));
        assert_eq!(status, RegistrationStatus::Registered);
        assert_eq!(registration.location(), Some("rd/5a3f"));
        assert!(registration.registered_at().is_some());
    }

    #[test]
    fn test_registered_without_location() {
        let mut registration = Registration::new();
        registration.mark_pending(SystemTime::now());

        let reply = RegistrationReply::new(StatusCode::Created.to_byte(), None);
        assert_eq!(
            registration.on_reply(Some(&reply)),
            RegistrationStatus::Registered
        );
        assert_eq!(registration.location(), None);
    }

    #[test]
    fn test_failed_on_missing_reply() {
        let mut registration = Registration::new();
        registration.mark_pending(SystemTime::now());

        assert_eq!(registration.on_reply(None), RegistrationStatus::Failed);
    }

    #[test]
    fn test_failed_on_unexpected_code() {
        let mut registration = Registration::new();
        registration.mark_pending(SystemTime::now());

        // 4.01 Unauthorized
        let reply = RegistrationReply::new(0x81, None);
        assert_eq!(registration.on_reply(Some(&reply)), RegistrationStatus::Failed);
    }

    #[test]
    fn test_reply_ignored_unless_pending() {
        let mut registration = Registration::new();
        assert_eq!(
            registration.on_reply(Some(&RegistrationReply::created("rd/1"))),
            RegistrationStatus::Idle
        );

        registration.mark_pending(SystemTime::now());
        registration.on_reply(None);
        assert_eq!(
            registration.on_reply(Some(&RegistrationReply::created("rd/1"))),
            RegistrationStatus::Failed
        );
    }

    #[test]
    fn test_reset() {
        let mut registration = Registration::new();
        registration.mark_pending(SystemTime::now());
        registration.on_reply(Some(&RegistrationReply::created("rd/1")));

        registration.reset();
        assert_eq!(registration.status(), RegistrationStatus::Idle);
        assert_eq!(registration.location(), None);
    }
}
