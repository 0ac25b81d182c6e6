//! # iotdm-client
//!
//! Client core of an LWM2M device-management agent.
//!
//! A device exposes objects (Server, Device, Firmware, ...) whose resources
//! the DM server reads, writes and executes. This crate provides:
//!
//! - **Objects**: a registry mapping `(object, instance, resource)` to typed
//!   callbacks, with permission checks and CoAP status mapping
//! - **Session**: SAS-token authentication, registration, backoff reconnect
//! - **Framing**: 2-byte length-prefixed messages over any byte transport
//!
//! CoAP message encoding is left to a [`ProtocolEngine`] implementation.
//!
//! ## Example
//!
//! ```
//! use iotdm_client::codec::Value;
//! use iotdm_client::object::{ObjectDescriptor, ObjectInstance, ObjectRegistry};
//!
//! struct Device {
//!     battery: i64,
//! }
//!
//! impl ObjectInstance for Device {
//!     fn instance_id(&self) -> u16 {
//!         0
//!     }
//! }
//!
//! let mut registry = ObjectRegistry::new();
//! registry
//!     .register(
//!         ObjectDescriptor::new(3)
//!             .readable(9, |d: &Device| Ok(d.battery))
//!             .with_instance(Device { battery: 87 }),
//!     )
//!     .unwrap();
//!
//! assert_eq!(registry.read(3, 0, 9), Ok(Value::Integer(87)));
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod object;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod writer;

mod client;

pub use client::{Client, ClientBuilder, WakeHandle};
pub use config::ClientConfig;
pub use engine::{EngineEvent, ProtocolEngine};
pub use error::{CallbackError, CallbackResult, DmError};
pub use session::RegistrationStatus;
