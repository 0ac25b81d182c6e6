//! Object module - LWM2M objects and resource dispatch.
//!
//! Provides:
//! - [`ObjectDescriptor`] - declarative builder for one object type
//! - [`ObjectRegistry`] - maps object ids to descriptors, owned by the client
//! - [`ObjectTable`] - keyed container for object instances
//! - read / write / execute dispatch with CoAP status mapping
//!
//! # Example
//!
//! ```
//! use iotdm_client::codec::Value;
//! use iotdm_client::object::{ObjectDescriptor, ObjectInstance, ObjectRegistry};
//! use iotdm_client::protocol::StatusCode;
//!
//! struct Temperature {
//!     id: u16,
//!     celsius: f64,
//! }
//!
//! impl ObjectInstance for Temperature {
//!     fn instance_id(&self) -> u16 {
//!         self.id
//!     }
//! }
//!
//! let mut registry = ObjectRegistry::new();
//! registry
//!     .register(
//!         ObjectDescriptor::new(3303)
//!             .readable(5700, |t: &Temperature| Ok(t.celsius))
//!             .with_instance(Temperature { id: 0, celsius: 21.5 }),
//!     )
//!     .unwrap();
//!
//! assert_eq!(registry.read(3303, 0, 5700), Ok(Value::Float(21.5)));
//! assert_eq!(registry.read(3303, 0, 5701), Err(StatusCode::NotFound));
//! ```

mod descriptor;
mod dispatch;
mod registry;
mod table;

pub use descriptor::{
    ops, AllowedOperation, ObjectDescriptor, ObjectDispatcher, Operation, ResourcePath,
};
pub use dispatch::{BulkResult, DispatchResult};
pub use registry::{object_ids, ObjectRegistry};
pub use table::{ObjectInstance, ObjectTable};
