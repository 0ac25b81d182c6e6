//! Codec module - typed resource values.
//!
//! This module provides the conversion layer between user callbacks and the
//! protocol engine:
//!
//! - [`Value`] - one resource value as carried on the wire
//! - [`DataType`] - the declared type of a resource
//! - [`Marshal`] - typed conversion, implemented for `String`, `i64`, `f64`,
//!   `bool`, [`Time`] and [`Opaque`]
//!
//! # Example
//!
//! ```
//! use iotdm_client::codec::{Marshal, Time, Value};
//!
//! let value = Time(1311379200).into_value();
//! assert_eq!(value, Value::Integer(1311379200));
//!
//! let parsed = i64::from_value(&Value::text("42")).unwrap();
//! assert_eq!(parsed, 42);
//! ```

mod marshal;
mod value;

pub use marshal::{Marshal, Opaque, Time};
pub use value::{DataType, Value};
