//! Typed marshaling between native resource values and [`Value`].
//!
//! Each resource type implements [`Marshal`]. On read the dispatcher calls the
//! user getter and tags the result with `into_value`; on write it calls
//! `from_value` first and only invokes the setter if parsing succeeded.
//!
//! | Native type | `DataType` | Accepted on write |
//! |-------------|------------|-------------------|
//! | `String`    | String     | text or opaque holding UTF-8 |
//! | `i64`       | Integer    | integer, decimal text, 1/2/4/8-byte big-endian TLV |
//! | [`Time`]    | Time       | same as `i64` |
//! | `f64`       | Float      | float, integer, decimal text, 4/8-byte TLV |
//! | `bool`      | Boolean    | boolean, `"true"`/`"false"`/`"1"`/`"0"`, 1-byte TLV 0/1 |
//! | [`Opaque`]  | Opaque     | opaque or text bytes |

use bytes::Bytes;

use super::{DataType, Value};
use crate::error::{CallbackError, CallbackResult};

/// Conversion between a native resource type and its wire value.
pub trait Marshal: Sized {
    /// Type tag recorded in the property's permission entry.
    const DATA_TYPE: DataType;

    /// Tag a native value for the wire.
    fn into_value(self) -> Value;

    /// Parse a wire value. Fails with `InvalidArgument` on a type mismatch
    /// or unparsable content.
    fn from_value(value: &Value) -> CallbackResult<Self>;
}

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub i64);

/// Raw bytes, distinguished from text only by the type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Opaque(pub Bytes);

impl Opaque {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Opaque {
    fn from(bytes: Vec<u8>) -> Self {
        Opaque(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Opaque {
    fn from(bytes: &'static [u8]) -> Self {
        Opaque(Bytes::from_static(bytes))
    }
}

fn text(bytes: &[u8]) -> CallbackResult<&str> {
    std::str::from_utf8(bytes)
        .map(str::trim)
        .map_err(|_| CallbackError::InvalidArgument)
}

fn parse_tlv_integer(bytes: &[u8]) -> CallbackResult<i64> {
    match bytes.len() {
        1 => Ok(i64::from(bytes[0] as i8)),
        2 => Ok(i64::from(i16::from_be_bytes([bytes[0], bytes[1]]))),
        4 => Ok(i64::from(i32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]))),
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Ok(i64::from_be_bytes(raw))
        }
        _ => Err(CallbackError::InvalidArgument),
    }
}

fn parse_tlv_float(bytes: &[u8]) -> CallbackResult<f64> {
    match bytes.len() {
        4 => Ok(f64::from(f32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ]))),
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Ok(f64::from_be_bytes(raw))
        }
        _ => Err(CallbackError::InvalidArgument),
    }
}

impl Marshal for String {
    const DATA_TYPE: DataType = DataType::String;

    fn into_value(self) -> Value {
        Value::String(Bytes::from(self))
    }

    fn from_value(value: &Value) -> CallbackResult<Self> {
        match value {
            Value::String(b) | Value::Opaque(b) => String::from_utf8(b.to_vec())
                .map_err(|_| CallbackError::InvalidArgument),
            _ => Err(CallbackError::InvalidArgument),
        }
    }
}

impl Marshal for i64 {
    const DATA_TYPE: DataType = DataType::Integer;

    fn into_value(self) -> Value {
        Value::Integer(self)
    }

    fn from_value(value: &Value) -> CallbackResult<Self> {
        match value {
            Value::Integer(v) => Ok(*v),
            Value::String(b) => text(b)?
                .parse::<i64>()
                .map_err(|_| CallbackError::InvalidArgument),
            Value::Opaque(b) => parse_tlv_integer(b),
            Value::Float(_) | Value::Boolean(_) => Err(CallbackError::InvalidArgument),
        }
    }
}

impl Marshal for Time {
    const DATA_TYPE: DataType = DataType::Time;

    fn into_value(self) -> Value {
        Value::Integer(self.0)
    }

    fn from_value(value: &Value) -> CallbackResult<Self> {
        i64::from_value(value).map(Time)
    }
}

impl Marshal for f64 {
    const DATA_TYPE: DataType = DataType::Float;

    fn into_value(self) -> Value {
        Value::Float(self)
    }

    fn from_value(value: &Value) -> CallbackResult<Self> {
        let parsed = match value {
            Value::Float(v) => *v,
            Value::Integer(v) => *v as f64,
            Value::String(b) => text(b)?
                .parse::<f64>()
                .map_err(|_| CallbackError::InvalidArgument)?,
            Value::Opaque(b) => parse_tlv_float(b)?,
            Value::Boolean(_) => return Err(CallbackError::InvalidArgument),
        };
        // NaN and infinities never reach a resource callback.
        if parsed.is_finite() {
            Ok(parsed)
        } else {
            Err(CallbackError::InvalidArgument)
        }
    }
}

impl Marshal for bool {
    const DATA_TYPE: DataType = DataType::Boolean;

    fn into_value(self) -> Value {
        Value::Boolean(self)
    }

    fn from_value(value: &Value) -> CallbackResult<Self> {
        match value {
            Value::Boolean(v) => Ok(*v),
            Value::String(b) => match &b[..] {
                b"true" | b"1" => Ok(true),
                b"false" | b"0" => Ok(false),
                _ => Err(CallbackError::InvalidArgument),
            },
            Value::Opaque(b) => match &b[..] {
                [1] => Ok(true),
                [0] => Ok(false),
                _ => Err(CallbackError::InvalidArgument),
            },
            Value::Integer(_) | Value::Float(_) => Err(CallbackError::InvalidArgument),
        }
    }
}

impl Marshal for Opaque {
    const DATA_TYPE: DataType = DataType::Opaque;

    fn into_value(self) -> Value {
        Value::Opaque(self.0)
    }

    fn from_value(value: &Value) -> CallbackResult<Self> {
        match value {
            Value::Opaque(b) | Value::String(b) => Ok(Opaque(b.clone())),
            _ => Err(CallbackError::InvalidArgument),
        }
    }
}
