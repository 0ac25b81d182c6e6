//! Wire values exchanged with the protocol engine.
//!
//! A [`Value`] is the decoded form of one resource's TLV record. The engine
//! hands the dispatcher whatever the server sent, which may be a typed TLV
//! value or plain text; marshalers decide how strictly to interpret it.

use bytes::Bytes;

/// Declared type of a resource, stored next to its permission bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    /// No such property.
    #[default]
    Undefined,
    String,
    Integer,
    Float,
    Boolean,
    Opaque,
    /// Seconds since the Unix epoch, carried as an integer.
    Time,
}

/// A single resource value in wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Text. Also how plain-text payloads of any declared type arrive.
    String(Bytes),
    /// Raw bytes. TLV-encoded numbers arrive this way too.
    Opaque(Bytes),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Value {
    /// Build a string value from text.
    pub fn text(s: impl Into<String>) -> Self {
        Value::String(Bytes::from(s.into()))
    }

    /// Build an opaque value from bytes.
    pub fn opaque(bytes: impl Into<Bytes>) -> Self {
        Value::Opaque(bytes.into())
    }

    /// The wire type tag of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Opaque(_) => DataType::Opaque,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Boolean(_) => DataType::Boolean,
        }
    }

    /// Raw bytes for string and opaque values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(b) | Value::Opaque(b) => Some(b),
            _ => None,
        }
    }

    /// Text content, if this is a string holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}
