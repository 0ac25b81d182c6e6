//! CoAP response codes produced by the dispatcher and consumed from
//! registration replies.
//!
//! CoAP packs a code as `class.detail` into one byte: `(class << 5) | detail`.
//! [`StatusCode::code`] gives the familiar three-digit form (`205`), while
//! [`StatusCode::to_byte`] gives the on-the-wire byte (`0x45`).

use crate::error::{CallbackError, DmError};

/// Response status for a resource operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 2.01 Created.
    Created,
    /// 2.04 Changed.
    Changed,
    /// 2.05 Content.
    Content,
    /// 4.00 Bad Request.
    BadRequest,
    /// 4.04 Not Found.
    NotFound,
    /// 4.05 Method Not Allowed.
    MethodNotAllowed,
    /// 5.00 Internal Server Error.
    InternalServerError,
    /// 5.01 Not Implemented.
    NotImplemented,
}

impl StatusCode {
    /// Three-digit decimal form (`class * 100 + detail`).
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Created => 201,
            StatusCode::Changed => 204,
            StatusCode::Content => 205,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
            StatusCode::NotImplemented => 501,
        }
    }

    /// Encode as the single CoAP code byte.
    pub fn to_byte(self) -> u8 {
        let code = self.code();
        let class = (code / 100) as u8;
        let detail = (code % 100) as u8;
        (class << 5) | detail
    }

    /// Decode a CoAP code byte. Returns `None` for codes this crate never uses.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let code = u16::from(byte >> 5) * 100 + u16::from(byte & 0x1F);
        Self::from_code(code)
    }

    /// Decode the three-digit form.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            201 => Some(StatusCode::Created),
            204 => Some(StatusCode::Changed),
            205 => Some(StatusCode::Content),
            400 => Some(StatusCode::BadRequest),
            404 => Some(StatusCode::NotFound),
            405 => Some(StatusCode::MethodNotAllowed),
            500 => Some(StatusCode::InternalServerError),
            501 => Some(StatusCode::NotImplemented),
            _ => None,
        }
    }

    /// True for 2.xx codes.
    pub fn is_success(self) -> bool {
        self.code() / 100 == 2
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.code();
        write!(f, "{}.{:02}", code / 100, code % 100)
    }
}

impl From<&CallbackError> for StatusCode {
    fn from(err: &CallbackError) -> Self {
        match err {
            CallbackError::NotImplemented => StatusCode::NotImplemented,
            CallbackError::InvalidArgument => StatusCode::BadRequest,
            CallbackError::Failed(_) => StatusCode::InternalServerError,
        }
    }
}

impl From<&DmError> for StatusCode {
    fn from(err: &DmError) -> Self {
        match err {
            DmError::NotFound => StatusCode::NotFound,
            DmError::MethodNotAllowed => StatusCode::MethodNotAllowed,
            DmError::InvalidArgument(_) => StatusCode::BadRequest,
            DmError::NotImplemented => StatusCode::NotImplemented,
            _ => StatusCode::InternalServerError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_bytes() {
        assert_eq!(StatusCode::Created.to_byte(), 0x41);
        assert_eq!(StatusCode::Changed.to_byte(), 0x44);
        assert_eq!(StatusCode::Content.to_byte(), 0x45);
        assert_eq!(StatusCode::BadRequest.to_byte(), 0x80);
        assert_eq!(StatusCode::NotFound.to_byte(), 0x84);
        assert_eq!(StatusCode::MethodNotAllowed.to_byte(), 0x85);
        assert_eq!(StatusCode::InternalServerError.to_byte(), 0xA0);
        assert_eq!(StatusCode::NotImplemented.to_byte(), 0xA1);
    }

    #[test]
    fn test_from_byte() {
        assert_eq!(StatusCode::from_byte(0x41), Some(StatusCode::Created));
        assert_eq!(StatusCode::from_byte(0xA1), Some(StatusCode::NotImplemented));
        // 4.01 Unauthorized is not part of the dispatcher's vocabulary
        assert_eq!(StatusCode::from_byte(0x81), None);
    }

    #[test]
    fn test_callback_error_mapping() {
        assert_eq!(
            StatusCode::from(&CallbackError::NotImplemented),
            StatusCode::NotImplemented
        );
        assert_eq!(
            StatusCode::from(&CallbackError::InvalidArgument),
            StatusCode::BadRequest
        );
        assert_eq!(
            StatusCode::from(&CallbackError::Failed("disk".into())),
            StatusCode::InternalServerError
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::Content.to_string(), "2.05");
        assert_eq!(StatusCode::NotFound.to_string(), "4.04");
    }

    #[test]
    fn test_is_success() {
        assert!(StatusCode::Created.is_success());
        assert!(StatusCode::Changed.is_success());
        assert!(!StatusCode::MethodNotAllowed.is_success());
    }
}
