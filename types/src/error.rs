//! Errors that cross the boundary as data.
//!
//! The native runtime reports failures as a numeric code plus a message. The
//! bridge hands them to host handlers unchanged; they are never thrown.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric error codes shared with the native runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i64)]
pub enum ErrorCode {
    Generic = 1,
    InvalidJson = 2,
    InvalidArgument = 3,
    InvalidType = 4,
    Timeout = 5,
    Closed = 6,
}

impl ErrorCode {
    /// Map a raw native code. Codes this side does not know collapse to
    /// [`ErrorCode::Generic`] so a newer native runtime cannot break decoding.
    #[must_use]
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            2 => Self::InvalidJson,
            3 => Self::InvalidArgument,
            4 => Self::InvalidType,
            5 => Self::Timeout,
            6 => Self::Closed,
            _ => Self::Generic,
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> i64 {
        self as i64
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::InvalidJson => "invalid_json",
            Self::InvalidArgument => "invalid_argument",
            Self::InvalidType => "invalid_type",
            Self::Timeout => "timeout",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by (or on behalf of) the native side.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct NativeError {
    code: ErrorCode,
    message: String,
}

impl NativeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Generic, message)
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
