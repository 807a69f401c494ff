use hostbridge_types::ValueKind;
use thiserror::Error;

/// Encode and decode failures. A failed decode never yields a partial value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("{0} values cannot be serialized")]
    UnsupportedType(ValueKind),
    #[error("invalid magic 0x{0:04X}")]
    InvalidMagic(u16),
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),
    #[error("invalid type tag {0}")]
    InvalidType(u8),
    #[error("declared content size {declared} exceeds the {available} bytes after the header")]
    SizeMismatch { declared: usize, available: usize },
    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("content size mismatch: declared {declared}, consumed {consumed}")]
    ContentSizeMismatch { declared: usize, consumed: usize },
    #[error("nesting exceeds the depth limit of {limit}")]
    DepthExceeded { limit: usize },
    #[error("{size} bytes exceeds the limit of {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("invalid UTF-8 in text at content offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("invalid bool byte {0}")]
    InvalidBool(u8),
    #[error("duplicate object key {0:?}")]
    DuplicateKey(String),
    #[error("{0} trailing bytes after the envelope")]
    TrailingBytes(usize),
}
