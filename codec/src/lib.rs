//! Binary codec for [`TaggedValue`].
//!
//! An envelope is an 8-byte little-endian header (magic `0x010E`, version,
//! type tag, content size) followed by the content bytes. Nested values carry
//! a one-byte tag, never a nested header. `Null` and `Ptr` have no wire form.
//!
//! The free functions use [`CodecLimits::default`]; build a [`Codec`] to apply
//! other limits.

mod decode;
mod encode;
mod error;
mod header;
mod limits;

use hostbridge_types::TaggedValue;
use tracing::trace;

pub use error::CodecError;
pub use header::{HEADER_LEN, Header, MAGIC, VERSION, WireTag};
pub use limits::{CodecLimits, DEFAULT_MAX_CONTENT_BYTES, DEFAULT_MAX_DEPTH};

/// Encoder/decoder bound to a set of [`CodecLimits`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    limits: CodecLimits,
}

impl Codec {
    #[must_use]
    pub const fn new(limits: CodecLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> CodecLimits {
        self.limits
    }

    /// Encode `value` into a single exactly-sized buffer.
    pub fn serialize(&self, value: &TaggedValue) -> Result<Vec<u8>, CodecError> {
        encode::encode(value, &self.limits)
    }

    /// Envelope size `serialize` would produce, without allocating.
    pub fn serialized_size(&self, value: &TaggedValue) -> Result<usize, CodecError> {
        Ok(HEADER_LEN + encode::checked_content_size(value, &self.limits)?)
    }

    /// Decode one envelope from the front of `bytes`.
    ///
    /// Returns the value and the number of bytes it occupied; anything after
    /// that is left for the caller.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<(TaggedValue, usize), CodecError> {
        decode::decode(bytes, &self.limits).inspect_err(|err| {
            trace!(len = bytes.len(), %err, "rejected envelope");
        })
    }

    /// Decode a buffer that must hold exactly one envelope.
    pub fn deserialize_exact(&self, bytes: &[u8]) -> Result<TaggedValue, CodecError> {
        let (value, consumed) = self.deserialize(bytes)?;
        if consumed != bytes.len() {
            return Err(CodecError::TrailingBytes(bytes.len() - consumed));
        }
        Ok(value)
    }

    /// Decode back-to-back envelopes until `bytes` is exhausted.
    pub fn deserialize_all(&self, mut bytes: &[u8]) -> Result<Vec<TaggedValue>, CodecError> {
        let mut values = Vec::new();
        while !bytes.is_empty() {
            let (value, consumed) = self.deserialize(bytes)?;
            values.push(value);
            bytes = &bytes[consumed..];
        }
        Ok(values)
    }
}

pub fn serialize(value: &TaggedValue) -> Result<Vec<u8>, CodecError> {
    Codec::default().serialize(value)
}

pub fn serialized_size(value: &TaggedValue) -> Result<usize, CodecError> {
    Codec::default().serialized_size(value)
}

pub fn deserialize(bytes: &[u8]) -> Result<(TaggedValue, usize), CodecError> {
    Codec::default().deserialize(bytes)
}

pub fn deserialize_exact(bytes: &[u8]) -> Result<TaggedValue, CodecError> {
    Codec::default().deserialize_exact(bytes)
}

pub fn deserialize_all(bytes: &[u8]) -> Result<Vec<TaggedValue>, CodecError> {
    Codec::default().deserialize_all(bytes)
}
