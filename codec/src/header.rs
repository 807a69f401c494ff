//! Envelope header and wire tags.

use hostbridge_types::{TaggedValue, ValueKind};

use crate::error::CodecError;

pub const MAGIC: u16 = 0x010E;
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 8;

/// Type tag byte. `0` is reserved as invalid and `16` (ptr) is never emitted
/// or accepted, so neither has a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireTag {
    Bool = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    UInt8 = 6,
    UInt16 = 7,
    UInt32 = 8,
    UInt64 = 9,
    Float32 = 10,
    Float64 = 11,
    String = 12,
    Bytes = 13,
    Array = 14,
    Object = 15,
    JsonString = 17,
}

impl WireTag {
    pub fn from_byte(byte: u8) -> Result<Self, CodecError> {
        Ok(match byte {
            1 => Self::Bool,
            2 => Self::Int8,
            3 => Self::Int16,
            4 => Self::Int32,
            5 => Self::Int64,
            6 => Self::UInt8,
            7 => Self::UInt16,
            8 => Self::UInt32,
            9 => Self::UInt64,
            10 => Self::Float32,
            11 => Self::Float64,
            12 => Self::String,
            13 => Self::Bytes,
            14 => Self::Array,
            15 => Self::Object,
            17 => Self::JsonString,
            other => return Err(CodecError::InvalidType(other)),
        })
    }

    pub fn for_value(value: &TaggedValue) -> Result<Self, CodecError> {
        Ok(match value {
            TaggedValue::Bool(_) => Self::Bool,
            TaggedValue::Int8(_) => Self::Int8,
            TaggedValue::Int16(_) => Self::Int16,
            TaggedValue::Int32(_) => Self::Int32,
            TaggedValue::Int64(_) => Self::Int64,
            TaggedValue::UInt8(_) => Self::UInt8,
            TaggedValue::UInt16(_) => Self::UInt16,
            TaggedValue::UInt32(_) => Self::UInt32,
            TaggedValue::UInt64(_) => Self::UInt64,
            TaggedValue::Float32(_) => Self::Float32,
            TaggedValue::Float64(_) => Self::Float64,
            TaggedValue::String(_) => Self::String,
            TaggedValue::Bytes(_) => Self::Bytes,
            TaggedValue::Array(_) => Self::Array,
            TaggedValue::Object(_) => Self::Object,
            TaggedValue::JsonString(_) => Self::JsonString,
            TaggedValue::Null | TaggedValue::Ptr(_) => {
                return Err(CodecError::UnsupportedType(value.kind()));
            }
        })
    }

    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn kind(self) -> ValueKind {
        match self {
            Self::Bool => ValueKind::Bool,
            Self::Int8 => ValueKind::Int8,
            Self::Int16 => ValueKind::Int16,
            Self::Int32 => ValueKind::Int32,
            Self::Int64 => ValueKind::Int64,
            Self::UInt8 => ValueKind::UInt8,
            Self::UInt16 => ValueKind::UInt16,
            Self::UInt32 => ValueKind::UInt32,
            Self::UInt64 => ValueKind::UInt64,
            Self::Float32 => ValueKind::Float32,
            Self::Float64 => ValueKind::Float64,
            Self::String => ValueKind::String,
            Self::Bytes => ValueKind::Bytes,
            Self::Array => ValueKind::Array,
            Self::Object => ValueKind::Object,
            Self::JsonString => ValueKind::JsonString,
        }
    }
}

/// The fixed 8-byte prefix of every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub tag: WireTag,
    pub content_size: u32,
}

impl Header {
    /// Validate and read the header at the start of `bytes`.
    ///
    /// Checks run in wire order: length, magic, version, tag. The declared
    /// size is checked against the buffer by the caller, which also knows the
    /// configured limits.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN,
                available: bytes.len(),
            });
        }
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        if magic != MAGIC {
            return Err(CodecError::InvalidMagic(magic));
        }
        if bytes[2] != VERSION {
            return Err(CodecError::UnsupportedVersion(bytes[2]));
        }
        let tag = WireTag::from_byte(bytes[3])?;
        let content_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self { tag, content_size })
    }

    pub fn write(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.push(VERSION);
        out.push(self.tag.as_byte());
        out.extend_from_slice(&self.content_size.to_le_bytes());
    }
}
