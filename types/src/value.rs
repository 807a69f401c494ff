//! The tagged value exchanged across the host/native boundary.
//!
//! [`TaggedValue`] is a closed sum type. The active variant fully determines the
//! payload, and every accessor checks the variant before handing the payload
//! out; nothing coerces between kinds (an `Int32` is never readable as `Int64`).

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// The kind of a [`TaggedValue`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    Array,
    Object,
    Ptr,
    JsonString,
}

impl ValueKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Array => "array",
            Self::Object => "object",
            Self::Ptr => "ptr",
            Self::JsonString => "json_string",
        }
    }

    /// Scalars have a fixed-width payload and no children.
    #[must_use]
    pub const fn is_scalar(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
                | Self::Float32
                | Self::Float64
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accessor invoked against a value of a different kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("type mismatch: expected {expected}, found {actual}")]
pub struct TypeMismatch {
    pub expected: ValueKind,
    pub actual: ValueKind,
}

/// Opaque native address. Only meaningful inside this process; it has no wire
/// representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativePtr(usize);

impl NativePtr {
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }
}

/// Structured data moved across the boundary.
///
/// Equality is structural. Floats compare by bit pattern, so a NaN equals a
/// NaN with the same payload and `0.0` differs from `-0.0`; this keeps
/// round-trip comparisons exact and makes the type `Eq`.
#[derive(Debug, Clone)]
pub enum TaggedValue {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<TaggedValue>),
    Object(BTreeMap<String, TaggedValue>),
    Ptr(NativePtr),
    /// Text expected (not verified) to hold a JSON document.
    JsonString(String),
}

macro_rules! copy_accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&self) -> Result<$ty, TypeMismatch> {
            match self {
                Self::$variant(v) => Ok(*v),
                other => Err(other.mismatch(ValueKind::$variant)),
            }
        }
    };
}

impl TaggedValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn json_string(value: impl Into<String>) -> Self {
        Self::JsonString(value.into())
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(value.into())
    }

    pub fn array(items: impl IntoIterator<Item = TaggedValue>) -> Self {
        Self::Array(items.into_iter().collect())
    }

    /// Build an object; a repeated key keeps the last value.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, TaggedValue)>) -> Self {
        Self::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    #[must_use]
    pub const fn ptr(addr: usize) -> Self {
        Self::Ptr(NativePtr::from_addr(addr))
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::UInt8(_) => ValueKind::UInt8,
            Self::UInt16(_) => ValueKind::UInt16,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::UInt64(_) => ValueKind::UInt64,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Array(_) => ValueKind::Array,
            Self::Object(_) => ValueKind::Object,
            Self::Ptr(_) => ValueKind::Ptr,
            Self::JsonString(_) => ValueKind::JsonString,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn mismatch(&self, expected: ValueKind) -> TypeMismatch {
        TypeMismatch {
            expected,
            actual: self.kind(),
        }
    }

    copy_accessor!(as_bool, Bool, bool);
    copy_accessor!(as_i8, Int8, i8);
    copy_accessor!(as_i16, Int16, i16);
    copy_accessor!(as_i32, Int32, i32);
    copy_accessor!(as_i64, Int64, i64);
    copy_accessor!(as_u8, UInt8, u8);
    copy_accessor!(as_u16, UInt16, u16);
    copy_accessor!(as_u32, UInt32, u32);
    copy_accessor!(as_u64, UInt64, u64);
    copy_accessor!(as_f32, Float32, f32);
    copy_accessor!(as_f64, Float64, f64);
    copy_accessor!(
        /// The native address of a `Ptr` value.
        as_ptr,
        Ptr,
        NativePtr
    );

    /// Text of a `String` value. A `JsonString` is rejected; use
    /// [`TaggedValue::as_json_str`].
    pub fn as_str(&self) -> Result<&str, TypeMismatch> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::String)),
        }
    }

    pub fn as_json_str(&self) -> Result<&str, TypeMismatch> {
        match self {
            Self::JsonString(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::JsonString)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], TypeMismatch> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(other.mismatch(ValueKind::Bytes)),
        }
    }

    pub fn as_array(&self) -> Result<&[TaggedValue], TypeMismatch> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(other.mismatch(ValueKind::Array)),
        }
    }

    pub fn as_object(&self) -> Result<&BTreeMap<String, TaggedValue>, TypeMismatch> {
        match self {
            Self::Object(entries) => Ok(entries),
            other => Err(other.mismatch(ValueKind::Object)),
        }
    }

    pub fn into_string(self) -> Result<String, TypeMismatch> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::String)),
        }
    }

    pub fn into_json_string(self) -> Result<String, TypeMismatch> {
        match self {
            Self::JsonString(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::JsonString)),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, TypeMismatch> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(other.mismatch(ValueKind::Bytes)),
        }
    }

    pub fn into_array(self) -> Result<Vec<TaggedValue>, TypeMismatch> {
        match self {
            Self::Array(items) => Ok(items),
            other => Err(other.mismatch(ValueKind::Array)),
        }
    }

    pub fn into_object(self) -> Result<BTreeMap<String, TaggedValue>, TypeMismatch> {
        match self {
            Self::Object(entries) => Ok(entries),
            other => Err(other.mismatch(ValueKind::Object)),
        }
    }

    /// Look up a key of an `Object` value.
    ///
    /// Returns `Ok(None)` for a missing key and `Err` when `self` is not an
    /// object.
    pub fn get(&self, key: &str) -> Result<Option<&TaggedValue>, TypeMismatch> {
        self.as_object().map(|entries| entries.get(key))
    }
}

impl PartialEq for TaggedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int8(a), Self::Int8(b)) => a == b,
            (Self::Int16(a), Self::Int16(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::UInt8(a), Self::UInt8(b)) => a == b,
            (Self::UInt16(a), Self::UInt16(b)) => a == b,
            (Self::UInt32(a), Self::UInt32(b)) => a == b,
            (Self::UInt64(a), Self::UInt64(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a.to_bits() == b.to_bits(),
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) | (Self::JsonString(a), Self::JsonString(b)) => {
                a == b
            }
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Ptr(a), Self::Ptr(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TaggedValue {}

macro_rules! from_payload {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for TaggedValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

from_payload! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Vec<u8> => Bytes,
    Vec<TaggedValue> => Array,
    BTreeMap<String, TaggedValue> => Object,
    NativePtr => Ptr,
}

impl From<&str> for TaggedValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}
