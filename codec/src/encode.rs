//! Two-pass encoder: size and validate the whole tree, then write once.

use hostbridge_types::TaggedValue;

use crate::error::CodecError;
use crate::header::{HEADER_LEN, Header, WireTag};
use crate::limits::CodecLimits;

const LEN_PREFIX: usize = 4;

pub(crate) fn encode(value: &TaggedValue, limits: &CodecLimits) -> Result<Vec<u8>, CodecError> {
    let tag = WireTag::for_value(value)?;
    let content_size = checked_content_size(value, limits)?;

    let mut out = Vec::with_capacity(HEADER_LEN + content_size);
    Header {
        tag,
        content_size: content_size as u32,
    }
    .write(&mut out);
    write_content(value, &mut out)?;
    debug_assert_eq!(out.len(), HEADER_LEN + content_size);
    Ok(out)
}

/// Content size of `value`, validated against the wire rules and `limits`.
pub(crate) fn checked_content_size(
    value: &TaggedValue,
    limits: &CodecLimits,
) -> Result<usize, CodecError> {
    let size = content_size(value, 0, limits)?;
    let ceiling = limits.content_ceiling();
    if size > ceiling {
        return Err(CodecError::TooLarge {
            size,
            limit: ceiling,
        });
    }
    Ok(size)
}

fn content_size(
    value: &TaggedValue,
    depth: usize,
    limits: &CodecLimits,
) -> Result<usize, CodecError> {
    Ok(match value {
        TaggedValue::Null | TaggedValue::Ptr(_) => {
            return Err(CodecError::UnsupportedType(value.kind()));
        }
        TaggedValue::Bool(_) | TaggedValue::Int8(_) | TaggedValue::UInt8(_) => 1,
        TaggedValue::Int16(_) | TaggedValue::UInt16(_) => 2,
        TaggedValue::Int32(_) | TaggedValue::UInt32(_) | TaggedValue::Float32(_) => 4,
        TaggedValue::Int64(_) | TaggedValue::UInt64(_) | TaggedValue::Float64(_) => 8,
        TaggedValue::String(s) | TaggedValue::JsonString(s) => blob_size(s.len())?,
        TaggedValue::Bytes(b) => blob_size(b.len())?,
        TaggedValue::Array(items) => {
            let depth = limits.enter(depth)?;
            let mut size = blob_size(0)?;
            check_len(items.len())?;
            for item in items {
                size = size.saturating_add(1 + content_size(item, depth, limits)?);
            }
            size
        }
        TaggedValue::Object(entries) => {
            let depth = limits.enter(depth)?;
            let mut size = blob_size(0)?;
            check_len(entries.len())?;
            for (key, item) in entries {
                size = size
                    .saturating_add(blob_size(key.len())?)
                    .saturating_add(1 + content_size(item, depth, limits)?);
            }
            size
        }
    })
}

fn check_len(len: usize) -> Result<(), CodecError> {
    if u32::try_from(len).is_err() {
        return Err(CodecError::TooLarge {
            size: len,
            limit: u32::MAX as usize,
        });
    }
    Ok(())
}

fn blob_size(len: usize) -> Result<usize, CodecError> {
    check_len(len)?;
    Ok(LEN_PREFIX + len)
}

fn write_len(len: usize, out: &mut Vec<u8>) {
    out.extend_from_slice(&(len as u32).to_le_bytes());
}

fn write_blob(bytes: &[u8], out: &mut Vec<u8>) {
    write_len(bytes.len(), out);
    out.extend_from_slice(bytes);
}

fn write_tagged(value: &TaggedValue, out: &mut Vec<u8>) -> Result<(), CodecError> {
    out.push(WireTag::for_value(value)?.as_byte());
    write_content(value, out)
}

fn write_content(value: &TaggedValue, out: &mut Vec<u8>) -> Result<(), CodecError> {
    match value {
        TaggedValue::Null | TaggedValue::Ptr(_) => {
            return Err(CodecError::UnsupportedType(value.kind()));
        }
        TaggedValue::Bool(b) => out.push(u8::from(*b)),
        TaggedValue::Int8(v) => out.extend_from_slice(&v.to_le_bytes()),
        TaggedValue::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
        TaggedValue::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
        TaggedValue::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
        TaggedValue::UInt8(v) => out.push(*v),
        TaggedValue::UInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
        TaggedValue::UInt32(v) => out.extend_from_slice(&v.to_le_bytes()),
        TaggedValue::UInt64(v) => out.extend_from_slice(&v.to_le_bytes()),
        TaggedValue::Float32(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
        TaggedValue::Float64(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
        TaggedValue::String(s) | TaggedValue::JsonString(s) => write_blob(s.as_bytes(), out),
        TaggedValue::Bytes(b) => write_blob(b, out),
        TaggedValue::Array(items) => {
            write_len(items.len(), out);
            for item in items {
                write_tagged(item, out)?;
            }
        }
        TaggedValue::Object(entries) => {
            write_len(entries.len(), out);
            for (key, item) in entries {
                write_blob(key.as_bytes(), out);
                write_tagged(item, out)?;
            }
        }
    }
    Ok(())
}
