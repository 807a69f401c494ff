//! Bounds-checked decoder.
//!
//! Every read goes through [`Reader`], which only sees the declared content
//! slice, so no nested length can reach past the envelope.

use std::collections::BTreeMap;

use hostbridge_types::TaggedValue;

use crate::error::CodecError;
use crate::header::{HEADER_LEN, Header, WireTag};
use crate::limits::CodecLimits;

/// Smallest encoded array element: tag plus a one-byte scalar.
const MIN_ELEMENT_BYTES: usize = 2;
/// Smallest encoded object entry: empty key (4-byte length), tag, one-byte scalar.
const MIN_ENTRY_BYTES: usize = 6;

pub(crate) fn decode(
    bytes: &[u8],
    limits: &CodecLimits,
) -> Result<(TaggedValue, usize), CodecError> {
    let header = Header::parse(bytes)?;
    let declared = header.content_size as usize;
    let ceiling = limits.content_ceiling();
    if declared > ceiling {
        return Err(CodecError::TooLarge {
            size: declared,
            limit: ceiling,
        });
    }
    let available = bytes.len() - HEADER_LEN;
    if declared > available {
        return Err(CodecError::SizeMismatch {
            declared,
            available,
        });
    }

    let mut reader = Reader::new(&bytes[HEADER_LEN..HEADER_LEN + declared]);
    let value = read_value(&mut reader, header.tag, 0, limits)?;
    if reader.pos != declared {
        return Err(CodecError::ContentSizeMismatch {
            declared,
            consumed: reader.pos,
        });
    }
    Ok((value, HEADER_LEN + declared))
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        let available = self.remaining();
        if needed > available {
            return Err(CodecError::Truncated { needed, available });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(len)?;
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    fn len(&mut self) -> Result<usize, CodecError> {
        Ok(u32::from_le_bytes(self.array()?) as usize)
    }

    fn blob(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.len()?;
        self.take(len)
    }

    fn text(&mut self) -> Result<String, CodecError> {
        let len = self.len()?;
        let offset = self.pos;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { offset })
    }

    /// Read a count and reject it unless `count * min_size` bytes remain.
    fn count(&mut self, min_size: usize) -> Result<usize, CodecError> {
        let count = self.len()?;
        self.ensure(count.saturating_mul(min_size))?;
        Ok(count)
    }
}

fn read_tagged(
    reader: &mut Reader<'_>,
    depth: usize,
    limits: &CodecLimits,
) -> Result<TaggedValue, CodecError> {
    let tag = WireTag::from_byte(reader.u8()?)?;
    read_value(reader, tag, depth, limits)
}

fn read_value(
    reader: &mut Reader<'_>,
    tag: WireTag,
    depth: usize,
    limits: &CodecLimits,
) -> Result<TaggedValue, CodecError> {
    Ok(match tag {
        WireTag::Bool => match reader.u8()? {
            0 => TaggedValue::Bool(false),
            1 => TaggedValue::Bool(true),
            other => return Err(CodecError::InvalidBool(other)),
        },
        WireTag::Int8 => TaggedValue::Int8(i8::from_le_bytes(reader.array()?)),
        WireTag::Int16 => TaggedValue::Int16(i16::from_le_bytes(reader.array()?)),
        WireTag::Int32 => TaggedValue::Int32(i32::from_le_bytes(reader.array()?)),
        WireTag::Int64 => TaggedValue::Int64(i64::from_le_bytes(reader.array()?)),
        WireTag::UInt8 => TaggedValue::UInt8(reader.u8()?),
        WireTag::UInt16 => TaggedValue::UInt16(u16::from_le_bytes(reader.array()?)),
        WireTag::UInt32 => TaggedValue::UInt32(u32::from_le_bytes(reader.array()?)),
        WireTag::UInt64 => TaggedValue::UInt64(u64::from_le_bytes(reader.array()?)),
        WireTag::Float32 => {
            TaggedValue::Float32(f32::from_bits(u32::from_le_bytes(reader.array()?)))
        }
        WireTag::Float64 => {
            TaggedValue::Float64(f64::from_bits(u64::from_le_bytes(reader.array()?)))
        }
        WireTag::String => TaggedValue::String(reader.text()?),
        WireTag::JsonString => TaggedValue::JsonString(reader.text()?),
        WireTag::Bytes => TaggedValue::Bytes(reader.blob()?.to_vec()),
        WireTag::Array => {
            let depth = limits.enter(depth)?;
            let count = reader.count(MIN_ELEMENT_BYTES)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_tagged(reader, depth, limits)?);
            }
            TaggedValue::Array(items)
        }
        WireTag::Object => {
            let depth = limits.enter(depth)?;
            let count = reader.count(MIN_ENTRY_BYTES)?;
            let mut entries = BTreeMap::new();
            for _ in 0..count {
                let key = reader.text()?;
                if entries.contains_key(&key) {
                    return Err(CodecError::DuplicateKey(key));
                }
                let item = read_tagged(reader, depth, limits)?;
                entries.insert(key, item);
            }
            TaggedValue::Object(entries)
        }
    })
}
