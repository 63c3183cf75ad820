//! TIFF tag value reading.
//!
//! Tag payloads live either inline in the IFD entry or at an absolute
//! offset in the file. Array payloads (tile offsets, byte counts,
//! `SubIFDs`) are fetched with a single range request each.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::{read_u16_le, read_u32_le, read_u64_le, ByteSource};

use super::parser::{IfdEntry, TiffHeader};
use super::tags::FieldType;

/// Reads tag payloads through a byte source.
pub struct ValueReader<'a, S: ByteSource> {
    source: &'a S,
    header: &'a TiffHeader,
}

impl<'a, S: ByteSource> ValueReader<'a, S> {
    pub fn new(source: &'a S, header: &'a TiffHeader) -> Self {
        Self { source, header }
    }

    /// Raw payload bytes for an entry, inline or fetched.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry.value_byte_size().ok_or(TiffError::BadTagType {
            tag: entry.tag_id,
            type_code: entry.field_type_raw,
        })?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(
                &entry.value_bytes[..size as usize],
            ))
        } else {
            let offset = entry.value_offset();
            if offset
                .checked_add(size)
                .map_or(true, |end| end > self.source.len())
            {
                return Err(TiffError::BadOffset(offset));
            }
            Ok(self.source.read_at(offset, size as usize).await?)
        }
    }

    /// A single u32 value (Short or Long).
    pub async fn read_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        if let Some(value) = entry.inline_u32() {
            return Ok(value);
        }
        let values = self.read_u32_array(entry).await?;
        match values.as_slice() {
            [value] => Ok(*value),
            _ => Err(TiffError::BadTagType {
                tag: entry.tag_id,
                type_code: entry.field_type_raw,
            }),
        }
    }

    /// An array of u64 values (Short, Long or Long8, widened).
    ///
    /// The primary accessor for `TileOffsets`, `TileByteCounts` and
    /// `SubIFDs`.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = self.known_type(entry)?;
        let count = entry.count as usize;
        if count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        let mut values = Vec::with_capacity(count);
        match field_type {
            FieldType::Short => {
                for i in 0..count {
                    values.push(read_u16_le(&bytes[i * 2..]) as u64);
                }
            }
            FieldType::Long => {
                for i in 0..count {
                    values.push(read_u32_le(&bytes[i * 4..]) as u64);
                }
            }
            FieldType::Long8 => {
                for i in 0..count {
                    values.push(read_u64_le(&bytes[i * 8..]));
                }
            }
            _ => {
                return Err(TiffError::BadTagType {
                    tag: entry.tag_id,
                    type_code: entry.field_type_raw,
                })
            }
        }
        Ok(values)
    }

    /// An array of u32 values (Short or Long, widened).
    pub async fn read_u32_array(&self, entry: &IfdEntry) -> Result<Vec<u32>, TiffError> {
        let field_type = self.known_type(entry)?;
        let count = entry.count as usize;
        if count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        let mut values = Vec::with_capacity(count);
        match field_type {
            FieldType::Short => {
                for i in 0..count {
                    values.push(read_u16_le(&bytes[i * 2..]) as u32);
                }
            }
            FieldType::Long => {
                for i in 0..count {
                    values.push(read_u32_le(&bytes[i * 4..]));
                }
            }
            _ => {
                return Err(TiffError::BadTagType {
                    tag: entry.tag_id,
                    type_code: entry.field_type_raw,
                })
            }
        }
        Ok(values)
    }

    /// A NUL-terminated ASCII string, terminator stripped.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = self.known_type(entry)?;
        if field_type != FieldType::Ascii {
            return Err(TiffError::BadTagType {
                tag: entry.tag_id,
                type_code: entry.field_type_raw,
            });
        }
        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    fn known_type(&self, entry: &IfdEntry) -> Result<FieldType, TiffError> {
        entry.field_type.ok_or(TiffError::BadTagType {
            tag: entry.tag_id,
            type_code: entry.field_type_raw,
        })
    }

    /// The header this reader interprets entries against.
    pub fn header(&self) -> &TiffHeader {
        self.header
    }
}
