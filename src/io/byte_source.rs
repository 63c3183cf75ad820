use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from a resource.
///
/// This abstraction lets the TIFF codec and the Zarr facade work with
/// files without loading them entirely: every structure is fetched with
/// a bounded `read_at` call. Implementations must be thread-safe; the
/// same source is shared by all readers of an open file, so concurrent
/// non-overlapping reads must be supported.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Reads past the end of the resource fail with
    /// [`IoError::TruncatedRead`]; partial results are never returned.
    async fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Total size of the resource in bytes.
    fn len(&self) -> u64;

    /// Whether the resource is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A stable identifier for this resource (for logging and cache keys).
    fn identifier(&self) -> &str;
}

#[async_trait]
impl<S: ByteSource + ?Sized> ByteSource for std::sync::Arc<S> {
    async fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        (**self).read_at(offset, len).await
    }

    fn len(&self) -> u64 {
        (**self).len()
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

// =============================================================================
// Little-endian helpers
// =============================================================================
//
// Emitted files are always little-endian ("II"), and big-endian input is
// rejected at the header, so all multi-byte fields go through these.

/// Read a little-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Read a little-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a little-endian u64 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
pub fn read_u64_le(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u16_le() {
        assert_eq!(read_u16_le(&[0x02, 0x01]), 0x0102);
        assert_eq!(read_u16_le(&[0x00, 0x00]), 0x0000);
        assert_eq!(read_u16_le(&[0xFF, 0xFF]), 0xFFFF);
    }

    #[test]
    fn test_read_u32_le() {
        assert_eq!(read_u32_le(&[0x04, 0x03, 0x02, 0x01]), 0x01020304);
        assert_eq!(read_u32_le(&[0xFF, 0xFF, 0xFF, 0xFF]), 0xFFFFFFFF);
    }

    #[test]
    fn test_read_u64_le() {
        assert_eq!(
            read_u64_le(&[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]),
            0x0102030405060708
        );
    }
}
