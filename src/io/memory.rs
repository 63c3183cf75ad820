use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

use super::ByteSource;

/// An in-memory byte source.
///
/// Wraps a fully materialised buffer, typically the output of the write
/// orchestrator or a test fixture. Cloning is cheap; the payload is
/// reference-counted.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    identifier: String,
}

impl MemorySource {
    /// Create a memory source from any buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            identifier: "memory".to_string(),
        }
    }

    /// Create a memory source with a custom identifier.
    pub fn with_identifier(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }

    /// Borrow the full underlying buffer.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    async fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let start = usize::try_from(offset).map_err(|_| IoError::TruncatedRead {
            offset,
            requested: len as u64,
            size: self.data.len() as u64,
        })?;
        let end = start.checked_add(len).ok_or(IoError::TruncatedRead {
            offset,
            requested: len as u64,
            size: self.data.len() as u64,
        })?;
        if end > self.data.len() {
            return Err(IoError::TruncatedRead {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
