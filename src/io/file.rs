use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use crate::error::IoError;

use super::ByteSource;

/// A file-backed byte source.
///
/// Positioned reads go through a shared handle guarded by a mutex, so
/// concurrent callers serialise on the seek+read pair. For workloads
/// with many scattered small reads, wrap this in a
/// [`BlockCache`](super::BlockCache).
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl FileSource {
    /// Open a file for range reads.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier: path.display().to_string(),
        })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset.checked_add(len as u64).map_or(true, |end| end > self.size) {
            return Err(IoError::TruncatedRead {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        let mut buf = vec![0u8; len];
        {
            let mut file = self.file.lock().await;
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut buf).await?;
        }
        Ok(Bytes::from(buf))
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
