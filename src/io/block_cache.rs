use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use lru::LruCache;
use tokio::sync::{Mutex, OnceCell, RwLock};

use crate::error::IoError;

use super::ByteSource;

/// Default block size: 256KB.
/// Large enough to amortise per-request latency, small enough to not
/// waste bandwidth on sparse IFD walks.
pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

/// Default cache capacity in number of blocks (100 * 256KB = 25.6MB).
const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Block-based caching layer that wraps any [`ByteSource`].
///
/// TIFF parsing issues many small reads at scattered offsets: the IFD
/// chain, overflow tag payloads, tile offset arrays. This cache
/// amortises them into fewer, larger block fetches:
///
/// - Fixed-size blocks with LRU eviction
/// - Singleflight: concurrent requests for the same block share one fetch
/// - Reads spanning multiple blocks are reassembled transparently
pub struct BlockCache<S> {
    inner: Arc<S>,
    block_size: usize,
    cache: RwLock<LruCache<u64, Bytes>>,
    in_flight: Mutex<HashMap<u64, Arc<OnceCell<Bytes>>>>,
}

impl<S: ByteSource> BlockCache<S> {
    /// Wrap a source with the default block size and capacity.
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap a source with a custom block size and block-count capacity.
    ///
    /// # Panics
    /// Panics if `block_size` or `capacity` is zero.
    pub fn with_capacity(inner: S, block_size: usize, capacity: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        let capacity = NonZeroUsize::new(capacity).expect("cache capacity must be non-zero");
        Self {
            inner: Arc::new(inner),
            block_size,
            cache: RwLock::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch one block, deduplicating concurrent fetches of the same index.
    async fn block(&self, index: u64) -> Result<Bytes, IoError> {
        if let Some(block) = self.cache.write().await.get(&index) {
            return Ok(block.clone());
        }

        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(index)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_try_init(|| async {
                let offset = index * self.block_size as u64;
                let remaining = self.inner.len().saturating_sub(offset);
                let len = (self.block_size as u64).min(remaining) as usize;
                if len == 0 {
                    return Err(IoError::TruncatedRead {
                        offset,
                        requested: self.block_size as u64,
                        size: self.inner.len(),
                    });
                }
                self.inner.read_at(offset, len).await
            })
            .await
            .cloned();

        match result {
            Ok(block) => {
                self.cache.write().await.put(index, block.clone());
                self.in_flight.lock().await.remove(&index);
                Ok(block)
            }
            Err(err) => {
                self.in_flight.lock().await.remove(&index);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<S: ByteSource> ByteSource for BlockCache<S> {
    async fn read_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset
            .checked_add(len as u64)
            .map_or(true, |end| end > self.inner.len())
        {
            return Err(IoError::TruncatedRead {
                offset,
                requested: len as u64,
                size: self.inner.len(),
            });
        }
        if len == 0 {
            return Ok(Bytes::new());
        }

        let block_size = self.block_size as u64;
        let first_block = offset / block_size;
        let last_block = (offset + len as u64 - 1) / block_size;

        // Fast path: the range lives in a single block.
        if first_block == last_block {
            let block = self.block(first_block).await?;
            let start = (offset - first_block * block_size) as usize;
            return Ok(block.slice(start..start + len));
        }

        let mut out = BytesMut::with_capacity(len);
        for index in first_block..=last_block {
            let block = self.block(index).await?;
            let block_start = index * block_size;
            let start = offset.max(block_start) - block_start;
            let end = ((offset + len as u64).min(block_start + block.len() as u64)) - block_start;
            out.extend_from_slice(&block[start as usize..end as usize]);
        }
        Ok(out.freeze())
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
