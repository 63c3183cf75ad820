//! Byte-source abstractions for range reads.
//!
//! The TIFF codec never sees a whole file: it consumes a minimal
//! random-access interface ([`ByteSource`]) and fetches exactly the
//! ranges it needs. This module provides the trait, file-backed and
//! in-memory implementations, a block cache that amortises scattered
//! small reads, and the cooperative cancellation token honoured at
//! every suspension point.

mod block_cache;
mod byte_source;
mod cancel;
mod file;
mod memory;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_SIZE};
pub use byte_source::{read_u16_le, read_u32_le, read_u64_le, ByteSource};
pub use cancel::CancelToken;
pub use file::FileSource;
pub use memory::MemorySource;
