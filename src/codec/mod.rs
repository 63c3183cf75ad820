//! Compression codecs for TIFF pixel data.
//!
//! Only deflate (TIFF compression code 8, zlib framing) is supported;
//! the synchronous entry points are pure functions and the async
//! wrappers run them on the blocking pool so decode work never stalls
//! the scheduler.

pub mod deflate;

pub use deflate::{compress_sync, decompress_sync, DEFAULT_DEFLATE_LEVEL};
