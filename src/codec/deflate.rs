use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::TiffError;
use crate::io::CancelToken;

/// Default deflate level, matching what a stock zlib encoder uses.
pub const DEFAULT_DEFLATE_LEVEL: u32 = 6;

/// Compress a buffer into a zlib-wrapped (RFC 1950) deflate stream.
///
/// The output begins with the zlib CMF byte `0x78` and decompresses
/// with any generic zlib decoder. Levels outside `1..=9` are clamped.
/// Deterministic for a fixed level and input.
pub fn compress_sync(data: &[u8], level: u32) -> Result<Vec<u8>, TiffError> {
    let level = level.clamp(1, 9);
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2 + 64),
        Compression::new(level),
    );
    encoder.write_all(data).map_err(TiffError::Io)?;
    encoder.finish().map_err(TiffError::Io)
}

/// Decompress a zlib-wrapped deflate stream.
///
/// Fails with [`TiffError::CompressionCorrupt`] on any malformed input.
pub fn decompress_sync(data: &[u8]) -> Result<Vec<u8>, TiffError> {
    let mut out = Vec::with_capacity(data.len() * 2 + 64);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|err| TiffError::CompressionCorrupt(err.to_string()))?;
    Ok(out)
}

/// Compress on the blocking pool.
///
/// The cancellation check runs before submission; a job already running
/// completes and its result is discarded by the caller.
pub async fn compress(data: Vec<u8>, level: u32, cancel: &CancelToken) -> Result<Vec<u8>, TiffError> {
    cancel.check()?;
    spawn_codec_job(move || compress_sync(&data, level)).await
}

/// Decompress on the blocking pool.
pub async fn decompress(data: Vec<u8>, cancel: &CancelToken) -> Result<Vec<u8>, TiffError> {
    cancel.check()?;
    spawn_codec_job(move || decompress_sync(&data)).await
}

async fn spawn_codec_job<F>(job: F) -> Result<Vec<u8>, TiffError>
where
    F: FnOnce() -> Result<Vec<u8>, TiffError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| TiffError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?
}
