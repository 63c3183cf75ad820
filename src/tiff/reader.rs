//! Lazy TIFF container reading.
//!
//! [`TiffReader`] wraps a byte source and exposes the IFD chain, SubIFD
//! trees and pixel windows without ever materialising the file. Parsed
//! IFDs, decoded SubIFD offset arrays and per-IFD chunk layouts are
//! cached keyed by absolute file offset; the caches are append-only, so
//! concurrent readers converge on identical state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::codec::deflate;
use crate::dtype::{ArrayDtype, SampleFormat};
use crate::error::TiffError;
use crate::io::{ByteSource, CancelToken};

use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{Compression, Tag};
use super::values::ValueReader;

/// Safety limit on the main IFD chain; a chain longer than this is
/// treated as malformed.
const MAX_IFDS: usize = 65_536;

// =============================================================================
// Chunk layout
// =============================================================================

/// How an IFD packages its pixel data. Exactly one of the two layouts
/// is present per IFD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLayout {
    /// Fixed-size rectangles, zero-padded at the right/bottom edges
    Tiles { tile_width: u32, tile_height: u32 },

    /// Full-width horizontal bands; the last strip may be short
    Strips { rows_per_strip: u32 },
}

/// Decoded pixel geometry of one IFD: dimensions, layout, element type
/// and the chunk placement arrays.
#[derive(Debug, Clone)]
pub struct IfdData {
    pub width: u32,
    pub height: u32,
    pub layout: ChunkLayout,
    pub compression: Compression,
    pub dtype: ArrayDtype,

    /// Byte offset of each chunk, row-major
    pub chunk_offsets: Vec<u64>,

    /// Byte count of each chunk
    pub chunk_byte_counts: Vec<u64>,
}

impl IfdData {
    /// Number of chunks across the image.
    pub fn chunks_across(&self) -> u32 {
        match self.layout {
            ChunkLayout::Tiles { tile_width, .. } => self.width.div_ceil(tile_width),
            ChunkLayout::Strips { .. } => 1,
        }
    }

    /// Number of chunk rows down the image.
    pub fn chunks_down(&self) -> u32 {
        match self.layout {
            ChunkLayout::Tiles { tile_height, .. } => self.height.div_ceil(tile_height),
            ChunkLayout::Strips { rows_per_strip } => self.height.div_ceil(rows_per_strip),
        }
    }

    /// Total chunk count.
    pub fn chunk_count(&self) -> usize {
        self.chunks_across() as usize * self.chunks_down() as usize
    }

    /// Stored width of one chunk row in pixels (tiles are padded to the
    /// full tile width; strips span the image).
    fn stored_row_width(&self) -> u32 {
        match self.layout {
            ChunkLayout::Tiles { tile_width, .. } => tile_width,
            ChunkLayout::Strips { .. } => self.width,
        }
    }

    /// Expected decoded byte length of chunk `(cx, cy)`.
    fn stored_chunk_len(&self, cy: u32) -> usize {
        let bpe = self.dtype.bytes_per_element();
        match self.layout {
            ChunkLayout::Tiles {
                tile_width,
                tile_height,
            } => tile_width as usize * tile_height as usize * bpe,
            ChunkLayout::Strips { rows_per_strip } => {
                let first_row = cy * rows_per_strip;
                let rows = rows_per_strip.min(self.height - first_row);
                rows as usize * self.width as usize * bpe
            }
        }
    }

    /// Pixel origin of chunk `(cx, cy)`.
    fn chunk_origin(&self, cx: u32, cy: u32) -> (u32, u32) {
        match self.layout {
            ChunkLayout::Tiles {
                tile_width,
                tile_height,
            } => (cx * tile_width, cy * tile_height),
            ChunkLayout::Strips { rows_per_strip } => (0, cy * rows_per_strip),
        }
    }
}

// =============================================================================
// Window
// =============================================================================

/// A half-open pixel window `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Window {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }
}

// =============================================================================
// TiffReader
// =============================================================================

/// Lazy reader over an open TIFF container.
#[derive(Debug)]
pub struct TiffReader<S: ByteSource> {
    source: S,
    header: TiffHeader,
    cancel: CancelToken,

    /// Parsed IFDs keyed by absolute offset
    ifd_cache: tokio::sync::RwLock<HashMap<u64, Arc<Ifd>>>,

    /// Decoded SubIFD offset arrays keyed by the parent IFD's offset
    subifd_cache: tokio::sync::RwLock<HashMap<u64, Arc<Vec<u64>>>>,

    /// Decoded chunk geometry keyed by IFD offset
    data_cache: tokio::sync::RwLock<HashMap<u64, Arc<IfdData>>>,

    /// Main-chain offsets discovered so far
    chain: tokio::sync::Mutex<ChainState>,
}

#[derive(Debug)]
struct ChainState {
    offsets: Vec<u64>,
    complete: bool,
}

impl<S: ByteSource> TiffReader<S> {
    /// Open a container: parse and validate the header.
    pub async fn open(source: S) -> Result<Self, TiffError> {
        Self::open_with_cancel(source, CancelToken::new()).await
    }

    /// Open a container with a cancellation signal honoured by every
    /// subsequent read.
    pub async fn open_with_cancel(source: S, cancel: CancelToken) -> Result<Self, TiffError> {
        cancel.check()?;
        let head_len = (BIGTIFF_HEADER_SIZE as u64).min(source.len()) as usize;
        let head = source.read_at(0, head_len).await?;
        let header = TiffHeader::parse(&head, source.len())?;

        debug!(
            identifier = source.identifier(),
            big = header.big,
            first_ifd = header.first_ifd_offset,
            "opened TIFF container"
        );

        Ok(Self {
            source,
            header,
            cancel,
            ifd_cache: tokio::sync::RwLock::new(HashMap::new()),
            subifd_cache: tokio::sync::RwLock::new(HashMap::new()),
            data_cache: tokio::sync::RwLock::new(HashMap::new()),
            chain: tokio::sync::Mutex::new(ChainState {
                offsets: vec![header.first_ifd_offset],
                complete: false,
            }),
        })
    }

    /// The parsed header.
    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    /// The underlying byte source.
    pub fn source(&self) -> &S {
        &self.source
    }

    // -------------------------------------------------------------------------
    // IFD access
    // -------------------------------------------------------------------------

    /// Parse (or fetch from cache) the IFD at an absolute offset.
    pub async fn ifd_at_offset(&self, offset: u64) -> Result<Arc<Ifd>, TiffError> {
        if let Some(ifd) = self.ifd_cache.read().await.get(&offset) {
            return Ok(ifd.clone());
        }
        self.cancel.check()?;

        if offset == 0 || offset >= self.source.len() {
            return Err(TiffError::BadOffset(offset));
        }

        // Two reads: the entry count sizes the structure fetch.
        let count_bytes = self.source.read_at(offset, self.header.count_size()).await?;
        let entry_count = if self.header.big {
            crate::io::read_u64_le(&count_bytes)
        } else {
            crate::io::read_u16_le(&count_bytes) as u64
        };

        let structure_size = Ifd::structure_size(entry_count, &self.header);
        if offset + structure_size as u64 > self.source.len() {
            return Err(TiffError::TruncatedFile {
                offset,
                requested: structure_size as u64,
                size: self.source.len(),
            });
        }
        let bytes = self.source.read_at(offset, structure_size).await?;
        let ifd = Arc::new(Ifd::parse(&bytes, offset, &self.header)?);

        self.ifd_cache.write().await.insert(offset, ifd.clone());
        Ok(ifd)
    }

    /// The first IFD of the main chain.
    pub async fn first_ifd(&self) -> Result<Arc<Ifd>, TiffError> {
        self.ifd_at_offset(self.header.first_ifd_offset).await
    }

    /// The IFD at a chain index, or `None` past the end of the chain.
    pub async fn ifd_by_index(&self, index: usize) -> Result<Option<Arc<Ifd>>, TiffError> {
        match self.chain_offset(index).await? {
            Some(offset) => Ok(Some(self.ifd_at_offset(offset).await?)),
            None => Ok(None),
        }
    }

    /// Total number of IFDs in the main chain (walks it to the end).
    pub async fn ifd_count(&self) -> Result<usize, TiffError> {
        let mut index = {
            let chain = self.chain.lock().await;
            if chain.complete {
                return Ok(chain.offsets.len());
            }
            chain.offsets.len()
        };
        while self.chain_offset(index).await?.is_some() {
            index += 1;
        }
        Ok(index)
    }

    /// Resolve a chain index to an offset, extending the walk on demand.
    async fn chain_offset(&self, index: usize) -> Result<Option<u64>, TiffError> {
        let mut chain = self.chain.lock().await;
        loop {
            if index < chain.offsets.len() {
                return Ok(Some(chain.offsets[index]));
            }
            if chain.complete {
                return Ok(None);
            }
            if chain.offsets.len() >= MAX_IFDS {
                return Err(TiffError::BadOffset(*chain.offsets.last().unwrap()));
            }

            let last = *chain.offsets.last().unwrap();
            let ifd = self.ifd_at_offset(last).await?;
            let next = ifd.next_ifd_offset;
            if next == 0 {
                chain.complete = true;
            } else if chain.offsets.contains(&next) {
                return Err(TiffError::BadOffset(next));
            } else {
                chain.offsets.push(next);
            }
        }
    }

    // -------------------------------------------------------------------------
    // SubIFDs
    // -------------------------------------------------------------------------

    /// The decoded `SubIFDs` offset array of an IFD (empty when the tag
    /// is absent). Cached per parent offset.
    pub async fn sub_ifd_offsets(&self, ifd: &Ifd) -> Result<Arc<Vec<u64>>, TiffError> {
        if let Some(offsets) = self.subifd_cache.read().await.get(&ifd.offset) {
            return Ok(offsets.clone());
        }

        let offsets = match ifd.entry(Tag::SubIfds) {
            Some(entry) => {
                let values = ValueReader::new(&self.source, &self.header)
                    .read_u64_array(entry)
                    .await?;
                for &offset in &values {
                    if offset == 0 || offset >= self.source.len() {
                        return Err(TiffError::BadOffset(offset));
                    }
                }
                values
            }
            None => Vec::new(),
        };

        let offsets = Arc::new(offsets);
        self.subifd_cache
            .write()
            .await
            .insert(ifd.offset, offsets.clone());
        Ok(offsets)
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    /// The `ImageDescription` string of an IFD, if present.
    pub async fn image_description(&self, ifd: &Ifd) -> Result<Option<String>, TiffError> {
        match ifd.entry(Tag::ImageDescription) {
            Some(entry) => {
                let text = ValueReader::new(&self.source, &self.header)
                    .read_string(entry)
                    .await?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    /// Decode the chunk geometry of an IFD (cached).
    pub async fn ifd_data(&self, ifd: &Ifd) -> Result<Arc<IfdData>, TiffError> {
        if let Some(data) = self.data_cache.read().await.get(&ifd.offset) {
            return Ok(data.clone());
        }

        let values = ValueReader::new(&self.source, &self.header);

        let width = ifd
            .image_width()
            .ok_or(TiffError::UnsupportedTagCombination("missing ImageWidth"))?;
        let height = ifd
            .image_height()
            .ok_or(TiffError::UnsupportedTagCombination("missing ImageLength"))?;

        let tiled = ifd.is_tiled();
        let stripped = ifd.is_stripped();
        if tiled && stripped {
            return Err(TiffError::UnsupportedTagCombination(
                "IFD declares both tile and strip layout",
            ));
        }

        let (layout, offsets_entry, counts_entry) = if tiled {
            let tile_width = ifd
                .get_u32(Tag::TileWidth)
                .ok_or(TiffError::UnsupportedTagCombination("bad TileWidth"))?;
            let tile_height = ifd
                .get_u32(Tag::TileLength)
                .ok_or(TiffError::UnsupportedTagCombination("bad TileLength"))?;
            if tile_width == 0 || tile_height == 0 {
                return Err(TiffError::UnsupportedTagCombination("zero tile size"));
            }
            (
                ChunkLayout::Tiles {
                    tile_width,
                    tile_height,
                },
                ifd.entry(Tag::TileOffsets),
                ifd.entry(Tag::TileByteCounts),
            )
        } else if stripped {
            let rows_per_strip = ifd.get_u32(Tag::RowsPerStrip).unwrap_or(height).max(1);
            (
                ChunkLayout::Strips { rows_per_strip },
                ifd.entry(Tag::StripOffsets),
                ifd.entry(Tag::StripByteCounts),
            )
        } else {
            return Err(TiffError::UnsupportedTagCombination(
                "IFD declares neither tile nor strip layout",
            ));
        };

        let offsets_entry = offsets_entry.ok_or(TiffError::UnsupportedTagCombination(
            "missing chunk offsets tag",
        ))?;
        let counts_entry = counts_entry.ok_or(TiffError::UnsupportedTagCombination(
            "missing chunk byte-counts tag",
        ))?;
        let chunk_offsets = values.read_u64_array(offsets_entry).await?;
        let chunk_byte_counts = values.read_u64_array(counts_entry).await?;
        if chunk_offsets.len() != chunk_byte_counts.len() {
            return Err(TiffError::UnsupportedTagCombination(
                "chunk offset and byte-count arrays disagree",
            ));
        }

        let compression_code = ifd.get_u16(Tag::Compression).unwrap_or(1);
        let compression = Compression::from_u16(compression_code)
            .filter(|c| c.is_supported())
            .ok_or(TiffError::UnsupportedTagCombination(
                "unsupported compression scheme",
            ))?;

        let bits = match ifd.entry(Tag::BitsPerSample) {
            Some(entry) => *values
                .read_u32_array(entry)
                .await?
                .first()
                .ok_or(TiffError::UnsupportedTagCombination("empty BitsPerSample"))?,
            None => 8,
        };
        let format_code = ifd.get_u16(Tag::SampleFormat).unwrap_or(1);
        let sample_format = SampleFormat::from_u16(format_code).ok_or(TiffError::Dtype(
            crate::error::DtypeError::UnsupportedTiff {
                sample_format: format_code,
                bits: bits as u16,
            },
        ))?;
        let dtype = ArrayDtype::from_tiff(sample_format, bits as u16)?;

        let data = Arc::new(IfdData {
            width,
            height,
            layout,
            compression,
            dtype,
            chunk_offsets,
            chunk_byte_counts,
        });

        if data.chunk_offsets.len() != data.chunk_count() {
            return Err(TiffError::UnsupportedTagCombination(
                "chunk count does not match image geometry",
            ));
        }

        self.data_cache
            .write()
            .await
            .insert(ifd.offset, data.clone());
        Ok(data)
    }

    // -------------------------------------------------------------------------
    // Pixel access
    // -------------------------------------------------------------------------

    /// Read and decode one chunk by row-major index.
    ///
    /// The result is normalised to the stored chunk geometry: decoded
    /// tiles always span `tileW * tileH` elements (zero-padded), strips
    /// span their row count.
    pub async fn read_chunk(&self, ifd: &Ifd, index: usize) -> Result<Vec<u8>, TiffError> {
        let data = self.ifd_data(ifd).await?;
        self.read_chunk_with(&data, index).await
    }

    async fn read_chunk_with(&self, data: &IfdData, index: usize) -> Result<Vec<u8>, TiffError> {
        self.cancel.check()?;
        let offset = *data
            .chunk_offsets
            .get(index)
            .ok_or(TiffError::BadOffset(index as u64))?;
        let byte_count = data.chunk_byte_counts[index] as usize;

        let raw = self.source.read_at(offset, byte_count).await?;
        let mut decoded = if data.compression.is_deflate() {
            deflate::decompress(raw.to_vec(), &self.cancel).await?
        } else {
            raw.to_vec()
        };

        let cy = index as u32 / data.chunks_across();
        let expected = data.stored_chunk_len(cy);
        if decoded.len() != expected {
            decoded.resize(expected, 0);
        }
        Ok(decoded)
    }

    /// Read a pixel window, decomposing it into the overlapping chunks
    /// and copying the intersecting sub-rectangles into place.
    ///
    /// The window is clipped to the image; the returned buffer holds
    /// `width * height` elements of the clipped window, row-major.
    pub async fn read_window(&self, ifd: &Ifd, window: Window) -> Result<Vec<u8>, TiffError> {
        let data = self.ifd_data(ifd).await?;
        let window = Window {
            left: window.left.min(data.width),
            top: window.top.min(data.height),
            right: window.right.min(data.width),
            bottom: window.bottom.min(data.height),
        };

        let bpe = data.dtype.bytes_per_element();
        let out_width = window.width() as usize;
        let mut out = vec![0u8; out_width * window.height() as usize * bpe];
        if window.is_empty() {
            return Ok(out);
        }

        let (chunk_w, chunk_h) = match data.layout {
            ChunkLayout::Tiles {
                tile_width,
                tile_height,
            } => (tile_width, tile_height),
            ChunkLayout::Strips { rows_per_strip } => (data.width, rows_per_strip),
        };

        let cx_first = window.left / chunk_w;
        let cx_last = (window.right - 1) / chunk_w;
        let cy_first = window.top / chunk_h;
        let cy_last = (window.bottom - 1) / chunk_h;

        for cy in cy_first..=cy_last {
            for cx in cx_first..=cx_last {
                let index = (cy * data.chunks_across() + cx) as usize;
                let chunk = self.read_chunk_with(&data, index).await?;

                let (ox, oy) = data.chunk_origin(cx, cy);
                let row_width = data.stored_row_width() as usize;

                let x0 = window.left.max(ox);
                let x1 = window.right.min(ox + chunk_w);
                let y0 = window.top.max(oy);
                let y1 = window.bottom.min(oy + chunk_h).min(data.height);

                for y in y0..y1 {
                    let src = (((y - oy) as usize * row_width) + (x0 - ox) as usize) * bpe;
                    let dst = (((y - window.top) as usize * out_width)
                        + (x0 - window.left) as usize)
                        * bpe;
                    let len = (x1 - x0) as usize * bpe;
                    out[dst..dst + len].copy_from_slice(&chunk[src..src + len]);
                }
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;

    /// Hand-assemble a minimal classic TIFF: one stripped 4x4 uint8
    /// image in a single strip at a known offset.
    fn tiny_stripped_tiff() -> Vec<u8> {
        let mut file = Vec::new();
        // Header: II, 42, first IFD at 8.
        file.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]);

        // IFD with 7 entries at offset 8.
        let pixel_offset: u32 = 8 + 2 + 7 * 12 + 4; // after IFD structure
        file.extend_from_slice(&7u16.to_le_bytes());
        let entry = |tag: u16, ftype: u16, count: u32, value: u32| {
            let mut e = Vec::new();
            e.extend_from_slice(&tag.to_le_bytes());
            e.extend_from_slice(&ftype.to_le_bytes());
            e.extend_from_slice(&count.to_le_bytes());
            e.extend_from_slice(&value.to_le_bytes());
            e
        };
        file.extend_from_slice(&entry(256, 3, 1, 4)); // ImageWidth
        file.extend_from_slice(&entry(257, 3, 1, 4)); // ImageLength
        file.extend_from_slice(&entry(258, 3, 1, 8)); // BitsPerSample
        file.extend_from_slice(&entry(259, 3, 1, 1)); // Compression = none
        file.extend_from_slice(&entry(273, 4, 1, pixel_offset)); // StripOffsets
        file.extend_from_slice(&entry(278, 3, 1, 4)); // RowsPerStrip
        file.extend_from_slice(&entry(279, 4, 1, 16)); // StripByteCounts
        file.extend_from_slice(&0u32.to_le_bytes()); // next IFD

        // Pixel data: 0..16.
        file.extend((0u8..16).collect::<Vec<u8>>());
        file
    }

    #[tokio::test]
    async fn test_open_and_walk_chain() {
        let reader = TiffReader::open(MemorySource::new(tiny_stripped_tiff()))
            .await
            .unwrap();
        assert!(!reader.header().big);
        assert_eq!(reader.ifd_count().await.unwrap(), 1);

        let ifd = reader.first_ifd().await.unwrap();
        assert_eq!(ifd.image_width(), Some(4));
        assert_eq!(ifd.image_height(), Some(4));
        assert!(reader.ifd_by_index(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ifd_data_geometry() {
        let reader = TiffReader::open(MemorySource::new(tiny_stripped_tiff()))
            .await
            .unwrap();
        let ifd = reader.first_ifd().await.unwrap();
        let data = reader.ifd_data(&ifd).await.unwrap();

        assert_eq!(data.dtype, ArrayDtype::Uint8);
        assert_eq!(data.compression, Compression::None);
        assert_eq!(data.layout, ChunkLayout::Strips { rows_per_strip: 4 });
        assert_eq!(data.chunk_count(), 1);
        assert_eq!(data.chunk_byte_counts, vec![16]);
    }

    #[tokio::test]
    async fn test_read_chunk_and_window() {
        let reader = TiffReader::open(MemorySource::new(tiny_stripped_tiff()))
            .await
            .unwrap();
        let ifd = reader.first_ifd().await.unwrap();

        let chunk = reader.read_chunk(&ifd, 0).await.unwrap();
        assert_eq!(chunk, (0u8..16).collect::<Vec<u8>>());

        // Interior 2x2 window starting at (1, 1).
        let window = reader
            .read_window(&ifd, Window::new(1, 1, 3, 3))
            .await
            .unwrap();
        assert_eq!(window, vec![5, 6, 9, 10]);
    }

    #[tokio::test]
    async fn test_window_clipped_to_image() {
        let reader = TiffReader::open(MemorySource::new(tiny_stripped_tiff()))
            .await
            .unwrap();
        let ifd = reader.first_ifd().await.unwrap();

        let window = reader
            .read_window(&ifd, Window::new(2, 2, 10, 10))
            .await
            .unwrap();
        // Clipped to 2x2 at (2, 2).
        assert_eq!(window, vec![10, 11, 14, 15]);
    }

    #[tokio::test]
    async fn test_cancelled_read() {
        let cancel = CancelToken::new();
        let reader =
            TiffReader::open_with_cancel(MemorySource::new(tiny_stripped_tiff()), cancel.clone())
                .await
                .unwrap();
        let ifd = reader.first_ifd().await.unwrap();

        cancel.cancel();
        let err = reader.read_chunk(&ifd, 0).await.unwrap_err();
        assert!(matches!(err, TiffError::Cancelled));
    }

    #[tokio::test]
    async fn test_bad_first_ifd_offset() {
        // Header points the first IFD past the end of the file.
        let mut file = tiny_stripped_tiff();
        file[4..8].copy_from_slice(&5000u32.to_le_bytes());
        let err = TiffReader::open(MemorySource::new(file)).await.unwrap_err();
        assert!(matches!(err, TiffError::BadOffset(5000)));
    }
}
