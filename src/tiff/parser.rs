//! TIFF header and IFD structure parsing.
//!
//! # Header layouts
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order marker, "II" only (0x4949)
//! Bytes 2-3: Version (42)
//! Bytes 4-7: Offset of first IFD
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1:  Byte order marker, "II" only
//! Bytes 2-3:  Version (43)
//! Bytes 4-5:  Offset width (must be 8)
//! Bytes 6-7:  Reserved (0)
//! Bytes 8-15: Offset of first IFD
//! ```
//!
//! Big-endian ("MM") files are rejected at the header with a bad-magic
//! error; the writer never produces them and the reader does not decode
//! them.

use std::collections::HashMap;

use crate::error::TiffError;
use crate::io::{read_u16_le, read_u32_le, read_u64_le};

use super::tags::{FieldType, Tag};

// =============================================================================
// Constants
// =============================================================================

/// Byte order marker "II" (little-endian), read as a little-endian u16.
const BYTE_ORDER_LE: u16 = 0x4949;

/// Version number of classic TIFF.
pub const VERSION_CLASSIC: u16 = 42;

/// Version number of BigTIFF.
pub const VERSION_BIGTIFF: u16 = 43;

/// Size of a classic TIFF header in bytes.
pub const CLASSIC_HEADER_SIZE: usize = 8;

/// Size of a BigTIFF header in bytes.
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header: the format flavour and where the IFD chain
/// starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Whether this is a BigTIFF file (64-bit offsets)
    pub big: bool,

    /// Offset of the first IFD
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a header from raw bytes.
    ///
    /// `file_size` bounds the first-IFD offset; an offset outside the
    /// file is rejected immediately rather than on first use.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < CLASSIC_HEADER_SIZE {
            return Err(TiffError::TruncatedFile {
                offset: 0,
                requested: CLASSIC_HEADER_SIZE as u64,
                size: bytes.len() as u64,
            });
        }

        let marker = read_u16_le(&bytes[0..2]);
        if marker != BYTE_ORDER_LE {
            return Err(TiffError::BadMagic(marker));
        }

        let version = read_u16_le(&bytes[2..4]);
        match version {
            VERSION_CLASSIC => {
                let first_ifd_offset = read_u32_le(&bytes[4..8]) as u64;
                if first_ifd_offset >= file_size {
                    return Err(TiffError::BadOffset(first_ifd_offset));
                }
                Ok(TiffHeader {
                    big: false,
                    first_ifd_offset,
                })
            }
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::TruncatedFile {
                        offset: 0,
                        requested: BIGTIFF_HEADER_SIZE as u64,
                        size: bytes.len() as u64,
                    });
                }
                let offset_width = read_u16_le(&bytes[4..6]);
                if offset_width != 8 {
                    return Err(TiffError::BadMagic(offset_width));
                }
                let first_ifd_offset = read_u64_le(&bytes[8..16]);
                if first_ifd_offset >= file_size {
                    return Err(TiffError::BadOffset(first_ifd_offset));
                }
                Ok(TiffHeader {
                    big: true,
                    first_ifd_offset,
                })
            }
            other => Err(TiffError::BadMagic(other)),
        }
    }

    /// Size of the header in bytes.
    #[inline]
    pub const fn header_size(&self) -> usize {
        if self.big {
            BIGTIFF_HEADER_SIZE
        } else {
            CLASSIC_HEADER_SIZE
        }
    }

    /// Size of one IFD entry: 12 bytes classic, 20 bytes BigTIFF.
    #[inline]
    pub const fn entry_size(&self) -> usize {
        if self.big {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn count_size(&self) -> usize {
        if self.big {
            8
        } else {
            2
        }
    }

    /// Size of the next-IFD offset field at the end of an IFD.
    #[inline]
    pub const fn next_offset_size(&self) -> usize {
        if self.big {
            8
        } else {
            4
        }
    }

    /// Size of the value/offset field in an entry, which doubles as the
    /// inline threshold.
    #[inline]
    pub const fn value_field_size(&self) -> usize {
        if self.big {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// A single entry in an IFD.
///
/// ## Classic layout (12 bytes)
/// ```text
/// Bytes 0-1:  Tag ID
/// Bytes 2-3:  Field type
/// Bytes 4-7:  Count
/// Bytes 8-11: Value or offset
/// ```
///
/// ## BigTIFF layout (20 bytes)
/// ```text
/// Bytes 0-1:   Tag ID
/// Bytes 2-3:   Field type
/// Bytes 4-11:  Count
/// Bytes 12-19: Value or offset
/// ```
#[derive(Debug, Clone)]
pub struct IfdEntry {
    /// The tag ID, known or not
    pub tag_id: u16,

    /// The field type, `None` when the code is unknown
    pub field_type: Option<FieldType>,

    /// Raw field type code, kept for error reporting
    pub field_type_raw: u16,

    /// Number of values (not bytes)
    pub count: u64,

    /// Raw bytes of the value/offset field (4 or 8 bytes)
    pub value_bytes: Vec<u8>,

    /// Whether the payload is stored inline
    pub is_inline: bool,
}

impl IfdEntry {
    fn parse(bytes: &[u8], header: &TiffHeader) -> Self {
        let tag_id = read_u16_le(&bytes[0..2]);
        let field_type_raw = read_u16_le(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_bytes) = if header.big {
            (read_u64_le(&bytes[4..12]), bytes[12..20].to_vec())
        } else {
            (read_u32_le(&bytes[4..8]) as u64, bytes[8..12].to_vec())
        };

        let is_inline = field_type
            .map(|ft| ft.fits_inline(count, header.big))
            .unwrap_or(false);

        IfdEntry {
            tag_id,
            field_type,
            field_type_raw,
            count,
            value_bytes,
            is_inline,
        }
    }

    /// The known tag for this entry, if recognised.
    pub fn tag(&self) -> Option<Tag> {
        Tag::from_u16(self.tag_id)
    }

    /// The offset of the payload, for non-inline entries.
    pub fn value_offset(&self) -> u64 {
        if self.value_bytes.len() == 8 {
            read_u64_le(&self.value_bytes)
        } else {
            read_u32_le(&self.value_bytes) as u64
        }
    }

    /// Inline value as a single u16.
    pub fn inline_u16(&self) -> Option<u16> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(read_u16_le(&self.value_bytes)),
            _ => None,
        }
    }

    /// Inline value as a single u32 (Short or Long).
    pub fn inline_u32(&self) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(read_u16_le(&self.value_bytes) as u32),
            FieldType::Long => Some(read_u32_le(&self.value_bytes)),
            _ => None,
        }
    }

    /// Inline value as a single u64 (Short, Long or Long8).
    pub fn inline_u64(&self) -> Option<u64> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(read_u16_le(&self.value_bytes) as u64),
            FieldType::Long => Some(read_u32_le(&self.value_bytes) as u64),
            FieldType::Long8 if self.value_bytes.len() >= 8 => {
                Some(read_u64_le(&self.value_bytes))
            }
            _ => None,
        }
    }

    /// Total payload size in bytes.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .map(|ft| ft.size_in_bytes() as u64 * self.count)
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
///
/// Entries are stored in file order plus a tag index for lookup. The
/// IFD remembers its own absolute offset, which keys the reader's
/// caches.
#[derive(Debug, Clone)]
pub struct Ifd {
    /// Absolute offset of this IFD in the file
    pub offset: u64,

    /// All entries in file order
    pub entries: Vec<IfdEntry>,

    /// Entries indexed by tag ID
    entries_by_tag: HashMap<u16, usize>,

    /// Offset of the next IFD in the chain, 0 for the last
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Parse an IFD from raw bytes starting at its entry count.
    pub fn parse(bytes: &[u8], offset: u64, header: &TiffHeader) -> Result<Self, TiffError> {
        let count_size = header.count_size();
        let entry_size = header.entry_size();

        if bytes.len() < count_size {
            return Err(TiffError::TruncatedFile {
                offset,
                requested: count_size as u64,
                size: bytes.len() as u64,
            });
        }

        let entry_count = if header.big {
            read_u64_le(&bytes[0..8])
        } else {
            read_u16_le(&bytes[0..2]) as u64
        };

        let entries_size = entry_count as usize * entry_size;
        let next_offset_start = count_size + entries_size;
        let total_required = next_offset_start + header.next_offset_size();

        if bytes.len() < total_required {
            return Err(TiffError::TruncatedFile {
                offset,
                requested: total_required as u64,
                size: bytes.len() as u64,
            });
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut entries_by_tag = HashMap::with_capacity(entry_count as usize);
        for i in 0..entry_count as usize {
            let start = count_size + i * entry_size;
            let entry = IfdEntry::parse(&bytes[start..start + entry_size], header);
            entries_by_tag.insert(entry.tag_id, entries.len());
            entries.push(entry);
        }

        let next_ifd_offset = if header.big {
            read_u64_le(&bytes[next_offset_start..next_offset_start + 8])
        } else {
            read_u32_le(&bytes[next_offset_start..next_offset_start + 4]) as u64
        };

        Ok(Ifd {
            offset,
            entries,
            entries_by_tag,
            next_ifd_offset,
        })
    }

    /// Byte size of an IFD structure with `entry_count` entries.
    ///
    /// Used to size the fetch before parsing; payloads at external
    /// offsets are not included.
    pub fn structure_size(entry_count: u64, header: &TiffHeader) -> usize {
        header.count_size()
            + entry_count as usize * header.entry_size()
            + header.next_offset_size()
    }

    /// Look up an entry by numeric tag ID.
    pub fn entry_by_id(&self, tag_id: u16) -> Option<&IfdEntry> {
        self.entries_by_tag
            .get(&tag_id)
            .map(|&idx| &self.entries[idx])
    }

    /// Look up an entry by known tag.
    pub fn entry(&self, tag: Tag) -> Option<&IfdEntry> {
        self.entry_by_id(tag.as_u16())
    }

    /// Inline u16 value for a tag.
    pub fn get_u16(&self, tag: Tag) -> Option<u16> {
        self.entry(tag)?.inline_u16()
    }

    /// Inline u32 value for a tag.
    pub fn get_u32(&self, tag: Tag) -> Option<u32> {
        self.entry(tag)?.inline_u32()
    }

    /// Inline u64 value for a tag.
    pub fn get_u64(&self, tag: Tag) -> Option<u64> {
        self.entry(tag)?.inline_u64()
    }

    /// Image width in pixels.
    pub fn image_width(&self) -> Option<u32> {
        self.get_u32(Tag::ImageWidth)
    }

    /// Image height in pixels.
    pub fn image_height(&self) -> Option<u32> {
        self.get_u32(Tag::ImageLength)
    }

    /// Whether the IFD declares a tile layout.
    pub fn is_tiled(&self) -> bool {
        self.entry(Tag::TileWidth).is_some() && self.entry(Tag::TileLength).is_some()
    }

    /// Whether the IFD declares a strip layout.
    pub fn is_stripped(&self) -> bool {
        self.entry(Tag::StripOffsets).is_some()
    }

    /// Whether the IFD carries a non-empty `SubIFDs` tag.
    pub fn has_sub_ifds(&self) -> bool {
        self.entry(Tag::SubIfds).map_or(false, |e| e.count > 0)
    }

    /// Number of entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Header parsing
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_classic_header() {
        let header = [
            0x49, 0x49, // II
            0x2A, 0x00, // 42
            0x08, 0x00, 0x00, 0x00, // first IFD at 8
        ];
        let parsed = TiffHeader::parse(&header, 1000).unwrap();
        assert!(!parsed.big);
        assert_eq!(parsed.first_ifd_offset, 8);
        assert_eq!(parsed.header_size(), 8);
        assert_eq!(parsed.entry_size(), 12);
        assert_eq!(parsed.count_size(), 2);
        assert_eq!(parsed.value_field_size(), 4);
    }

    #[test]
    fn test_parse_bigtiff_header() {
        let header = [
            0x49, 0x49, // II
            0x2B, 0x00, // 43
            0x08, 0x00, // offset width 8
            0x00, 0x00, // reserved
            0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // first IFD at 16
        ];
        let parsed = TiffHeader::parse(&header, 1000).unwrap();
        assert!(parsed.big);
        assert_eq!(parsed.first_ifd_offset, 16);
        assert_eq!(parsed.header_size(), 16);
        assert_eq!(parsed.entry_size(), 20);
        assert_eq!(parsed.count_size(), 8);
        assert_eq!(parsed.value_field_size(), 8);
    }

    #[test]
    fn test_parse_bigtiff_large_offset() {
        let header = [
            0x49, 0x49, 0x2B, 0x00, 0x08, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, // 4GB
        ];
        let parsed = TiffHeader::parse(&header, 10_000_000_000).unwrap();
        assert_eq!(parsed.first_ifd_offset, 0x1_0000_0000);
    }

    #[test]
    fn test_reject_big_endian_marker() {
        let header = [0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08];
        let err = TiffHeader::parse(&header, 1000).unwrap_err();
        assert!(matches!(err, TiffError::BadMagic(0x4D4D)));
    }

    #[test]
    fn test_reject_unknown_version() {
        let header = [0x49, 0x49, 0x2C, 0x00, 0x08, 0x00, 0x00, 0x00];
        let err = TiffHeader::parse(&header, 1000).unwrap_err();
        assert!(matches!(err, TiffError::BadMagic(44)));
    }

    #[test]
    fn test_reject_bad_bigtiff_offset_width() {
        let header = [
            0x49, 0x49, 0x2B, 0x00, 0x04, 0x00, 0x00, 0x00, //
            0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert!(TiffHeader::parse(&header, 1000).is_err());
    }

    #[test]
    fn test_truncated_header() {
        let err = TiffHeader::parse(&[0x49, 0x49, 0x2A, 0x00], 1000).unwrap_err();
        assert!(matches!(err, TiffError::TruncatedFile { .. }));

        // BigTIFF claims 16 bytes but only 8 are present.
        let header = [0x49, 0x49, 0x2B, 0x00, 0x08, 0x00, 0x00, 0x00];
        let err = TiffHeader::parse(&header, 1000).unwrap_err();
        assert!(matches!(err, TiffError::TruncatedFile { .. }));
    }

    #[test]
    fn test_first_ifd_offset_out_of_bounds() {
        let header = [0x49, 0x49, 0x2A, 0x00, 0xE8, 0x03, 0x00, 0x00]; // IFD at 1000
        let err = TiffHeader::parse(&header, 500).unwrap_err();
        assert!(matches!(err, TiffError::BadOffset(1000)));
    }

    // -------------------------------------------------------------------------
    // Entry parsing
    // -------------------------------------------------------------------------

    fn classic_header() -> TiffHeader {
        TiffHeader {
            big: false,
            first_ifd_offset: 8,
        }
    }

    fn bigtiff_header() -> TiffHeader {
        TiffHeader {
            big: true,
            first_ifd_offset: 16,
        }
    }

    #[test]
    fn test_entry_inline_short() {
        // ImageWidth = 1024, SHORT, count 1
        let bytes = [
            0x00, 0x01, // tag 256
            0x03, 0x00, // SHORT
            0x01, 0x00, 0x00, 0x00, // count 1
            0x00, 0x04, 0x00, 0x00, // 1024
        ];
        let entry = IfdEntry::parse(&bytes, &classic_header());
        assert_eq!(entry.tag(), Some(Tag::ImageWidth));
        assert!(entry.is_inline);
        assert_eq!(entry.inline_u16(), Some(1024));
        assert_eq!(entry.inline_u32(), Some(1024));
        assert_eq!(entry.inline_u64(), Some(1024));
    }

    #[test]
    fn test_entry_offset_array() {
        // TileOffsets, LONG, count 100 at offset 1000
        let bytes = [
            0x44, 0x01, // tag 324
            0x04, 0x00, // LONG
            0x64, 0x00, 0x00, 0x00, // count 100
            0xE8, 0x03, 0x00, 0x00, // offset 1000
        ];
        let entry = IfdEntry::parse(&bytes, &classic_header());
        assert_eq!(entry.tag(), Some(Tag::TileOffsets));
        assert!(!entry.is_inline);
        assert_eq!(entry.value_offset(), 1000);
        assert_eq!(entry.value_byte_size(), Some(400));
    }

    #[test]
    fn test_entry_bigtiff_long8() {
        let bytes = [
            0x00, 0x01, // tag 256
            0x10, 0x00, // LONG8
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // count 1
            0xA0, 0x86, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, // 100000
        ];
        let entry = IfdEntry::parse(&bytes, &bigtiff_header());
        assert!(entry.is_inline);
        assert_eq!(entry.inline_u64(), Some(100_000));
    }

    #[test]
    fn test_entry_unknown_type() {
        let bytes = [
            0x00, 0x01, // tag 256
            0x63, 0x00, // type 99
            0x01, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00,
        ];
        let entry = IfdEntry::parse(&bytes, &classic_header());
        assert_eq!(entry.field_type, None);
        assert_eq!(entry.field_type_raw, 99);
        assert!(!entry.is_inline);
    }

    // -------------------------------------------------------------------------
    // IFD parsing
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_classic_ifd() {
        let bytes = [
            0x03, 0x00, // 3 entries
            // ImageWidth = 1024
            0x00, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00,
            // ImageLength = 768
            0x01, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00,
            // Compression = 8
            0x03, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00,
            // next IFD = 500
            0xF4, 0x01, 0x00, 0x00,
        ];
        let ifd = Ifd::parse(&bytes, 8, &classic_header()).unwrap();
        assert_eq!(ifd.offset, 8);
        assert_eq!(ifd.entry_count(), 3);
        assert_eq!(ifd.next_ifd_offset, 500);
        assert_eq!(ifd.image_width(), Some(1024));
        assert_eq!(ifd.image_height(), Some(768));
        assert_eq!(ifd.get_u16(Tag::Compression), Some(8));
        assert!(ifd.entry(Tag::TileWidth).is_none());
    }

    #[test]
    fn test_parse_bigtiff_ifd() {
        let bytes = [
            0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 2 entries
            // ImageWidth = 50000
            0x00, 0x01, 0x04, 0x00, //
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            0x50, 0xC3, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            // ImageLength = 40000
            0x01, 0x01, 0x04, 0x00, //
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            0x40, 0x9C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            // next IFD = 0
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let ifd = Ifd::parse(&bytes, 16, &bigtiff_header()).unwrap();
        assert_eq!(ifd.entry_count(), 2);
        assert_eq!(ifd.next_ifd_offset, 0);
        assert_eq!(ifd.image_width(), Some(50_000));
        assert_eq!(ifd.image_height(), Some(40_000));
    }

    #[test]
    fn test_parse_tiled_ifd() {
        let bytes = [
            0x04, 0x00, // 4 entries
            // ImageWidth = 10000
            0x00, 0x01, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x27, 0x00, 0x00,
            // ImageLength = 8000
            0x01, 0x01, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x40, 0x1F, 0x00, 0x00,
            // TileWidth = 256
            0x42, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
            // TileLength = 256
            0x43, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
            // next IFD = 0
            0x00, 0x00, 0x00, 0x00,
        ];
        let ifd = Ifd::parse(&bytes, 8, &classic_header()).unwrap();
        assert!(ifd.is_tiled());
        assert!(!ifd.is_stripped());
        assert_eq!(ifd.get_u32(Tag::TileWidth), Some(256));
        assert_eq!(ifd.get_u32(Tag::TileLength), Some(256));
    }

    #[test]
    fn test_parse_truncated_ifd() {
        // Declares 5 entries but provides fewer bytes.
        let bytes = [
            0x05, 0x00, //
            0x00, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00,
        ];
        let err = Ifd::parse(&bytes, 8, &classic_header()).unwrap_err();
        assert!(matches!(err, TiffError::TruncatedFile { .. }));
    }

    #[test]
    fn test_structure_size() {
        assert_eq!(Ifd::structure_size(10, &classic_header()), 126);
        assert_eq!(Ifd::structure_size(10, &bigtiff_header()), 216);
    }
}
