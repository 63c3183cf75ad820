//! TIFF tag and field type definitions.
//!
//! The vocabulary for both directions of the container codec: field
//! types that determine how values are encoded, tag IDs that identify
//! metadata fields, and the compression scheme identifiers. Supports
//! classic TIFF and BigTIFF.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Each type has a fixed size in bytes, which decides whether a value
/// fits inline in an IFD entry and how arrays are laid out. Types not
/// listed here are skipped during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer (1 byte)
    Byte = 1,

    /// 8-bit ASCII character, NUL-terminated payloads (1 byte)
    Ascii = 2,

    /// Unsigned 16-bit integer (2 bytes)
    Short = 3,

    /// Unsigned 32-bit integer (4 bytes)
    Long = 4,

    /// Two unsigned 32-bit integers, numerator/denominator (8 bytes)
    Rational = 5,

    /// Undefined byte data (1 byte per element)
    Undefined = 7,

    /// Unsigned 64-bit integer (8 bytes), BigTIFF only
    Long8 = 16,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 => 8,
        }
    }

    /// Create a FieldType from its numeric code.
    ///
    /// Returns `None` for unknown codes; the entry is then skipped,
    /// not rejected.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            7 => Some(FieldType::Undefined),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }

    /// Get the numeric type code.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Maximum bytes stored inline in a classic TIFF entry.
    pub const INLINE_THRESHOLD_CLASSIC: usize = 4;

    /// Maximum bytes stored inline in a BigTIFF entry.
    pub const INLINE_THRESHOLD_BIGTIFF: usize = 8;

    /// Whether a value with this type and count fits in the entry's
    /// value field.
    #[inline]
    pub fn fits_inline(self, count: u64, big: bool) -> bool {
        let total = self.size_in_bytes() as u64 * count;
        let threshold = if big {
            Self::INLINE_THRESHOLD_BIGTIFF
        } else {
            Self::INLINE_THRESHOLD_CLASSIC
        };
        total <= threshold as u64
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs the bridge reads or writes.
///
/// Tags not listed here are ignored during parsing and never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Tag {
    // -------------------------------------------------------------------------
    // Basic image structure
    // -------------------------------------------------------------------------
    /// Subfile category; 1 marks a reduced-resolution image
    NewSubfileType = 254,

    /// Image width in pixels
    ImageWidth = 256,

    /// Image height (length) in pixels
    ImageLength = 257,

    /// Bits per sample
    BitsPerSample = 258,

    /// Compression scheme
    Compression = 259,

    /// Photometric interpretation (1 = MinIsBlack)
    PhotometricInterpretation = 262,

    /// Description string; holds OME-XML on the first IFD
    ImageDescription = 270,

    /// Components per pixel
    SamplesPerPixel = 277,

    /// Component organisation (1 = chunky)
    PlanarConfiguration = 284,

    /// Numeric interpretation of samples (1 = uint, 2 = int, 3 = float)
    SampleFormat = 339,

    // -------------------------------------------------------------------------
    // Strip organisation
    // -------------------------------------------------------------------------
    /// Rows per strip
    RowsPerStrip = 278,

    /// Byte offset of each strip
    StripOffsets = 273,

    /// Byte count of each strip
    StripByteCounts = 279,

    // -------------------------------------------------------------------------
    // Tile organisation
    // -------------------------------------------------------------------------
    /// Width of each tile in pixels
    TileWidth = 322,

    /// Height (length) of each tile in pixels
    TileLength = 323,

    /// Byte offset of each tile
    TileOffsets = 324,

    /// Byte count of each tile
    TileByteCounts = 325,

    // -------------------------------------------------------------------------
    // Pyramid structure
    // -------------------------------------------------------------------------
    /// Absolute offsets of child IFDs holding sub-resolutions
    SubIfds = 330,
}

impl Tag {
    /// Create a Tag from its numeric ID.
    ///
    /// Returns `None` for unrecognised tags; unknown tags are ignored
    /// during parsing.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            254 => Some(Tag::NewSubfileType),
            256 => Some(Tag::ImageWidth),
            257 => Some(Tag::ImageLength),
            258 => Some(Tag::BitsPerSample),
            259 => Some(Tag::Compression),
            262 => Some(Tag::PhotometricInterpretation),
            270 => Some(Tag::ImageDescription),
            273 => Some(Tag::StripOffsets),
            277 => Some(Tag::SamplesPerPixel),
            278 => Some(Tag::RowsPerStrip),
            279 => Some(Tag::StripByteCounts),
            284 => Some(Tag::PlanarConfiguration),
            322 => Some(Tag::TileWidth),
            323 => Some(Tag::TileLength),
            324 => Some(Tag::TileOffsets),
            325 => Some(Tag::TileByteCounts),
            330 => Some(Tag::SubIfds),
            339 => Some(Tag::SampleFormat),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// Compression values
// =============================================================================

/// TIFF compression scheme identifiers.
///
/// Only uncompressed data and deflate are serviced; other schemes are
/// recognised for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    /// No compression
    None = 1,

    /// LZW (not supported)
    Lzw = 5,

    /// JPEG (not supported)
    Jpeg = 7,

    /// Deflate with zlib framing (supported)
    Deflate = 8,

    /// Legacy Adobe code for the same deflate framing (supported)
    AdobeDeflate = 32946,
}

impl Compression {
    /// Create a Compression from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            32946 => Some(Compression::AdobeDeflate),
            _ => None,
        }
    }

    /// Get the numeric value.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether the codec can decode this scheme.
    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(
            self,
            Compression::None | Compression::Deflate | Compression::AdobeDeflate
        )
    }

    /// Whether tiles of this scheme go through the deflate codec.
    #[inline]
    pub const fn is_deflate(self) -> bool {
        matches!(self, Compression::Deflate | Compression::AdobeDeflate)
    }
}

/// `PhotometricInterpretation` emitted on every IFD.
pub const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;

/// `PlanarConfiguration` emitted on every IFD.
pub const PLANAR_CHUNKY: u16 = 1;

/// `NewSubfileType` value marking a reduced-resolution image.
pub const SUBFILE_REDUCED_IMAGE: u32 = 1;

// =============================================================================
// Tests
// =============================================================================
