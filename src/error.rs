//! Error types for the OME-TIFF / OME-Zarr bridge.
//!
//! Errors are grouped per domain: byte-source I/O, the TIFF container
//! codec, OME-XML handling, dtype resolution, plane/level lookup, and
//! the write orchestrator. Conversions between them follow the call
//! graph, so every failure surfaces at the originating API call with
//! its original kind intact.

use thiserror::Error;

// =============================================================================
// IoError
// =============================================================================

/// I/O errors produced by byte sources.
#[derive(Debug, Error)]
pub enum IoError {
    /// A read extended past the end of the resource.
    #[error("truncated read: requested {requested} bytes at offset {offset}, size is {size}")]
    TruncatedRead {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Underlying operating-system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation observed a cancellation signal.
    #[error("operation cancelled")]
    Cancelled,
}

// =============================================================================
// TiffError
// =============================================================================

/// Failures of the TIFF container codec, covering both the read and the
/// write direction.
#[derive(Debug, Error)]
pub enum TiffError {
    /// The file ended before a required structure could be read.
    #[error("truncated file: requested {requested} bytes at offset {offset}, size is {size}")]
    TruncatedFile {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// The header does not carry the "II" marker or a known version (42/43).
    #[error("bad TIFF magic: 0x{0:04X}")]
    BadMagic(u16),

    /// An absolute offset points outside the file or forms a cycle.
    #[error("bad offset: {0}")]
    BadOffset(u64),

    /// An IFD entry's declared type does not fit its tag.
    #[error("bad type {type_code} for tag {tag}")]
    BadTagType { tag: u16, type_code: u16 },

    /// The IFD's tags describe a pixel layout the codec cannot service.
    #[error("unsupported tag combination: {0}")]
    UnsupportedTagCombination(&'static str),

    /// Deflate stream could not be decoded.
    #[error("corrupt compressed data: {0}")]
    CompressionCorrupt(String),

    /// A classic-format file would exceed the 32-bit offset space.
    #[error("file too large for classic TIFF: {required} bytes exceeds limit {limit}")]
    FileTooLarge { required: u64, limit: u64 },

    /// Underlying operating-system error.
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    /// The operation observed a cancellation signal.
    #[error("operation cancelled")]
    Cancelled,

    /// Pixel element type outside the supported set.
    #[error(transparent)]
    Dtype(#[from] DtypeError),
}

impl From<IoError> for TiffError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::TruncatedRead {
                offset,
                requested,
                size,
            } => TiffError::TruncatedFile {
                offset,
                requested,
                size,
            },
            IoError::Io(err) => TiffError::Io(err),
            IoError::Cancelled => TiffError::Cancelled,
        }
    }
}

// =============================================================================
// OmeXmlError
// =============================================================================

/// Failures while parsing or generating an OME-XML document.
#[derive(Debug, Error)]
pub enum OmeXmlError {
    /// The text is not well-formed enough to scan.
    #[error("invalid OME-XML: {0}")]
    InvalidXml(String),

    /// `DimensionOrder` is not one of the six `XY{Z,C,T}` permutations.
    #[error("invalid dimension order: {0:?}")]
    InvalidDimensionOrder(String),

    /// The `Pixels` `Type` attribute names an unsupported element type.
    #[error(transparent)]
    Dtype(#[from] DtypeError),
}

// =============================================================================
// DtypeError
// =============================================================================

/// The requested element type is outside the supported bijection.
#[derive(Debug, Error)]
pub enum DtypeError {
    /// No array dtype exists for this TIFF sample format / bit depth pair.
    #[error("unsupported dtype: sample format {sample_format} with {bits} bits per sample")]
    UnsupportedTiff { sample_format: u16, bits: u16 },

    /// The OME type name does not map to a supported array dtype.
    #[error("unsupported dtype: OME type {0:?}")]
    UnsupportedOmeType(String),
}

// =============================================================================
// IndexError
// =============================================================================

/// Plane/level lookup failures in the plane↔IFD indexer.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The requested pyramid level does not exist.
    #[error("no such level: {level} (file has {levels})")]
    NoSuchLevel { level: usize, levels: usize },

    /// The requested `(c, z, t)` selection is outside the declared sizes
    /// or absent from the multi-file plane map.
    #[error("no such plane: c={c} z={z} t={t}")]
    NoSuchPlane { c: usize, z: usize, t: usize },
}

// =============================================================================
// StoreError
// =============================================================================

/// Failures surfaced by the Zarr-key read facade.
///
/// Key lookup misses are *not* errors; the facade reports those as
/// `Ok(None)`. This type only carries genuine decode failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Tiff(#[from] TiffError),

    #[error(transparent)]
    Xml(#[from] OmeXmlError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<IoError> for StoreError {
    fn from(err: IoError) -> Self {
        StoreError::Tiff(err.into())
    }
}

// =============================================================================
// WriteError
// =============================================================================

/// Failures of the OME-TIFF write orchestrator.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Tiff(#[from] TiffError),

    /// A plane reader callback failed.
    #[error("plane read failed for level {level}, c={c} z={z} t={t}: {source}")]
    PlaneRead {
        level: usize,
        c: usize,
        z: usize,
        t: usize,
        source: IoError,
    },

    /// A plane reader returned a buffer of the wrong length.
    #[error("plane buffer length mismatch: expected {expected} bytes, got {actual}")]
    PlaneLength { expected: usize, actual: usize },

    /// The multiscale description is internally inconsistent.
    #[error("invalid multiscale description: {0}")]
    InvalidMultiscale(String),

    /// The operation observed a cancellation signal.
    #[error("operation cancelled")]
    Cancelled,
}
