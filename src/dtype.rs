//! Pixel element types and their three on-disk spellings.
//!
//! The same element type appears in three independent places: TIFF tags
//! (`SampleFormat` + `BitsPerSample`), OME-XML text (`Pixels` `Type`),
//! and Zarr JSON (`data_type`). This module is the single source of
//! truth for the bijection between them; everything else dispatches on
//! these closed enums.

use crate::error::DtypeError;

// =============================================================================
// SampleFormat
// =============================================================================

/// TIFF `SampleFormat` tag values for the supported numeric families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SampleFormat {
    /// Unsigned integer samples
    Uint = 1,

    /// Two's-complement signed integer samples
    Int = 2,

    /// IEEE floating point samples
    Float = 3,
}

impl SampleFormat {
    /// Create a SampleFormat from the tag value.
    ///
    /// Returns `None` for formats outside the supported set (void,
    /// complex, etc.).
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(SampleFormat::Uint),
            2 => Some(SampleFormat::Int),
            3 => Some(SampleFormat::Float),
            _ => None,
        }
    }

    /// Get the numeric tag value.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// ArrayDtype
// =============================================================================

/// Canonical element type on the array side.
///
/// One of the eight types representable in all three spellings. 64-bit
/// integers and 16-bit floats exist in TIFF but have no counterpart in
/// the supported set and fail with [`DtypeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayDtype {
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Float32,
    Float64,
}

impl ArrayDtype {
    /// Resolve a TIFF `(SampleFormat, BitsPerSample)` pair.
    pub fn from_tiff(format: SampleFormat, bits: u16) -> Result<Self, DtypeError> {
        match (format, bits) {
            (SampleFormat::Uint, 8) => Ok(ArrayDtype::Uint8),
            (SampleFormat::Uint, 16) => Ok(ArrayDtype::Uint16),
            (SampleFormat::Uint, 32) => Ok(ArrayDtype::Uint32),
            (SampleFormat::Int, 8) => Ok(ArrayDtype::Int8),
            (SampleFormat::Int, 16) => Ok(ArrayDtype::Int16),
            (SampleFormat::Int, 32) => Ok(ArrayDtype::Int32),
            (SampleFormat::Float, 32) => Ok(ArrayDtype::Float32),
            (SampleFormat::Float, 64) => Ok(ArrayDtype::Float64),
            _ => Err(DtypeError::UnsupportedTiff {
                sample_format: format.as_u16(),
                bits,
            }),
        }
    }

    /// Resolve an OME `Pixels` `Type` string (case-insensitive).
    ///
    /// `"float"` maps to `Float32` and `"double"` to `Float64`; the
    /// integer names map literally.
    pub fn from_ome(name: &str) -> Result<Self, DtypeError> {
        match name.to_ascii_lowercase().as_str() {
            "int8" => Ok(ArrayDtype::Int8),
            "int16" => Ok(ArrayDtype::Int16),
            "int32" => Ok(ArrayDtype::Int32),
            "uint8" => Ok(ArrayDtype::Uint8),
            "uint16" => Ok(ArrayDtype::Uint16),
            "uint32" => Ok(ArrayDtype::Uint32),
            "float" | "float32" => Ok(ArrayDtype::Float32),
            "double" | "float64" => Ok(ArrayDtype::Float64),
            _ => Err(DtypeError::UnsupportedOmeType(name.to_string())),
        }
    }

    /// The OME `Pixels` `Type` spelling.
    pub const fn ome_name(self) -> &'static str {
        match self {
            ArrayDtype::Int8 => "int8",
            ArrayDtype::Int16 => "int16",
            ArrayDtype::Int32 => "int32",
            ArrayDtype::Uint8 => "uint8",
            ArrayDtype::Uint16 => "uint16",
            ArrayDtype::Uint32 => "uint32",
            ArrayDtype::Float32 => "float",
            ArrayDtype::Float64 => "double",
        }
    }

    /// The Zarr `data_type` spelling.
    pub const fn zarr_name(self) -> &'static str {
        match self {
            ArrayDtype::Int8 => "int8",
            ArrayDtype::Int16 => "int16",
            ArrayDtype::Int32 => "int32",
            ArrayDtype::Uint8 => "uint8",
            ArrayDtype::Uint16 => "uint16",
            ArrayDtype::Uint32 => "uint32",
            ArrayDtype::Float32 => "float32",
            ArrayDtype::Float64 => "float64",
        }
    }

    /// The TIFF `(SampleFormat, BitsPerSample)` pair.
    pub const fn tiff_format(self) -> (SampleFormat, u16) {
        match self {
            ArrayDtype::Int8 => (SampleFormat::Int, 8),
            ArrayDtype::Int16 => (SampleFormat::Int, 16),
            ArrayDtype::Int32 => (SampleFormat::Int, 32),
            ArrayDtype::Uint8 => (SampleFormat::Uint, 8),
            ArrayDtype::Uint16 => (SampleFormat::Uint, 16),
            ArrayDtype::Uint32 => (SampleFormat::Uint, 32),
            ArrayDtype::Float32 => (SampleFormat::Float, 32),
            ArrayDtype::Float64 => (SampleFormat::Float, 64),
        }
    }

    /// Bytes per element: 1, 2, 4 or 8.
    pub const fn bytes_per_element(self) -> usize {
        match self {
            ArrayDtype::Int8 | ArrayDtype::Uint8 => 1,
            ArrayDtype::Int16 | ArrayDtype::Uint16 => 2,
            ArrayDtype::Int32 | ArrayDtype::Uint32 | ArrayDtype::Float32 => 4,
            ArrayDtype::Float64 => 8,
        }
    }

    /// All supported dtypes, for exhaustive round-trip tests.
    pub const ALL: [ArrayDtype; 8] = [
        ArrayDtype::Int8,
        ArrayDtype::Int16,
        ArrayDtype::Int32,
        ArrayDtype::Uint8,
        ArrayDtype::Uint16,
        ArrayDtype::Uint32,
        ArrayDtype::Float32,
        ArrayDtype::Float64,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiff_round_trip() {
        for dtype in ArrayDtype::ALL {
            let (format, bits) = dtype.tiff_format();
            assert_eq!(ArrayDtype::from_tiff(format, bits).unwrap(), dtype);
        }
    }

    #[test]
    fn test_ome_round_trip() {
        for dtype in ArrayDtype::ALL {
            assert_eq!(ArrayDtype::from_ome(dtype.ome_name()).unwrap(), dtype);
        }
    }

    #[test]
    fn test_ome_aliases() {
        assert_eq!(ArrayDtype::from_ome("float").unwrap(), ArrayDtype::Float32);
        assert_eq!(ArrayDtype::from_ome("double").unwrap(), ArrayDtype::Float64);
        assert_eq!(ArrayDtype::from_ome("UINT16").unwrap(), ArrayDtype::Uint16);
        assert_eq!(ArrayDtype::from_ome("Int8").unwrap(), ArrayDtype::Int8);
    }

    #[test]
    fn test_unsupported_combinations() {
        // 16-bit float
        assert!(ArrayDtype::from_tiff(SampleFormat::Float, 16).is_err());
        // 64-bit integers
        assert!(ArrayDtype::from_tiff(SampleFormat::Uint, 64).is_err());
        assert!(ArrayDtype::from_tiff(SampleFormat::Int, 64).is_err());
        // 8-bit float
        assert!(ArrayDtype::from_tiff(SampleFormat::Float, 8).is_err());

        assert!(ArrayDtype::from_ome("complex64").is_err());
        assert!(ArrayDtype::from_ome("bit").is_err());
    }

    #[test]
    fn test_bytes_per_element() {
        assert_eq!(ArrayDtype::Uint8.bytes_per_element(), 1);
        assert_eq!(ArrayDtype::Int16.bytes_per_element(), 2);
        assert_eq!(ArrayDtype::Float32.bytes_per_element(), 4);
        assert_eq!(ArrayDtype::Float64.bytes_per_element(), 8);
    }

    #[test]
    fn test_sample_format_from_u16() {
        assert_eq!(SampleFormat::from_u16(1), Some(SampleFormat::Uint));
        assert_eq!(SampleFormat::from_u16(2), Some(SampleFormat::Int));
        assert_eq!(SampleFormat::from_u16(3), Some(SampleFormat::Float));
        assert_eq!(SampleFormat::from_u16(4), None);
        assert_eq!(SampleFormat::from_u16(0), None);
    }
}
