use crate::dtype::ArrayDtype;
use crate::error::OmeXmlError;

/// Default unit for physical pixel sizes when the XML omits one.
pub const DEFAULT_PHYSICAL_UNIT: &str = "µm";

// =============================================================================
// DimensionOrder
// =============================================================================

/// The axis that varies at a given position of a dimension order tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneAxis {
    C,
    Z,
    T,
}

/// The linear ordering of planes relative to the Z/C/T index variables.
///
/// OME constrains the order to `XY` followed by one of the six
/// permutations of `{Z, C, T}`. The set is closed: lowercase or
/// otherwise ill-formed values are rejected, not defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionOrder {
    Xyzct,
    Xyztc,
    Xyczt,
    Xyctz,
    Xytzc,
    Xytcz,
}

impl DimensionOrder {
    /// Parse the exact OME spelling (`"XYZCT"`, ...).
    pub fn parse(value: &str) -> Result<Self, OmeXmlError> {
        match value {
            "XYZCT" => Ok(DimensionOrder::Xyzct),
            "XYZTC" => Ok(DimensionOrder::Xyztc),
            "XYCZT" => Ok(DimensionOrder::Xyczt),
            "XYCTZ" => Ok(DimensionOrder::Xyctz),
            "XYTZC" => Ok(DimensionOrder::Xytzc),
            "XYTCZ" => Ok(DimensionOrder::Xytcz),
            _ => Err(OmeXmlError::InvalidDimensionOrder(value.to_string())),
        }
    }

    /// The OME spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            DimensionOrder::Xyzct => "XYZCT",
            DimensionOrder::Xyztc => "XYZTC",
            DimensionOrder::Xyczt => "XYCZT",
            DimensionOrder::Xyctz => "XYCTZ",
            DimensionOrder::Xytzc => "XYTZC",
            DimensionOrder::Xytcz => "XYTCZ",
        }
    }

    /// The tail after `XY`, fastest-varying axis first.
    ///
    /// `XYZCT` means Z varies fastest across consecutive planes, then C,
    /// then T.
    pub const fn tail(self) -> [PlaneAxis; 3] {
        match self {
            DimensionOrder::Xyzct => [PlaneAxis::Z, PlaneAxis::C, PlaneAxis::T],
            DimensionOrder::Xyztc => [PlaneAxis::Z, PlaneAxis::T, PlaneAxis::C],
            DimensionOrder::Xyczt => [PlaneAxis::C, PlaneAxis::Z, PlaneAxis::T],
            DimensionOrder::Xyctz => [PlaneAxis::C, PlaneAxis::T, PlaneAxis::Z],
            DimensionOrder::Xytzc => [PlaneAxis::T, PlaneAxis::Z, PlaneAxis::C],
            DimensionOrder::Xytcz => [PlaneAxis::T, PlaneAxis::C, PlaneAxis::Z],
        }
    }

    /// All six orders, for exhaustive inverse tests.
    pub const ALL: [DimensionOrder; 6] = [
        DimensionOrder::Xyzct,
        DimensionOrder::Xyztc,
        DimensionOrder::Xyczt,
        DimensionOrder::Xyctz,
        DimensionOrder::Xytzc,
        DimensionOrder::Xytcz,
    ];
}

impl Default for DimensionOrder {
    fn default() -> Self {
        DimensionOrder::Xyzct
    }
}

// =============================================================================
// Channels and TiffData
// =============================================================================

/// One OME `Channel` element.
#[derive(Debug, Clone, PartialEq)]
pub struct OmeChannel {
    /// Channel identifier (`Channel:0:<i>` when absent in the XML)
    pub id: String,

    /// Optional display name
    pub name: Option<String>,

    /// Samples per pixel (1 unless declared otherwise)
    pub samples_per_pixel: u32,

    /// Packed signed 32-bit RGBA colour, if declared
    pub color: Option<i32>,
}

impl OmeChannel {
    /// A default channel with the conventional synthesized identifier.
    pub fn synthesized(index: usize) -> Self {
        OmeChannel {
            id: format!("Channel:0:{index}"),
            name: None,
            samples_per_pixel: 1,
            color: None,
        }
    }
}

/// One OME `TiffData` element: a run of planes mapped to an IFD, with
/// optional routing to another file of a multi-file set.
#[derive(Debug, Clone, PartialEq)]
pub struct TiffDataEntry {
    pub first_c: usize,
    pub first_z: usize,
    pub first_t: usize,

    /// IFD index in the target file
    pub ifd: usize,

    /// Number of consecutive planes covered by this entry
    pub plane_count: usize,

    /// UUID of the file holding these planes (absent = this file)
    pub uuid: Option<String>,

    /// File name hint carried alongside the UUID
    pub file_name: Option<String>,
}

// =============================================================================
// OmePixels
// =============================================================================

/// The `Pixels` element of an OME image: the 5D shape and everything
/// needed to locate and type its planes.
#[derive(Debug, Clone, PartialEq)]
pub struct OmePixels {
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    pub size_c: u32,
    pub size_t: u32,

    pub dimension_order: DimensionOrder,

    /// Element type of the pixel buffer
    pub dtype: ArrayDtype,

    pub physical_size_x: Option<f64>,
    pub physical_size_y: Option<f64>,
    pub physical_size_z: Option<f64>,
    pub physical_size_x_unit: String,
    pub physical_size_y_unit: String,
    pub physical_size_z_unit: String,

    pub big_endian: bool,
    pub interleaved: bool,

    /// Channels in document order; never empty after parsing
    pub channels: Vec<OmeChannel>,

    /// Declared plane→IFD routing entries, if any
    pub tiff_data: Vec<TiffDataEntry>,
}

impl OmePixels {
    /// A minimal description for a plain 2D image.
    pub fn flat(size_x: u32, size_y: u32, dtype: ArrayDtype) -> Self {
        OmePixels {
            size_x,
            size_y,
            size_z: 1,
            size_c: 1,
            size_t: 1,
            dimension_order: DimensionOrder::default(),
            dtype,
            physical_size_x: None,
            physical_size_y: None,
            physical_size_z: None,
            physical_size_x_unit: DEFAULT_PHYSICAL_UNIT.to_string(),
            physical_size_y_unit: DEFAULT_PHYSICAL_UNIT.to_string(),
            physical_size_z_unit: DEFAULT_PHYSICAL_UNIT.to_string(),
            big_endian: false,
            interleaved: false,
            channels: vec![OmeChannel::synthesized(0)],
            tiff_data: Vec::new(),
        }
    }

    /// Total planes: `sizeC * sizeZ * sizeT`.
    pub fn plane_count(&self) -> usize {
        self.size_c as usize * self.size_z as usize * self.size_t as usize
    }
}

// =============================================================================
// OmeImage / ParsedOme
// =============================================================================

/// One `Image` element with its `Pixels`.
#[derive(Debug, Clone, PartialEq)]
pub struct OmeImage {
    pub id: Option<String>,
    pub name: Option<String>,
    pub pixels: OmePixels,
}

/// The parsed subset of an OME document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOme {
    /// Images in document order
    pub images: Vec<OmeImage>,

    /// The root `OME` element's `UUID` attribute, used for multi-file
    /// routing
    pub root_uuid: Option<String>,
}

impl ParsedOme {
    /// The first image's pixels, if any image was declared.
    pub fn primary_pixels(&self) -> Option<&OmePixels> {
        self.images.first().map(|image| &image.pixels)
    }
}
