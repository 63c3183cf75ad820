//! OME data model, XML parsing and XML generation.
//!
//! The bounded schema subset handled here (`Image`, `Pixels`,
//! `Channel`, `TiffData`, `UUID`) is what OME-TIFF writers embed in the
//! first IFD's `ImageDescription` and everything the bridge needs to
//! reconcile the two data models.

pub mod model;
pub mod parser;
pub mod writer;

pub use model::{
    DimensionOrder, OmeChannel, OmeImage, OmePixels, ParsedOme, PlaneAxis, TiffDataEntry,
};
pub use parser::{is_ome_xml, parse_ome_xml};
pub use writer::{
    build_ome_xml, ome_unit_symbol, zarr_unit_name, ChannelSpec, OmeXmlDescription, PhysicalSize,
};
