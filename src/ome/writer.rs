//! OME-XML generation for the writer path.
//!
//! Emits the document embedded in the first IFD's `ImageDescription`.
//! The output is deliberately small: one `Image`, one `Pixels`, the
//! channels, and a single `TiffData`, which is exactly the subset the
//! parser recognises. Feeding the output back through the parser
//! reproduces the dimension sizes, element type, dimension order and
//! channel identifiers.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::dtype::ArrayDtype;

use super::model::DimensionOrder;

/// Namespace of the OME 2016-06 schema.
pub const OME_NAMESPACE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";

const DEFAULT_CREATOR: &str = concat!("ome-tiff-zarr ", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Description
// =============================================================================

/// A physical size along one spatial axis.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalSize {
    /// Size of one pixel along the axis
    pub value: f64,

    /// Unit name as used on the Zarr side (`"micrometer"`, ...)
    pub unit: Option<String>,
}

/// One channel to declare.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSpec {
    /// Identifier; `Channel:0:<i>` is substituted when absent
    pub id: Option<String>,

    pub name: Option<String>,

    /// Packed signed 32-bit RGBA colour
    pub color: Option<i32>,
}

/// Everything the generator needs to emit a document.
#[derive(Debug, Clone)]
pub struct OmeXmlDescription {
    pub image_name: Option<String>,
    pub creator: Option<String>,

    pub dtype: ArrayDtype,
    pub dimension_order: DimensionOrder,

    pub size_x: u64,
    pub size_y: u64,
    pub size_z: u64,
    pub size_c: u64,
    pub size_t: u64,

    pub physical_size_x: Option<PhysicalSize>,
    pub physical_size_y: Option<PhysicalSize>,
    pub physical_size_z: Option<PhysicalSize>,

    pub channels: Vec<ChannelSpec>,
}

// =============================================================================
// Generation
// =============================================================================

/// Build the OME-XML document for a write.
pub fn build_ome_xml(desc: &OmeXmlDescription) -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");

    let creator = desc.creator.as_deref().unwrap_or(DEFAULT_CREATOR);
    let _ = write!(
        xml,
        "<OME xmlns=\"{OME_NAMESPACE}\" Creator=\"{}\">",
        xml_escape(creator)
    );

    let name = desc.image_name.as_deref().unwrap_or("Image");
    let _ = write!(
        xml,
        "<Image ID=\"Image:0\" Name=\"{}\">",
        xml_escape(name)
    );

    let _ = write!(
        xml,
        "<Pixels ID=\"Pixels:0\" Type=\"{}\" SizeX=\"{}\" SizeY=\"{}\" SizeZ=\"{}\" SizeC=\"{}\" SizeT=\"{}\" DimensionOrder=\"{}\" BigEndian=\"false\"",
        desc.dtype.ome_name(),
        desc.size_x,
        desc.size_y,
        desc.size_z,
        desc.size_c,
        desc.size_t,
        desc.dimension_order.as_str(),
    );
    write_physical_size(&mut xml, "X", desc.physical_size_x.as_ref());
    write_physical_size(&mut xml, "Y", desc.physical_size_y.as_ref());
    write_physical_size(&mut xml, "Z", desc.physical_size_z.as_ref());
    xml.push('>');

    for (index, channel) in desc.channels.iter().enumerate() {
        let id: Cow<str> = match &channel.id {
            Some(id) => Cow::Borrowed(id.as_str()),
            None => Cow::Owned(format!("Channel:0:{index}")),
        };
        let _ = write!(xml, "<Channel ID=\"{}\"", xml_escape(&id));
        if let Some(name) = &channel.name {
            let _ = write!(xml, " Name=\"{}\"", xml_escape(name));
        }
        xml.push_str(" SamplesPerPixel=\"1\"");
        if let Some(color) = channel.color {
            let _ = write!(xml, " Color=\"{color}\"");
        }
        xml.push_str("/>");
    }

    xml.push_str("<TiffData/>");
    xml.push_str("</Pixels></Image></OME>");
    xml
}

fn write_physical_size(xml: &mut String, axis: &str, size: Option<&PhysicalSize>) {
    let Some(size) = size else { return };
    let symbol = size
        .unit
        .as_deref()
        .map(ome_unit_symbol)
        .unwrap_or(super::model::DEFAULT_PHYSICAL_UNIT);
    let _ = write!(
        xml,
        " PhysicalSize{axis}=\"{}\" PhysicalSize{axis}Unit=\"{}\"",
        size.value,
        xml_escape(symbol)
    );
}

// =============================================================================
// Units
// =============================================================================

/// Map a Zarr-side unit name to the OME unit symbol.
///
/// Unknown names pass through verbatim.
pub fn ome_unit_symbol(unit: &str) -> &str {
    match unit {
        "angstrom" => "Å",
        "picometer" => "pm",
        "nanometer" => "nm",
        "micrometer" => "µm",
        "millimeter" => "mm",
        "centimeter" => "cm",
        "meter" => "m",
        "kilometer" => "km",
        other => other,
    }
}

/// Map an OME unit symbol back to the Zarr-side unit name.
///
/// Inverse of [`ome_unit_symbol`]; unknown symbols pass through.
pub fn zarr_unit_name(symbol: &str) -> &str {
    match symbol {
        "Å" => "angstrom",
        "pm" => "picometer",
        "nm" => "nanometer",
        "µm" | "um" => "micrometer",
        "mm" => "millimeter",
        "cm" => "centimeter",
        "m" => "meter",
        "km" => "kilometer",
        other => other,
    }
}

// =============================================================================
// Escaping
// =============================================================================

/// Escape a string for use in an XML attribute value.
pub fn xml_escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

// =============================================================================
// Tests
// =============================================================================
