//! OME-XML parsing.
//!
//! Extracts the bounded subset of the OME schema the bridge needs:
//! `Image`, `Pixels`, `Channel`, `TiffData`, `UUID`. The input is
//! untrusted ASCII/UTF-8 text written by a variety of acquisition
//! tools, so this is a tolerant scanner, not a DOM: recognised elements
//! are extracted, everything else is skipped without comment.

use crate::dtype::ArrayDtype;
use crate::error::OmeXmlError;

use super::model::{
    DimensionOrder, OmeChannel, OmeImage, OmePixels, ParsedOme, TiffDataEntry,
    DEFAULT_PHYSICAL_UNIT,
};

// =============================================================================
// Recognition predicate
// =============================================================================

/// Whether a text looks like an OME-XML document.
///
/// True when the text begins (after optional whitespace) with an XML
/// processing instruction or an `OME` element, optionally
/// namespace-prefixed. This is the check applied to `ImageDescription`
/// payloads before attempting a full parse.
pub fn is_ome_xml(text: &str) -> bool {
    let trimmed = text.trim_start();
    if trimmed.starts_with("<?xml") {
        return true;
    }
    let Some(rest) = trimmed.strip_prefix('<') else {
        return false;
    };
    let name_end = rest
        .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
        .unwrap_or(rest.len());
    local_name(&rest[..name_end]) == "OME"
}

// =============================================================================
// Entry point
// =============================================================================

/// Parse an OME-XML document into its images and root UUID.
///
/// Every `Image` element yields one [`OmeImage`] from its first
/// `Pixels` child; images without pixels are dropped silently. Unknown
/// elements and attributes are ignored.
pub fn parse_ome_xml(text: &str) -> Result<ParsedOme, OmeXmlError> {
    let mut scanner = Scanner::new(text);
    let mut builder = DocumentBuilder::default();

    while let Some(event) = scanner.next_event()? {
        match event {
            Event::Start(tag) => builder.open(&tag, false)?,
            Event::Empty(tag) => builder.open(&tag, true)?,
            Event::End(name) => builder.close(name),
            Event::Text(text) => builder.text(text),
        }
    }

    Ok(builder.finish())
}

// =============================================================================
// Document builder
// =============================================================================

#[derive(Default)]
struct DocumentBuilder {
    images: Vec<OmeImage>,
    root_uuid: Option<String>,
    saw_root: bool,

    image: Option<PendingImage>,
    tiff_data: Option<TiffDataEntry>,
    uuid_text: Option<String>,
}

struct PendingImage {
    id: Option<String>,
    name: Option<String>,
    pixels: Option<OmePixels>,
}

impl DocumentBuilder {
    fn open(&mut self, tag: &Tag, empty: bool) -> Result<(), OmeXmlError> {
        match tag.local.as_str() {
            "OME" if !self.saw_root => {
                self.saw_root = true;
                self.root_uuid = tag.attr("UUID").map(str::to_string);
            }
            "Image" => {
                self.image = Some(PendingImage {
                    id: tag.attr("ID").map(str::to_string),
                    name: tag.attr("Name").map(str::to_string),
                    pixels: None,
                });
                if empty {
                    self.close("Image");
                }
            }
            "Pixels" => {
                if let Some(image) = self.image.as_mut() {
                    // Only the first Pixels child of an Image counts.
                    if image.pixels.is_none() {
                        image.pixels = Some(parse_pixels(tag)?);
                    }
                }
            }
            "Channel" => {
                if let Some(pixels) = self.current_pixels() {
                    let index = pixels.channels.len();
                    let channel = parse_channel(tag, index);
                    pixels.channels.push(channel);
                }
            }
            "TiffData" => {
                if self.current_pixels().is_some() {
                    let entry = parse_tiff_data(tag);
                    if empty {
                        if let Some(pixels) = self.current_pixels() {
                            pixels.tiff_data.push(entry);
                        }
                    } else {
                        self.tiff_data = Some(entry);
                    }
                }
            }
            "UUID" => {
                if let Some(entry) = self.tiff_data.as_mut() {
                    entry.file_name = tag.attr("FileName").map(str::to_string);
                    if !empty {
                        self.uuid_text = Some(String::new());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str) {
        match name {
            "UUID" => {
                if let (Some(entry), Some(text)) = (self.tiff_data.as_mut(), self.uuid_text.take())
                {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        entry.uuid = Some(text);
                    }
                }
            }
            "TiffData" => {
                if let Some(entry) = self.tiff_data.take() {
                    if let Some(pixels) = self.current_pixels() {
                        pixels.tiff_data.push(entry);
                    }
                }
            }
            "Image" => {
                if let Some(image) = self.image.take() {
                    // Images without a Pixels child are dropped silently.
                    if let Some(mut pixels) = image.pixels {
                        if pixels.channels.is_empty() {
                            pixels.channels = (0..pixels.size_c as usize)
                                .map(OmeChannel::synthesized)
                                .collect();
                        }
                        self.images.push(OmeImage {
                            id: image.id,
                            name: image.name,
                            pixels,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(buffer) = self.uuid_text.as_mut() {
            buffer.push_str(&decode_entities(text));
        }
    }

    fn current_pixels(&mut self) -> Option<&mut OmePixels> {
        self.image.as_mut().and_then(|image| image.pixels.as_mut())
    }

    fn finish(self) -> ParsedOme {
        ParsedOme {
            images: self.images,
            root_uuid: self.root_uuid,
        }
    }
}

// =============================================================================
// Element extraction
// =============================================================================

fn parse_pixels(tag: &Tag) -> Result<OmePixels, OmeXmlError> {
    let size_x = require_u32(tag, "SizeX")?;
    let size_y = require_u32(tag, "SizeY")?;

    let dimension_order = match tag.attr("DimensionOrder") {
        Some(value) => DimensionOrder::parse(value)?,
        None => DimensionOrder::default(),
    };

    let dtype = match tag.attr("Type") {
        Some(value) => ArrayDtype::from_ome(value)?,
        None => ArrayDtype::Uint16,
    };

    Ok(OmePixels {
        size_x,
        size_y,
        size_z: optional_u32(tag, "SizeZ").unwrap_or(1),
        size_c: optional_u32(tag, "SizeC").unwrap_or(1),
        size_t: optional_u32(tag, "SizeT").unwrap_or(1),
        dimension_order,
        dtype,
        physical_size_x: optional_f64(tag, "PhysicalSizeX"),
        physical_size_y: optional_f64(tag, "PhysicalSizeY"),
        physical_size_z: optional_f64(tag, "PhysicalSizeZ"),
        physical_size_x_unit: unit_or_default(tag, "PhysicalSizeXUnit"),
        physical_size_y_unit: unit_or_default(tag, "PhysicalSizeYUnit"),
        physical_size_z_unit: unit_or_default(tag, "PhysicalSizeZUnit"),
        big_endian: bool_attr(tag, "BigEndian"),
        interleaved: bool_attr(tag, "Interleaved"),
        channels: Vec::new(),
        tiff_data: Vec::new(),
    })
}

fn parse_channel(tag: &Tag, index: usize) -> OmeChannel {
    OmeChannel {
        id: tag
            .attr("ID")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Channel:0:{index}")),
        name: tag.attr("Name").map(str::to_string),
        samples_per_pixel: optional_u32(tag, "SamplesPerPixel").unwrap_or(1),
        color: tag.attr("Color").and_then(|v| v.trim().parse::<i32>().ok()),
    }
}

fn parse_tiff_data(tag: &Tag) -> TiffDataEntry {
    TiffDataEntry {
        first_c: optional_usize(tag, "FirstC").unwrap_or(0),
        first_z: optional_usize(tag, "FirstZ").unwrap_or(0),
        first_t: optional_usize(tag, "FirstT").unwrap_or(0),
        ifd: optional_usize(tag, "IFD").unwrap_or(0),
        plane_count: optional_usize(tag, "PlaneCount").unwrap_or(1),
        uuid: None,
        file_name: None,
    }
}

fn require_u32(tag: &Tag, name: &str) -> Result<u32, OmeXmlError> {
    let value = tag
        .attr(name)
        .ok_or_else(|| OmeXmlError::InvalidXml(format!("Pixels element missing {name}")))?;
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| OmeXmlError::InvalidXml(format!("Pixels {name}={value:?} is not an integer")))
}

fn optional_u32(tag: &Tag, name: &str) -> Option<u32> {
    tag.attr(name).and_then(|v| v.trim().parse::<u32>().ok())
}

fn optional_usize(tag: &Tag, name: &str) -> Option<usize> {
    tag.attr(name).and_then(|v| v.trim().parse::<usize>().ok())
}

fn optional_f64(tag: &Tag, name: &str) -> Option<f64> {
    tag.attr(name).and_then(|v| v.trim().parse::<f64>().ok())
}

fn unit_or_default(tag: &Tag, name: &str) -> String {
    match tag.attr(name) {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => DEFAULT_PHYSICAL_UNIT.to_string(),
    }
}

fn bool_attr(tag: &Tag, name: &str) -> bool {
    tag.attr(name)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

// =============================================================================
// XML scanning
// =============================================================================

enum Event<'a> {
    Start(Tag),
    Empty(Tag),
    End(&'a str),
    Text(&'a str),
}

struct Tag {
    local: String,
    attrs: Vec<(String, String)>,
}

impl Tag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Strip an optional namespace prefix from an element or attribute name.
fn local_name(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn next_event(&mut self) -> Result<Option<Event<'a>>, OmeXmlError> {
        loop {
            if self.pos >= self.text.len() {
                return Ok(None);
            }

            let rest = self.rest();
            if !rest.starts_with('<') {
                let end = rest.find('<').unwrap_or(rest.len());
                let text = &rest[..end];
                self.pos += end;
                if !text.trim().is_empty() {
                    return Ok(Some(Event::Text(text)));
                }
                continue;
            }

            if rest.starts_with("<?") {
                self.skip_until("?>")?;
            } else if rest.starts_with("<!--") {
                self.skip_until("-->")?;
            } else if rest.starts_with("<![CDATA[") {
                let content_start = self.pos + "<![CDATA[".len();
                self.skip_until("]]>")?;
                let content_end = self.pos - "]]>".len();
                return Ok(Some(Event::Text(&self.text[content_start..content_end])));
            } else if rest.starts_with("<!") {
                self.skip_until(">")?;
            } else if let Some(rest) = rest.strip_prefix("</") {
                let end = rest
                    .find('>')
                    .ok_or_else(|| OmeXmlError::InvalidXml("unterminated end tag".to_string()))?;
                let name = rest[..end].trim();
                self.pos += 2 + end + 1;
                return Ok(Some(Event::End(local_name(name))));
            } else {
                return self.parse_start_tag().map(Some);
            }
        }
    }

    fn skip_until(&mut self, marker: &str) -> Result<(), OmeXmlError> {
        match self.rest().find(marker) {
            Some(idx) => {
                self.pos += idx + marker.len();
                Ok(())
            }
            None => Err(OmeXmlError::InvalidXml(format!(
                "unterminated construct, expected {marker:?}"
            ))),
        }
    }

    fn parse_start_tag(&mut self) -> Result<Event<'a>, OmeXmlError> {
        // Consume '<'.
        self.pos += 1;
        let rest = self.rest();
        let name_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
            .ok_or_else(|| OmeXmlError::InvalidXml("unterminated start tag".to_string()))?;
        if name_end == 0 {
            return Err(OmeXmlError::InvalidXml("empty element name".to_string()));
        }
        let name = &rest[..name_end];
        self.pos += name_end;

        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(Event::Empty(Tag {
                    local: local_name(name).to_string(),
                    attrs,
                }));
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return Ok(Event::Start(Tag {
                    local: local_name(name).to_string(),
                    attrs,
                }));
            }
            if rest.is_empty() {
                return Err(OmeXmlError::InvalidXml("unterminated start tag".to_string()));
            }
            let (key, value) = self.parse_attribute()?;
            attrs.push((key, value));
        }
    }

    fn parse_attribute(&mut self) -> Result<(String, String), OmeXmlError> {
        let rest = self.rest();
        let name_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=' || c == '>' || c == '/')
            .ok_or_else(|| OmeXmlError::InvalidXml("unterminated attribute".to_string()))?;
        if name_end == 0 {
            return Err(OmeXmlError::InvalidXml("empty attribute name".to_string()));
        }
        let name = &rest[..name_end];
        self.pos += name_end;

        self.skip_whitespace();
        if !self.rest().starts_with('=') {
            return Err(OmeXmlError::InvalidXml(format!(
                "attribute {name:?} has no value"
            )));
        }
        self.pos += 1;
        self.skip_whitespace();

        let rest = self.rest();
        let quote = match rest.chars().next() {
            Some(c @ ('"' | '\'')) => c,
            _ => {
                return Err(OmeXmlError::InvalidXml(format!(
                    "attribute {name:?} value is not quoted"
                )))
            }
        };
        let value_body = &rest[1..];
        let end = value_body.find(quote).ok_or_else(|| {
            OmeXmlError::InvalidXml(format!("attribute {name:?} value is unterminated"))
        })?;
        let raw_value = &value_body[..end];
        self.pos += 1 + end + 1;

        Ok((local_name(name).to_string(), decode_entities(raw_value)))
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let skipped = rest.len() - rest.trim_start().len();
        self.pos += skipped;
    }
}

// =============================================================================
// Entity decoding
// =============================================================================

/// Decode the five named XML escapes plus numeric character references.
/// Unknown references pass through verbatim (tolerant).
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];

        let Some(end) = rest.find(';') else {
            out.push_str(rest);
            return out;
        };
        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let decoded = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => out.push(c),
                    None => {
                        out.push('&');
                        out.push_str(entity);
                        out.push(';');
                    }
                }
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

// =============================================================================
// Tests
// =============================================================================
