//! TIFF container codec.
//!
//! Both directions of the container format live here:
//!
//! - **Read**: header and IFD parsing, lazy chain walking, SubIFD
//!   trees, tag payload access, and chunk/window pixel reads over a
//!   [`ByteSource`](crate::io::ByteSource).
//! - **Write**: directory assembly and the two-pass resolve/place
//!   serialiser producing classic (magic 42) or BigTIFF (magic 43)
//!   buffers.
//!
//! Emitted files are always little-endian ("II"); big-endian input is
//! rejected at the header.

mod encode;
mod parser;
mod reader;
mod tags;
mod values;

pub use encode::{
    base_image_tags, encode_tiff, slice_tiles, IfdBuilder, TagValue, TiffFormat,
    CLASSIC_OFFSET_LIMIT,
};
pub use parser::{
    Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, CLASSIC_HEADER_SIZE, VERSION_BIGTIFF,
    VERSION_CLASSIC,
};
pub use reader::{ChunkLayout, IfdData, TiffReader, Window};
pub use tags::{
    Compression, FieldType, Tag, PHOTOMETRIC_MIN_IS_BLACK, PLANAR_CHUNKY, SUBFILE_REDUCED_IMAGE,
};
pub use values::ValueReader;
