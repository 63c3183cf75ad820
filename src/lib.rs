//! ome-tiff-zarr - a bidirectional bridge between OME-TIFF and OME-Zarr.
//!
//! This library reconciles two semantically equivalent but structurally
//! different multi-dimensional image formats:
//!
//! - **OME-TIFF**: a classic or BigTIFF container whose first image
//!   directory embeds an OME-XML descriptor declaring the 5D
//!   `(T, C, Z, Y, X)` plane semantics.
//! - **OME-Zarr v0.5**: a hierarchical chunk-addressable array layout
//!   encoded as Zarr v3 JSON plus binary chunks.
//!
//! # Reading
//!
//! [`ZarrStore`] opens an OME-TIFF over any [`ByteSource`] and presents
//! it as a read-only Zarr v3 store: `zarr.json` documents are
//! synthesised from the container and chunk keys translate into lazy
//! tile reads, with SubIFD, legacy and cloud-optimised pyramids all
//! detected automatically.
//!
//! # Writing
//!
//! [`write_ome_tiff`] drives the reverse path: a [`Multiscales`]
//! description plus a [`PlaneReader`] callback produce a complete
//! classic or BigTIFF buffer, with per-tile deflate compression and
//! SubIFD sub-resolutions.

pub mod codec;
pub mod dtype;
pub mod error;
pub mod index;
pub mod io;
pub mod ome;
pub mod tiff;
pub mod write;
pub mod zarr;

// Re-export the types most callers touch.
pub use dtype::{ArrayDtype, SampleFormat};
pub use error::{DtypeError, IndexError, IoError, OmeXmlError, StoreError, TiffError, WriteError};
pub use index::{PlaneIndexer, PlaneSelection, PyramidInfo};
pub use io::{BlockCache, ByteSource, CancelToken, FileSource, MemorySource};
pub use ome::{DimensionOrder, OmeChannel, OmeImage, OmePixels, ParsedOme};
pub use tiff::{TiffFormat, TiffReader, Window};
pub use write::{
    write_ome_tiff, ChannelHint, CompressionKind, Multiscales, MultiscaleImage, PlaneReader,
    WriteOptions,
};
pub use zarr::ZarrStore;
