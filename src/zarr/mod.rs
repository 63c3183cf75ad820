//! The Zarr v3 read facade.
//!
//! Store key parsing, the serde models for the synthesised metadata
//! documents, and [`ZarrStore`], which serves an open OME-TIFF through
//! Zarr's key space.

mod keys;
mod metadata;
mod store;

pub use keys::{parse_store_key, StoreKey};
pub use metadata::{
    ArrayMeta, Axis, ChunkGrid, ChunkGridConfig, ChunkKeyConfig, ChunkKeyEncoding, Codec,
    CodecConfig, Dataset, Multiscale, OmeAttributes, Omero, OmeroChannel, OmeroWindow,
    RootAttributes, RootGroup, ScaleTransform,
};
pub use store::ZarrStore;
