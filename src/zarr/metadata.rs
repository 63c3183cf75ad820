//! Zarr v3 JSON documents.
//!
//! Serde models for the two synthesised documents: the root group
//! (carrying the OME-Zarr 0.5 `multiscales` attributes and optional
//! `omero` display hints) and the per-level array. Field order is fixed
//! by declaration, so serialisation is deterministic and memoised
//! documents are byte-identical across requests.

use serde::Serialize;

// =============================================================================
// Root group document
// =============================================================================

/// `zarr.json` at the root of the store.
#[derive(Debug, Clone, Serialize)]
pub struct RootGroup {
    pub zarr_format: u8,
    pub node_type: &'static str,
    pub attributes: RootAttributes,
}

#[derive(Debug, Clone, Serialize)]
pub struct RootAttributes {
    pub ome: OmeAttributes,
}

/// The `ome` attribute block, version 0.5.
#[derive(Debug, Clone, Serialize)]
pub struct OmeAttributes {
    pub version: &'static str,
    pub multiscales: Vec<Multiscale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omero: Option<Omero>,
}

/// One multiscale image: axes and one dataset per resolution level.
#[derive(Debug, Clone, Serialize)]
pub struct Multiscale {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub axes: Vec<Axis>,
    pub datasets: Vec<Dataset>,
}

/// An axis descriptor: name, kind and optional unit.
#[derive(Debug, Clone, Serialize)]
pub struct Axis {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// One resolution level: its path and scale transform.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub path: String,
    #[serde(rename = "coordinateTransformations")]
    pub coordinate_transformations: Vec<ScaleTransform>,
}

/// The single per-level transform: a scale vector over the axes.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleTransform {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub scale: Vec<f64>,
}

impl ScaleTransform {
    pub fn new(scale: Vec<f64>) -> Self {
        Self {
            kind: "scale",
            scale,
        }
    }
}

// =============================================================================
// Display hints (omero block)
// =============================================================================

/// Display hints mirroring the classic `omero` metadata block.
#[derive(Debug, Clone, Serialize)]
pub struct Omero {
    pub channels: Vec<OmeroChannel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OmeroChannel {
    /// Six-hex-digit RGB colour
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub window: OmeroWindow,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OmeroWindow {
    pub min: f64,
    pub max: f64,
    pub start: f64,
    pub end: f64,
}

// =============================================================================
// Per-level array document
// =============================================================================

/// `{level}/zarr.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ArrayMeta {
    pub zarr_format: u8,
    pub node_type: &'static str,
    pub shape: Vec<u64>,
    pub data_type: &'static str,
    pub chunk_grid: ChunkGrid,
    pub chunk_key_encoding: ChunkKeyEncoding,
    pub fill_value: u64,
    pub codecs: Vec<Codec>,
    pub dimension_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkGrid {
    pub name: &'static str,
    pub configuration: ChunkGridConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkGridConfig {
    pub chunk_shape: Vec<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkKeyEncoding {
    pub name: &'static str,
    pub configuration: ChunkKeyConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkKeyConfig {
    pub separator: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Codec {
    pub name: &'static str,
    pub configuration: CodecConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodecConfig {
    pub endian: &'static str,
}

impl ArrayMeta {
    /// The fixed parts every emitted array shares: a regular chunk
    /// grid, `/`-separated default chunk keys, little-endian bytes
    /// codec, zero fill.
    pub fn new(
        shape: Vec<u64>,
        chunk_shape: Vec<u64>,
        data_type: &'static str,
        dimension_names: Vec<String>,
    ) -> Self {
        ArrayMeta {
            zarr_format: 3,
            node_type: "array",
            shape,
            data_type,
            chunk_grid: ChunkGrid {
                name: "regular",
                configuration: ChunkGridConfig { chunk_shape },
            },
            chunk_key_encoding: ChunkKeyEncoding {
                name: "default",
                configuration: ChunkKeyConfig { separator: "/" },
            },
            fill_value: 0,
            codecs: vec![Codec {
                name: "bytes",
                configuration: CodecConfig { endian: "little" },
            }],
            dimension_names,
        }
    }
}
