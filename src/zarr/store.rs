//! The Zarr-key read facade.
//!
//! [`ZarrStore`] presents an open OME-TIFF as a read-only key-addressed
//! blob store in Zarr v3's key space: metadata documents are
//! synthesised (and memoised) from the container, chunk keys translate
//! into window reads through the indexer, and lookup misses are
//! absence, never errors.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::dtype::ArrayDtype;
use crate::error::{IndexError, StoreError};
use crate::index::{detect_pyramid, filter_multi_file, PlaneIndexer, PlaneSelection, PyramidInfo};
use crate::io::{ByteSource, CancelToken};
use crate::ome::{is_ome_xml, parse_ome_xml, zarr_unit_name, OmePixels, ParsedOme};
use crate::tiff::{ChunkLayout, TiffReader, Window};

use super::keys::{parse_store_key, StoreKey};
use super::metadata::{
    ArrayMeta, Axis, Dataset, Multiscale, Omero, OmeroChannel, OmeroWindow, RootAttributes,
    RootGroup, OmeAttributes, ScaleTransform,
};

/// Default channel colours used when the file declares none: white for
/// a single channel, a fixed RGB cycle otherwise.
const DEFAULT_PALETTE: [&str; 6] = ["FF0000", "00FF00", "0000FF", "FFFF00", "FF00FF", "00FFFF"];

// =============================================================================
// Axis bookkeeping
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisId {
    T,
    C,
    Z,
    Y,
    X,
}

#[derive(Debug, Clone)]
struct StoreAxis {
    id: AxisId,
    name: &'static str,
    kind: &'static str,
    unit: Option<String>,
}

// =============================================================================
// ZarrStore
// =============================================================================

/// A read-only Zarr v3 view over one OME-TIFF file.
pub struct ZarrStore<S: ByteSource> {
    reader: TiffReader<S>,
    pixels: OmePixels,
    indexer: PlaneIndexer,
    axes: Vec<StoreAxis>,
    dtype: ArrayDtype,
    image_name: Option<String>,

    /// Base tile geometry; for stripped files the whole image is one
    /// chunk
    chunk_width: u32,
    chunk_height: u32,

    /// Encoded metadata documents, memoised on first request
    doc_cache: RwLock<HashMap<String, Bytes>>,
}

impl<S: ByteSource> ZarrStore<S> {
    /// Open a file and prepare the facade.
    pub async fn open(source: S) -> Result<Self, StoreError> {
        Self::open_with_cancel(source, CancelToken::new()).await
    }

    /// Open with a cancellation signal honoured by all reads.
    pub async fn open_with_cancel(source: S, cancel: CancelToken) -> Result<Self, StoreError> {
        let reader = TiffReader::open_with_cancel(source, cancel).await?;

        let base = reader.first_ifd().await?;
        let base_data = reader.ifd_data(&base).await?;

        // The embedded OME-XML drives the 5D interpretation; a plain
        // TIFF without one is served as a single flat image.
        let description = reader.image_description(&base).await?;
        let parsed = match description {
            Some(text) if is_ome_xml(&text) => parse_ome_xml(&text)?,
            _ => ParsedOme {
                images: Vec::new(),
                root_uuid: None,
            },
        };

        let image = parsed.images.first();
        let image_name = image.and_then(|image| image.name.clone());
        let pixels = image.map(|image| image.pixels.clone()).unwrap_or_else(|| {
            debug!("no OME-XML descriptor, serving as a flat image");
            OmePixels::flat(base_data.width, base_data.height, base_data.dtype)
        });

        // Multi-file routing: keep only the planes local to this file.
        let filtered = filter_multi_file(&pixels, parsed.root_uuid.as_deref())?;
        let (pixels, ifd_map) = match filtered {
            Some(filtered) => (filtered.pixels, Some(filtered.ifd_map)),
            None => (pixels, None),
        };

        let pyramid = detect_pyramid(&reader, parsed.images.len(), pixels.plane_count()).await?;
        let indexer = match ifd_map {
            Some(map) => PlaneIndexer::with_ifd_map(&pixels, pyramid, map),
            None => PlaneIndexer::new(&pixels, pyramid),
        };

        let (chunk_width, chunk_height) = match base_data.layout {
            ChunkLayout::Tiles {
                tile_width,
                tile_height,
            } => (tile_width, tile_height),
            ChunkLayout::Strips { .. } => (base_data.width, base_data.height),
        };

        let axes = build_axes(&pixels);

        Ok(Self {
            reader,
            pixels,
            indexer,
            axes,
            dtype: base_data.dtype,
            image_name,
            chunk_width,
            chunk_height,
            doc_cache: RwLock::new(HashMap::new()),
        })
    }

    /// The detected pyramid.
    pub fn pyramid(&self) -> &PyramidInfo {
        self.indexer.pyramid()
    }

    /// Number of resolution levels served.
    pub fn level_count(&self) -> usize {
        self.pyramid().levels
    }

    /// The (possibly multi-file-filtered) pixel description.
    pub fn pixels(&self) -> &OmePixels {
        &self.pixels
    }

    /// Base dimensions `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.pyramid().widths[0], self.pyramid().heights[0])
    }

    // -------------------------------------------------------------------------
    // Key lookup
    // -------------------------------------------------------------------------

    /// Look up a store key.
    ///
    /// Returns `Ok(None)` for unrecognised keys, out-of-range levels
    /// and out-of-range non-spatial indices; decode failures propagate
    /// as errors. Repeated requests for the same metadata key return
    /// byte-identical documents.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match parse_store_key(key) {
            Some(StoreKey::RootMeta) => Ok(Some(self.root_document().await?)),
            Some(StoreKey::LevelMeta(level)) if level < self.level_count() => {
                Ok(Some(self.level_document(level).await?))
            }
            Some(StoreKey::Chunk { level, indices }) if level < self.level_count() => {
                self.chunk_bytes(level, &indices).await
            }
            other => {
                debug!(key, recognised = other.is_some(), "store key miss");
                Ok(None)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Metadata synthesis
    // -------------------------------------------------------------------------

    async fn root_document(&self) -> Result<Bytes, StoreError> {
        self.cached_document("zarr.json", || {
            let pyramid = self.indexer.pyramid();

            let axes: Vec<Axis> = self
                .axes
                .iter()
                .map(|axis| Axis {
                    name: axis.name.to_string(),
                    kind: axis.kind,
                    unit: axis.unit.clone(),
                })
                .collect();

            let datasets: Vec<Dataset> = (0..pyramid.levels)
                .map(|level| Dataset {
                    path: level.to_string(),
                    coordinate_transformations: vec![ScaleTransform::new(
                        self.scale_vector(level),
                    )],
                })
                .collect();

            let group = RootGroup {
                zarr_format: 3,
                node_type: "group",
                attributes: RootAttributes {
                    ome: OmeAttributes {
                        version: "0.5",
                        multiscales: vec![Multiscale {
                            name: self.image_name.clone(),
                            axes,
                            datasets,
                        }],
                        omero: Some(self.omero_block()),
                    },
                },
            };
            serde_json::to_vec(&group).expect("root group serialisation is infallible")
        })
        .await
    }

    async fn level_document(&self, level: usize) -> Result<Bytes, StoreError> {
        let key = format!("{level}/zarr.json");
        self.cached_document(&key, || {
            let meta = ArrayMeta::new(
                self.shape_at(level),
                self.chunk_shape_at(level),
                self.dtype.zarr_name(),
                self.axes.iter().map(|a| a.name.to_string()).collect(),
            );
            serde_json::to_vec(&meta).expect("array metadata serialisation is infallible")
        })
        .await
    }

    async fn cached_document(
        &self,
        key: &str,
        build: impl FnOnce() -> Vec<u8>,
    ) -> Result<Bytes, StoreError> {
        if let Some(doc) = self.doc_cache.read().await.get(key) {
            return Ok(doc.clone());
        }
        let doc = Bytes::from(build());
        self.doc_cache
            .write()
            .await
            .insert(key.to_string(), doc.clone());
        Ok(doc)
    }

    /// Shape at a level, in the emitted axis order.
    fn shape_at(&self, level: usize) -> Vec<u64> {
        let pyramid = self.indexer.pyramid();
        self.axes
            .iter()
            .map(|axis| match axis.id {
                AxisId::T => self.pixels.size_t as u64,
                AxisId::C => self.pixels.size_c as u64,
                AxisId::Z => self.pixels.size_z as u64,
                AxisId::Y => pyramid.heights[level] as u64,
                AxisId::X => pyramid.widths[level] as u64,
            })
            .collect()
    }

    /// Chunk shape at a level: 1 along non-spatial axes, the base tile
    /// geometry clamped to the level dimensions along y/x.
    fn chunk_shape_at(&self, level: usize) -> Vec<u64> {
        let pyramid = self.indexer.pyramid();
        self.axes
            .iter()
            .map(|axis| match axis.id {
                AxisId::T | AxisId::C | AxisId::Z => 1,
                AxisId::Y => self.chunk_height.min(pyramid.heights[level]) as u64,
                AxisId::X => self.chunk_width.min(pyramid.widths[level]) as u64,
            })
            .collect()
    }

    /// Per-axis scale values for a level's transform.
    fn scale_vector(&self, level: usize) -> Vec<f64> {
        let pyramid = self.indexer.pyramid();
        self.axes
            .iter()
            .map(|axis| match axis.id {
                AxisId::T | AxisId::C => 1.0,
                AxisId::Z => self.pixels.physical_size_z.unwrap_or(1.0),
                AxisId::Y => {
                    self.pixels.physical_size_y.unwrap_or(1.0) * pyramid.downsample_y(level)
                }
                AxisId::X => {
                    self.pixels.physical_size_x.unwrap_or(1.0) * pyramid.downsample_x(level)
                }
            })
            .collect()
    }

    fn omero_block(&self) -> Omero {
        let (min, max) = dtype_display_range(self.dtype);
        let single = self.pixels.channels.len() == 1;
        let channels = self
            .pixels
            .channels
            .iter()
            .enumerate()
            .map(|(index, channel)| {
                let color = match channel.color {
                    Some(packed) => {
                        let rgba = packed as u32;
                        format!("{:06X}", (rgba >> 8) & 0xFF_FFFF)
                    }
                    None if single => "FFFFFF".to_string(),
                    None => DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()].to_string(),
                };
                OmeroChannel {
                    color,
                    label: channel.name.clone().or_else(|| Some(channel.id.clone())),
                    window: OmeroWindow {
                        min,
                        max,
                        start: min,
                        end: max,
                    },
                    active: true,
                }
            })
            .collect();
        Omero { channels }
    }

    // -------------------------------------------------------------------------
    // Chunk reads
    // -------------------------------------------------------------------------

    async fn chunk_bytes(
        &self,
        level: usize,
        indices: &[u64],
    ) -> Result<Option<Bytes>, StoreError> {
        if indices.len() != self.axes.len() {
            return Ok(None);
        }

        // Split the key indices into the plane selection and the y/x
        // tile coordinates.
        let mut sel = PlaneSelection::new(0, 0, 0);
        let mut y_index = 0u64;
        let mut x_index = 0u64;
        for (axis, &index) in self.axes.iter().zip(indices) {
            match axis.id {
                AxisId::T => sel.t = index as usize,
                AxisId::C => sel.c = index as usize,
                AxisId::Z => sel.z = index as usize,
                AxisId::Y => y_index = index,
                AxisId::X => x_index = index,
            }
        }
        let sizes = self.indexer.sizes();
        if sel.c >= sizes.size_c || sel.z >= sizes.size_z || sel.t >= sizes.size_t {
            return Ok(None);
        }

        let pyramid = self.indexer.pyramid();
        let level_width = pyramid.widths[level] as u64;
        let level_height = pyramid.heights[level] as u64;
        let chunk_w = (self.chunk_width as u64).min(level_width);
        let chunk_h = (self.chunk_height as u64).min(level_height);

        let bpe = self.dtype.bytes_per_element();
        let chunk_len = (chunk_w * chunk_h) as usize * bpe;

        let left = x_index * chunk_w;
        let top = y_index * chunk_h;
        let right = ((x_index + 1) * chunk_w).min(level_width);
        let bottom = ((y_index + 1) * chunk_h).min(level_height);

        // Chunks entirely past the image edge decode to zeros.
        if left >= level_width || top >= level_height {
            return Ok(Some(Bytes::from(vec![0u8; chunk_len])));
        }

        let ifd = match self.indexer.resolve_ifd(&self.reader, sel, level).await {
            Ok(ifd) => ifd,
            Err(StoreError::Index(IndexError::NoSuchPlane { .. })) => return Ok(None),
            Err(err) => return Err(err),
        };

        let window = Window::new(left as u32, top as u32, right as u32, bottom as u32);
        let data = self.reader.read_window(&ifd, window).await?;

        // Copy the window into a chunk-sized zero-padded buffer.
        let window_width = (right - left) as usize * bpe;
        let chunk_row = chunk_w as usize * bpe;
        let mut out = vec![0u8; chunk_len];
        for row in 0..(bottom - top) as usize {
            let src = row * window_width;
            let dst = row * chunk_row;
            out[dst..dst + window_width].copy_from_slice(&data[src..src + window_width]);
        }
        Ok(Some(Bytes::from(out)))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Axes in the fixed `t, c, z, y, x` order, omitting non-spatial axes
/// of size 1; `y` and `x` are always present.
fn build_axes(pixels: &OmePixels) -> Vec<StoreAxis> {
    let spatial_unit = |size: &Option<f64>, unit: &str| {
        size.is_some().then(|| zarr_unit_name(unit).to_string())
    };

    let mut axes = Vec::with_capacity(5);
    if pixels.size_t > 1 {
        axes.push(StoreAxis {
            id: AxisId::T,
            name: "t",
            kind: "time",
            unit: None,
        });
    }
    if pixels.size_c > 1 {
        axes.push(StoreAxis {
            id: AxisId::C,
            name: "c",
            kind: "channel",
            unit: None,
        });
    }
    if pixels.size_z > 1 {
        axes.push(StoreAxis {
            id: AxisId::Z,
            name: "z",
            kind: "space",
            unit: spatial_unit(&pixels.physical_size_z, &pixels.physical_size_z_unit),
        });
    }
    axes.push(StoreAxis {
        id: AxisId::Y,
        name: "y",
        kind: "space",
        unit: spatial_unit(&pixels.physical_size_y, &pixels.physical_size_y_unit),
    });
    axes.push(StoreAxis {
        id: AxisId::X,
        name: "x",
        kind: "space",
        unit: spatial_unit(&pixels.physical_size_x, &pixels.physical_size_x_unit),
    });
    axes
}

/// The display window for a dtype: the full value range for integers,
/// the unit interval for floats.
fn dtype_display_range(dtype: ArrayDtype) -> (f64, f64) {
    match dtype {
        ArrayDtype::Uint8 => (0.0, u8::MAX as f64),
        ArrayDtype::Uint16 => (0.0, u16::MAX as f64),
        ArrayDtype::Uint32 => (0.0, u32::MAX as f64),
        ArrayDtype::Int8 => (i8::MIN as f64, i8::MAX as f64),
        ArrayDtype::Int16 => (i16::MIN as f64, i16::MAX as f64),
        ArrayDtype::Int32 => (i32::MIN as f64, i32::MAX as f64),
        ArrayDtype::Float32 | ArrayDtype::Float64 => (0.0, 1.0),
    }
}
