//! The OME-TIFF write orchestrator.
//!
//! Drives the forward path: a [`Multiscales`] description plus a
//! [`PlaneReader`] callback in, a complete OME-TIFF byte buffer out.
//! Planes are enumerated in the emitted dimension order, fetched with
//! bounded concurrency, tiled and compressed per IFD, and handed to the
//! container writer in plane-index order regardless of the order in
//! which reads complete.

mod multiscale;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::codec::deflate;
use crate::dtype::ArrayDtype;
use crate::error::{IoError, TiffError, WriteError};
use crate::index::{ifd_to_plane, PlaneSelection, PlaneSizes};
use crate::io::CancelToken;
use crate::ome::{
    build_ome_xml, ChannelSpec, DimensionOrder, OmeXmlDescription, PhysicalSize,
};
use crate::tiff::{
    base_image_tags, encode_tiff, slice_tiles, IfdBuilder, Tag, TagValue, TiffFormat,
    SUBFILE_REDUCED_IMAGE,
};

pub use multiscale::{
    prev_power_of_2, suggested_level_count, AxisDescriptor, AxisKind, ChannelHint,
    DatasetTransform, MultiscaleImage, Multiscales,
};

/// Default tile edge length.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default number of planes built concurrently.
pub const DEFAULT_WRITE_CONCURRENCY: usize = 4;

// =============================================================================
// Plane reader
// =============================================================================

/// Write-side collaborator supplying dense pixel planes.
///
/// For each `(level, c, z, t)` the implementation returns the full
/// plane as little-endian row-major element bytes of exactly
/// `width(level) * height(level) * bytesPerElement` bytes. No partial
/// reads.
#[async_trait]
pub trait PlaneReader: Send + Sync {
    async fn read_plane(
        &self,
        level: usize,
        c: usize,
        z: usize,
        t: usize,
        cancel: &CancelToken,
    ) -> Result<Bytes, IoError>;
}

// =============================================================================
// Options
// =============================================================================

/// Compression applied to every tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionKind {
    #[default]
    None,

    /// zlib-wrapped deflate at the given level (1..=9)
    Deflate { level: u32 },
}

/// Knobs for one write.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Plane enumeration order emitted into the OME-XML
    pub dimension_order: DimensionOrder,

    /// Tile edge length; multiples of 16 recommended, 0 selects a
    /// single-strip layout
    pub tile_size: u32,

    pub compression: CompressionKind,

    pub format: TiffFormat,

    /// Bounded plane-build concurrency
    pub concurrency: usize,

    pub image_name: Option<String>,
    pub creator: Option<String>,

    pub cancel: CancelToken,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            dimension_order: DimensionOrder::default(),
            tile_size: DEFAULT_TILE_SIZE,
            compression: CompressionKind::default(),
            format: TiffFormat::default(),
            concurrency: DEFAULT_WRITE_CONCURRENCY,
            image_name: None,
            creator: None,
            cancel: CancelToken::new(),
        }
    }
}

// =============================================================================
// Orchestration
// =============================================================================

/// Produce a complete OME-TIFF from a multiscale description and a
/// plane source.
pub async fn write_ome_tiff<P>(
    multiscales: &Multiscales,
    planes: Arc<P>,
    options: WriteOptions,
) -> Result<Vec<u8>, WriteError>
where
    P: PlaneReader + 'static,
{
    multiscales.validate()?;
    options.cancel.check().map_err(cancelled)?;

    let dtype = multiscales.dtype();
    let sizes = PlaneSizes::new(
        multiscales.size_along("c") as usize,
        multiscales.size_along("z") as usize,
        multiscales.size_along("t") as usize,
    );
    let total_planes = sizes.plane_count();

    let level_dims: Arc<Vec<(u64, u64)>> = Arc::new(
        (0..multiscales.level_count())
            .map(|level| multiscales.level_dimensions(level))
            .collect(),
    );

    let description = build_description(multiscales, &options, dtype);
    let xml = build_ome_xml(&description);

    debug!(
        planes = total_planes,
        levels = multiscales.level_count(),
        tile = options.tile_size,
        "building OME-TIFF"
    );

    // One task per plane, gated by the semaphore; result slot k keeps
    // the emitted IFD order independent of completion order.
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut handles = Vec::with_capacity(total_planes);
    for k in 0..total_planes {
        let sel = ifd_to_plane(options.dimension_order, sizes, k)
            .map_err(|_| WriteError::InvalidMultiscale("plane enumeration overflow".into()))?;

        let job = PlaneJob {
            planes: planes.clone(),
            level_dims: level_dims.clone(),
            dtype,
            tile_size: options.tile_size,
            compression: options.compression,
            cancel: options.cancel.clone(),
            sel,
            description: (k == 0).then(|| xml.clone()),
        };
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| WriteError::Cancelled)?;
            build_plane_ifd(job).await
        }));
    }

    let mut slots: Vec<Option<IfdBuilder>> = (0..total_planes).map(|_| None).collect();
    let mut first_error: Option<WriteError> = None;
    for (k, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(ifd)) => slots[k] = Some(ifd),
            Ok(Err(err)) => {
                first_error.get_or_insert(err);
            }
            Err(join_err) => {
                first_error.get_or_insert(WriteError::Tiff(TiffError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    join_err,
                ))));
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let ifds: Vec<IfdBuilder> = slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(WriteError::Cancelled)?;

    options.cancel.check().map_err(cancelled)?;
    let format = options.format;
    let buffer = tokio::task::spawn_blocking(move || encode_tiff(ifds, format))
        .await
        .map_err(|err| {
            WriteError::Tiff(TiffError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                err,
            )))
        })??;
    Ok(buffer)
}

fn cancelled(_: IoError) -> WriteError {
    WriteError::Cancelled
}

// -----------------------------------------------------------------------------
// Per-plane builds
// -----------------------------------------------------------------------------

struct PlaneJob<P> {
    planes: Arc<P>,
    level_dims: Arc<Vec<(u64, u64)>>,
    dtype: ArrayDtype,
    tile_size: u32,
    compression: CompressionKind,
    cancel: CancelToken,
    sel: PlaneSelection,

    /// OME-XML, present only for plane 0
    description: Option<String>,
}

async fn build_plane_ifd<P: PlaneReader>(job: PlaneJob<P>) -> Result<IfdBuilder, WriteError> {
    let mut ifd = build_level_ifd(&job, 0).await?;

    if let Some(xml) = &job.description {
        ifd.set(Tag::ImageDescription, TagValue::Ascii(xml.clone()));
    }

    for level in 1..job.level_dims.len() {
        let mut sub = build_level_ifd(&job, level).await?;
        sub.set(Tag::NewSubfileType, TagValue::Long(SUBFILE_REDUCED_IMAGE));
        ifd.sub_ifds.push(sub);
    }

    Ok(ifd)
}

/// Fetch one plane at one level, tile and compress it, and assemble
/// its directory.
async fn build_level_ifd<P: PlaneReader>(
    job: &PlaneJob<P>,
    level: usize,
) -> Result<IfdBuilder, WriteError> {
    let (width, height) = job.level_dims[level];
    let (width, height) = (width as u32, height as u32);
    let bpe = job.dtype.bytes_per_element();
    let sel = job.sel;

    job.cancel.check().map_err(cancelled)?;
    let pixels = job
        .planes
        .read_plane(level, sel.c, sel.z, sel.t, &job.cancel)
        .await
        .map_err(|source| WriteError::PlaneRead {
            level,
            c: sel.c,
            z: sel.z,
            t: sel.t,
            source,
        })?;

    let expected = width as usize * height as usize * bpe;
    if pixels.len() != expected {
        return Err(WriteError::PlaneLength {
            expected,
            actual: pixels.len(),
        });
    }

    let mut ifd = IfdBuilder::new();
    ifd.tags = base_image_tags(width, height, job.dtype);

    // Tile or single-strip layout; uncompressed buffers are dropped as
    // soon as each chunk is encoded.
    let chunks: Vec<Vec<u8>> = if job.tile_size == 0 {
        ifd.set(Tag::RowsPerStrip, TagValue::Long(height));
        vec![pixels.to_vec()]
    } else {
        ifd.set(Tag::TileWidth, TagValue::Long(job.tile_size));
        ifd.set(Tag::TileLength, TagValue::Long(job.tile_size));
        slice_tiles(&pixels, width, height, bpe, job.tile_size, job.tile_size)
    };
    drop(pixels);

    match job.compression {
        CompressionKind::None => {
            ifd.chunks = chunks;
        }
        CompressionKind::Deflate { level: deflate_level } => {
            ifd.set(Tag::Compression, TagValue::Short(8));
            let mut compressed = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                compressed.push(deflate::compress(chunk, deflate_level, &job.cancel).await?);
            }
            ifd.chunks = compressed;
        }
    }

    Ok(ifd)
}

// -----------------------------------------------------------------------------
// OME-XML assembly
// -----------------------------------------------------------------------------

fn build_description(
    multiscales: &Multiscales,
    options: &WriteOptions,
    dtype: ArrayDtype,
) -> OmeXmlDescription {
    let physical = |axis: &str| {
        multiscales.physical_scale(axis).map(|value| PhysicalSize {
            value,
            unit: multiscales.axis_unit(axis).map(str::to_string),
        })
    };

    let size_c = multiscales.size_along("c") as usize;
    let channels: Vec<ChannelSpec> = (0..size_c)
        .map(|index| {
            let hint = multiscales.channels.get(index);
            ChannelSpec {
                id: None,
                name: hint.and_then(|h| h.label.clone()),
                color: hint.and_then(|h| h.color),
            }
        })
        .collect();

    OmeXmlDescription {
        image_name: options
            .image_name
            .clone()
            .or_else(|| multiscales.name.clone()),
        creator: options.creator.clone(),
        dtype,
        dimension_order: options.dimension_order,
        size_x: multiscales.size_along("x"),
        size_y: multiscales.size_along("y"),
        size_z: multiscales.size_along("z"),
        size_c: multiscales.size_along("c"),
        size_t: multiscales.size_along("t"),
        physical_size_x: physical("x"),
        physical_size_y: physical("y"),
        physical_size_z: physical("z"),
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plane source returning a constant fill per (level, c, z, t).
    struct FillPlanes {
        level_dims: Vec<(u64, u64)>,
    }

    #[async_trait]
    impl PlaneReader for FillPlanes {
        async fn read_plane(
            &self,
            level: usize,
            c: usize,
            z: usize,
            t: usize,
            _cancel: &CancelToken,
        ) -> Result<Bytes, IoError> {
            let (w, h) = self.level_dims[level];
            let fill = (level * 100 + c * 10 + z * 5 + t) as u8;
            Ok(Bytes::from(vec![fill; (w * h) as usize]))
        }
    }

    fn flat_multiscales(width: u64, height: u64) -> Multiscales {
        Multiscales {
            name: Some("test".into()),
            axes: vec![
                AxisDescriptor::space("y", None),
                AxisDescriptor::space("x", None),
            ],
            images: vec![MultiscaleImage {
                dimension_names: vec!["y".into(), "x".into()],
                shape: vec![height, width],
                dtype: ArrayDtype::Uint8,
            }],
            datasets: vec![DatasetTransform {
                path: "0".into(),
                scale: vec![1.0, 1.0],
                translation: None,
            }],
            channels: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_write_flat_image() {
        let ms = flat_multiscales(32, 32);
        let planes = Arc::new(FillPlanes {
            level_dims: vec![(32, 32)],
        });
        let buffer = write_ome_tiff(&ms, planes, WriteOptions::default())
            .await
            .unwrap();

        // Classic little-endian header with the first IFD at 8.
        assert_eq!(
            &buffer[0..8],
            &[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]
        );
    }

    #[tokio::test]
    async fn test_cancelled_write() {
        let ms = flat_multiscales(16, 16);
        let planes = Arc::new(FillPlanes {
            level_dims: vec![(16, 16)],
        });
        let options = WriteOptions::default();
        options.cancel.cancel();

        let err = write_ome_tiff(&ms, planes, options).await.unwrap_err();
        assert!(matches!(err, WriteError::Cancelled));
    }

    #[tokio::test]
    async fn test_plane_length_mismatch() {
        struct ShortPlanes;

        #[async_trait]
        impl PlaneReader for ShortPlanes {
            async fn read_plane(
                &self,
                _level: usize,
                _c: usize,
                _z: usize,
                _t: usize,
                _cancel: &CancelToken,
            ) -> Result<Bytes, IoError> {
                Ok(Bytes::from(vec![0u8; 10]))
            }
        }

        let ms = flat_multiscales(16, 16);
        let err = write_ome_tiff(&ms, Arc::new(ShortPlanes), WriteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::PlaneLength {
                expected: 256,
                actual: 10
            }
        ));
    }
}
