//! Pyramid detection.
//!
//! Sub-resolutions appear in the wild under three conventions, probed
//! in order against an open file:
//!
//! 1. **SubIFD pyramid**: the base IFD carries a non-empty `SubIFDs`
//!    tag; each referenced child is one sub-resolution.
//! 2. **Legacy OME pyramid**: the OME-XML declares `N > 1` images and
//!    each level's planes sit in the main chain at a stride of
//!    `planesPerImage`.
//! 3. **Cloud-optimised overviews**: a bare chain of IFDs with
//!    strictly shrinking dimensions.
//!
//! Anything else is a single-level file.

use tracing::debug;

use crate::error::TiffError;
use crate::io::ByteSource;
use crate::tiff::TiffReader;

/// The detected pyramid shape of an open file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidInfo {
    /// Number of resolution levels, `>= 1`; level 0 is the base
    pub levels: usize,

    /// Whether sub-resolutions hang off the base IFD's `SubIFDs` tag
    /// (otherwise they live in the main chain)
    pub uses_sub_ifds: bool,

    /// Width of each level, base first, strictly decreasing for
    /// multi-level pyramids
    pub widths: Vec<u32>,

    /// Height of each level, parallel to `widths`
    pub heights: Vec<u32>,
}

impl PyramidInfo {
    /// A single-level pyramid of the given base dimensions.
    pub fn single(width: u32, height: u32) -> Self {
        PyramidInfo {
            levels: 1,
            uses_sub_ifds: false,
            widths: vec![width],
            heights: vec![height],
        }
    }

    /// Downsample factor of a level relative to the base, along X.
    pub fn downsample_x(&self, level: usize) -> f64 {
        self.widths[0] as f64 / self.widths[level] as f64
    }

    /// Downsample factor of a level relative to the base, along Y.
    pub fn downsample_y(&self, level: usize) -> f64 {
        self.heights[0] as f64 / self.heights[level] as f64
    }
}

/// Probe the three on-disk conventions and describe the pyramid.
///
/// `ome_image_count` is the number of `Image` elements the embedded
/// OME-XML declares, and `planes_per_image` its `sizeC*sizeZ*sizeT`;
/// together they drive the legacy-layout probe.
pub async fn detect_pyramid<S: ByteSource>(
    reader: &TiffReader<S>,
    ome_image_count: usize,
    planes_per_image: usize,
) -> Result<PyramidInfo, TiffError> {
    let base = reader.first_ifd().await?;
    let base_width = base
        .image_width()
        .ok_or(TiffError::UnsupportedTagCombination("missing ImageWidth"))?;
    let base_height = base
        .image_height()
        .ok_or(TiffError::UnsupportedTagCombination("missing ImageLength"))?;

    // Strategy 1: SubIFD pyramid.
    let sub_offsets = reader.sub_ifd_offsets(&base).await?;
    if !sub_offsets.is_empty() {
        let mut widths = vec![base_width];
        let mut heights = vec![base_height];
        for &offset in sub_offsets.iter() {
            let sub = reader.ifd_at_offset(offset).await?;
            widths.push(sub.image_width().ok_or(TiffError::UnsupportedTagCombination(
                "SubIFD missing ImageWidth",
            ))?);
            heights.push(sub.image_height().ok_or(
                TiffError::UnsupportedTagCombination("SubIFD missing ImageLength"),
            )?);
        }
        debug!(levels = widths.len(), "detected SubIFD pyramid");
        return Ok(PyramidInfo {
            levels: widths.len(),
            uses_sub_ifds: true,
            widths,
            heights,
        });
    }

    // Strategy 2: legacy OME pyramid (one Image element per level).
    if ome_image_count > 1 && planes_per_image > 0 {
        let mut widths = Vec::with_capacity(ome_image_count);
        let mut heights = Vec::with_capacity(ome_image_count);
        for level in 0..ome_image_count {
            let ifd = reader
                .ifd_by_index(level * planes_per_image)
                .await?
                .ok_or(TiffError::UnsupportedTagCombination(
                    "IFD chain shorter than the declared legacy pyramid",
                ))?;
            widths.push(ifd.image_width().unwrap_or(base_width));
            heights.push(ifd.image_height().unwrap_or(base_height));
        }
        debug!(levels = ome_image_count, "detected legacy OME pyramid");
        return Ok(PyramidInfo {
            levels: ome_image_count,
            uses_sub_ifds: false,
            widths,
            heights,
        });
    }

    // Strategy 3: cloud-optimised overview chain.
    let count = reader.ifd_count().await?;
    if count > 1 {
        let mut widths = vec![base_width];
        let mut heights = vec![base_height];
        let mut shrinking = true;
        for index in 1..count {
            let ifd = reader
                .ifd_by_index(index)
                .await?
                .ok_or(TiffError::BadOffset(index as u64))?;
            let (Some(width), Some(height)) = (ifd.image_width(), ifd.image_height()) else {
                shrinking = false;
                break;
            };
            if width >= *widths.last().unwrap() || height >= *heights.last().unwrap() {
                shrinking = false;
                break;
            }
            widths.push(width);
            heights.push(height);
        }
        if shrinking {
            debug!(levels = count, "detected cloud-optimised overview chain");
            return Ok(PyramidInfo {
                levels: count,
                uses_sub_ifds: false,
                widths,
                heights,
            });
        }
    }

    Ok(PyramidInfo::single(base_width, base_height))
}
