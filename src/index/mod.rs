//! The plane↔IFD indexer.
//!
//! Ties together the dimension-order arithmetic, the multi-file
//! `TiffData` table and the detected pyramid into a single resolver the
//! read facade consults for every pixel access: `(c, z, t, level)` in,
//! IFD out.

mod plane;
mod pyramid;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{IndexError, StoreError};
use crate::io::ByteSource;
use crate::ome::{DimensionOrder, OmePixels};
use crate::tiff::{Ifd, TiffReader};

pub use plane::{
    filter_multi_file, ifd_to_plane, plane_to_ifd, FilteredPlanes, PlaneSelection, PlaneSizes,
};
pub use pyramid::{detect_pyramid, PyramidInfo};

/// Resolves plane selections and pyramid levels to IFDs.
#[derive(Debug, Clone)]
pub struct PlaneIndexer {
    order: DimensionOrder,
    sizes: PlaneSizes,

    /// Explicit plane table for multi-file sets; `None` means the
    /// arithmetic mapping applies
    ifd_map: Option<HashMap<(usize, usize, usize), usize>>,

    pyramid: PyramidInfo,

    /// Chain stride between legacy pyramid levels
    planes_per_image: usize,
}

impl PlaneIndexer {
    /// Build an indexer for pixels whose planes follow the arithmetic
    /// dimension-order layout.
    pub fn new(pixels: &OmePixels, pyramid: PyramidInfo) -> Self {
        let sizes = PlaneSizes::from_pixels(pixels);
        Self {
            order: pixels.dimension_order,
            sizes,
            ifd_map: None,
            pyramid,
            planes_per_image: sizes.plane_count(),
        }
    }

    /// Build an indexer backed by an explicit multi-file plane table.
    pub fn with_ifd_map(
        pixels: &OmePixels,
        pyramid: PyramidInfo,
        ifd_map: HashMap<(usize, usize, usize), usize>,
    ) -> Self {
        let sizes = PlaneSizes::from_pixels(pixels);
        Self {
            order: pixels.dimension_order,
            sizes,
            ifd_map: Some(ifd_map),
            pyramid,
            planes_per_image: sizes.plane_count(),
        }
    }

    /// The detected pyramid.
    pub fn pyramid(&self) -> &PyramidInfo {
        &self.pyramid
    }

    /// The dimension sizes this indexer validates selections against.
    pub fn sizes(&self) -> PlaneSizes {
        self.sizes
    }

    /// The base (level 0) IFD chain index of a selection.
    pub fn base_ifd_index(&self, sel: PlaneSelection) -> Result<usize, IndexError> {
        match &self.ifd_map {
            Some(map) => map.get(&(sel.c, sel.z, sel.t)).copied().ok_or(
                IndexError::NoSuchPlane {
                    c: sel.c,
                    z: sel.z,
                    t: sel.t,
                },
            ),
            None => plane_to_ifd(self.order, self.sizes, sel),
        }
    }

    /// Resolve a selection at a pyramid level to its IFD.
    pub async fn resolve_ifd<S: ByteSource>(
        &self,
        reader: &TiffReader<S>,
        sel: PlaneSelection,
        level: usize,
    ) -> Result<Arc<Ifd>, StoreError> {
        if level >= self.pyramid.levels {
            return Err(IndexError::NoSuchLevel {
                level,
                levels: self.pyramid.levels,
            }
            .into());
        }

        let base_index = self.base_ifd_index(sel)?;
        let base = reader
            .ifd_by_index(base_index)
            .await?
            .ok_or(IndexError::NoSuchPlane {
                c: sel.c,
                z: sel.z,
                t: sel.t,
            })?;

        if level == 0 {
            return Ok(base);
        }

        if self.pyramid.uses_sub_ifds {
            let offsets = reader.sub_ifd_offsets(&base).await?;
            let offset = *offsets.get(level - 1).ok_or(IndexError::NoSuchLevel {
                level,
                levels: self.pyramid.levels,
            })?;
            Ok(reader.ifd_at_offset(offset).await?)
        } else {
            let index = base_index + level * self.planes_per_image;
            reader
                .ifd_by_index(index)
                .await?
                .ok_or_else(|| {
                    IndexError::NoSuchLevel {
                        level,
                        levels: self.pyramid.levels,
                    }
                    .into()
                })
        }
    }
}
