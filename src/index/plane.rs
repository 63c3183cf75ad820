//! Plane arithmetic: mapping `(c, z, t)` selections to linear IFD
//! indices and back, for all six dimension orders, plus the multi-file
//! `TiffData` filtering that replaces the arithmetic with an explicit
//! lookup table.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::error::IndexError;
use crate::ome::{DimensionOrder, OmeChannel, OmePixels, PlaneAxis, TiffDataEntry};

// =============================================================================
// Selections and sizes
// =============================================================================

/// A `(c, z, t)` plane selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneSelection {
    pub c: usize,
    pub z: usize,
    pub t: usize,
}

impl PlaneSelection {
    pub fn new(c: usize, z: usize, t: usize) -> Self {
        Self { c, z, t }
    }

    fn index_along(&self, axis: PlaneAxis) -> usize {
        match axis {
            PlaneAxis::C => self.c,
            PlaneAxis::Z => self.z,
            PlaneAxis::T => self.t,
        }
    }
}

/// The three non-spatial dimension sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneSizes {
    pub size_c: usize,
    pub size_z: usize,
    pub size_t: usize,
}

impl PlaneSizes {
    pub fn new(size_c: usize, size_z: usize, size_t: usize) -> Self {
        Self {
            size_c,
            size_z,
            size_t,
        }
    }

    pub fn from_pixels(pixels: &OmePixels) -> Self {
        Self {
            size_c: pixels.size_c as usize,
            size_z: pixels.size_z as usize,
            size_t: pixels.size_t as usize,
        }
    }

    /// `sizeC * sizeZ * sizeT`.
    pub fn plane_count(&self) -> usize {
        self.size_c * self.size_z * self.size_t
    }

    fn size_along(&self, axis: PlaneAxis) -> usize {
        match axis {
            PlaneAxis::C => self.size_c,
            PlaneAxis::Z => self.size_z,
            PlaneAxis::T => self.size_t,
        }
    }

    fn contains(&self, sel: PlaneSelection) -> bool {
        sel.c < self.size_c && sel.z < self.size_z && sel.t < self.size_t
    }
}

// =============================================================================
// Index arithmetic
// =============================================================================

/// Linear IFD index of a plane under a dimension order.
///
/// With the order's tail naming axes fastest-to-slowest `d0, d1, d2`,
/// the index is `i0 + size(d0)*i1 + size(d0)*size(d1)*i2`.
pub fn plane_to_ifd(
    order: DimensionOrder,
    sizes: PlaneSizes,
    sel: PlaneSelection,
) -> Result<usize, IndexError> {
    if !sizes.contains(sel) {
        return Err(IndexError::NoSuchPlane {
            c: sel.c,
            z: sel.z,
            t: sel.t,
        });
    }
    let [d0, d1, d2] = order.tail();
    Ok(sel.index_along(d0)
        + sizes.size_along(d0) * sel.index_along(d1)
        + sizes.size_along(d0) * sizes.size_along(d1) * sel.index_along(d2))
}

/// Inverse of [`plane_to_ifd`] for the same order and sizes.
pub fn ifd_to_plane(
    order: DimensionOrder,
    sizes: PlaneSizes,
    index: usize,
) -> Result<PlaneSelection, IndexError> {
    let [d0, d1, d2] = order.tail();
    let s0 = sizes.size_along(d0).max(1);
    let s1 = sizes.size_along(d1).max(1);

    let i0 = index % s0;
    let i1 = (index / s0) % s1;
    let i2 = index / (s0 * s1);

    let mut sel = PlaneSelection::new(0, 0, 0);
    for (axis, value) in [(d0, i0), (d1, i1), (d2, i2)] {
        match axis {
            PlaneAxis::C => sel.c = value,
            PlaneAxis::Z => sel.z = value,
            PlaneAxis::T => sel.t = value,
        }
    }

    if !sizes.contains(sel) {
        return Err(IndexError::NoSuchPlane {
            c: sel.c,
            z: sel.z,
            t: sel.t,
        });
    }
    Ok(sel)
}

// =============================================================================
// Multi-file TiffData filtering
// =============================================================================

/// The outcome of filtering a multi-file plane declaration down to one
/// file: reduced pixel metadata and an explicit plane→IFD table.
#[derive(Debug, Clone)]
pub struct FilteredPlanes {
    /// Pixels with dimension sizes and channels restricted to the
    /// planes local to this file
    pub pixels: OmePixels,

    /// Lookup from local `(c, z, t)` to the IFD index in this file
    pub ifd_map: HashMap<(usize, usize, usize), usize>,
}

/// Partition the declared `TiffData` entries into local and remote
/// planes and, if any are remote, build the dense local remapping.
///
/// Returns `None` when every entry is local (or none are declared); the
/// arithmetic indexer then applies unchanged. An entry is local when
/// its UUID is absent or equals `root_uuid`.
pub fn filter_multi_file(
    pixels: &OmePixels,
    root_uuid: Option<&str>,
) -> Result<Option<FilteredPlanes>, IndexError> {
    if pixels.tiff_data.is_empty() {
        return Ok(None);
    }

    let order = pixels.dimension_order;
    let sizes = PlaneSizes::from_pixels(pixels);

    let mut local: Vec<(PlaneSelection, usize)> = Vec::new();
    let mut any_remote = false;

    for entry in &pixels.tiff_data {
        let is_local = match (&entry.uuid, root_uuid) {
            (None, _) => true,
            (Some(uuid), Some(root)) => uuid == root,
            (Some(_), None) => false,
        };
        if !is_local {
            any_remote = true;
            continue;
        }

        let first = PlaneSelection::new(entry.first_c, entry.first_z, entry.first_t);
        let Ok(base) = plane_to_ifd(order, sizes, first) else {
            debug!(?entry, "TiffData entry outside declared sizes, skipped");
            continue;
        };
        for i in 0..entry.plane_count {
            match ifd_to_plane(order, sizes, base + i) {
                Ok(sel) => local.push((sel, entry.ifd + i)),
                Err(_) => {
                    debug!(?entry, "TiffData run extends past plane count, clipped");
                    break;
                }
            }
        }
    }

    if !any_remote {
        return Ok(None);
    }

    // Dense remap over the sorted local index sets.
    let local_c: BTreeSet<usize> = local.iter().map(|(sel, _)| sel.c).collect();
    let local_z: BTreeSet<usize> = local.iter().map(|(sel, _)| sel.z).collect();
    let local_t: BTreeSet<usize> = local.iter().map(|(sel, _)| sel.t).collect();

    let rank = |set: &BTreeSet<usize>, value: usize| set.range(..value).count();

    let mut ifd_map = HashMap::with_capacity(local.len());
    for (sel, ifd) in &local {
        let key = (
            rank(&local_c, sel.c),
            rank(&local_z, sel.z),
            rank(&local_t, sel.t),
        );
        ifd_map.insert(key, *ifd);
    }

    let channels: Vec<OmeChannel> = local_c
        .iter()
        .enumerate()
        .map(|(dense, &c)| {
            pixels
                .channels
                .get(c)
                .cloned()
                .unwrap_or_else(|| OmeChannel::synthesized(dense))
        })
        .collect();

    let entries: Vec<TiffDataEntry> = pixels
        .tiff_data
        .iter()
        .filter(|entry| match (&entry.uuid, root_uuid) {
            (None, _) => true,
            (Some(uuid), Some(root)) => uuid == root,
            (Some(_), None) => false,
        })
        .cloned()
        .collect();

    let mut filtered = pixels.clone();
    filtered.size_c = local_c.len().max(1) as u32;
    filtered.size_z = local_z.len().max(1) as u32;
    filtered.size_t = local_t.len().max(1) as u32;
    filtered.channels = channels;
    filtered.tiff_data = entries;

    Ok(Some(FilteredPlanes {
        pixels: filtered,
        ifd_map,
    }))
}

// =============================================================================
// Tests
// =============================================================================
