//! The multiscale description consumed by the write orchestrator.
//!
//! Mirrors the OME-Zarr multiscales model: shared axis descriptors, one
//! image per resolution level, per-level scale transforms and optional
//! display hints. The orchestrator walks level 0 for the 5D shape and
//! the remaining levels for sub-resolutions.

use crate::dtype::ArrayDtype;
use crate::error::WriteError;

// =============================================================================
// Axes
// =============================================================================

/// The kind of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    Time,
    Channel,
    Space,
}

/// One shared axis descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisDescriptor {
    /// Axis name, one of `t`, `c`, `z`, `y`, `x`
    pub name: String,

    pub kind: AxisKind,

    /// Unit name on the Zarr side (`"micrometer"`, ...)
    pub unit: Option<String>,
}

impl AxisDescriptor {
    pub fn space(name: impl Into<String>, unit: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind: AxisKind::Space,
            unit,
        }
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AxisKind::Time,
            unit: None,
        }
    }

    pub fn channel(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AxisKind::Channel,
            unit: None,
        }
    }
}

// =============================================================================
// Levels, transforms, hints
// =============================================================================

/// One resolution level: its dimension names, shape and element type.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiscaleImage {
    /// A permutation of a subset of `{t, c, z, y, x}` ending in `y, x`
    pub dimension_names: Vec<String>,

    /// Extent along each named dimension
    pub shape: Vec<u64>,

    pub dtype: ArrayDtype,
}

/// The per-level transform block.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetTransform {
    /// Dataset path, conventionally the decimal level index
    pub path: String,

    /// Scale per axis, aligned with the shared axis list
    pub scale: Vec<f64>,

    /// Optional translation per axis
    pub translation: Option<Vec<f64>>,
}

/// Display hints for one channel ("omero-like").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelHint {
    pub label: Option<String>,

    /// Packed signed 32-bit RGBA colour
    pub color: Option<i32>,
}

// =============================================================================
// Multiscales
// =============================================================================

/// A complete multiscale description: what the writer turns into an
/// OME-TIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct Multiscales {
    pub name: Option<String>,

    /// Shared ordered axis descriptors
    pub axes: Vec<AxisDescriptor>,

    /// One image per level, base resolution first
    pub images: Vec<MultiscaleImage>,

    /// One transform block per level, parallel to `images`
    pub datasets: Vec<DatasetTransform>,

    /// Optional per-channel display hints
    pub channels: Vec<ChannelHint>,
}

impl Multiscales {
    /// Check the internal consistency the orchestrator relies on.
    pub fn validate(&self) -> Result<(), WriteError> {
        let invalid = |msg: String| Err(WriteError::InvalidMultiscale(msg));

        if self.images.is_empty() {
            return invalid("no resolution levels".to_string());
        }

        let base_dtype = self.images[0].dtype;
        for (level, image) in self.images.iter().enumerate() {
            if image.dimension_names.len() != image.shape.len() {
                return invalid(format!(
                    "level {level}: {} dimension names but {} shape entries",
                    image.dimension_names.len(),
                    image.shape.len()
                ));
            }
            let names = &image.dimension_names;
            if names.len() < 2 || names[names.len() - 2] != "y" || names[names.len() - 1] != "x" {
                return invalid(format!("level {level}: dimensions must end in y, x"));
            }
            for name in names {
                if !matches!(name.as_str(), "t" | "c" | "z" | "y" | "x") {
                    return invalid(format!("level {level}: unknown dimension {name:?}"));
                }
            }
            if image.dtype != base_dtype {
                return invalid(format!("level {level}: element type differs from level 0"));
            }
            if image.shape.iter().any(|&extent| extent == 0) {
                return invalid(format!("level {level}: zero-extent dimension"));
            }
            // Non-spatial extents must not vary across levels.
            for axis in ["t", "c", "z"] {
                if image.size_along(axis) != self.images[0].size_along(axis) {
                    return invalid(format!(
                        "level {level}: size along {axis:?} differs from level 0"
                    ));
                }
            }
        }
        Ok(())
    }

    /// The element type, shared by all levels.
    pub fn dtype(&self) -> ArrayDtype {
        self.images[0].dtype
    }

    /// Number of resolution levels.
    pub fn level_count(&self) -> usize {
        self.images.len()
    }

    /// `(width, height)` of a level.
    pub fn level_dimensions(&self, level: usize) -> (u64, u64) {
        let image = &self.images[level];
        (image.size_along("x"), image.size_along("y"))
    }

    /// Extent along a named axis at level 0 (1 when the axis is absent).
    pub fn size_along(&self, name: &str) -> u64 {
        self.images[0].size_along(name)
    }

    /// The level-0 scale value of an axis, if declared.
    pub fn physical_scale(&self, name: &str) -> Option<f64> {
        let position = self.axes.iter().position(|axis| axis.name == name)?;
        self.datasets
            .first()
            .and_then(|dataset| dataset.scale.get(position))
            .copied()
    }

    /// The unit of an axis, if declared.
    pub fn axis_unit(&self, name: &str) -> Option<&str> {
        self.axes
            .iter()
            .find(|axis| axis.name == name)
            .and_then(|axis| axis.unit.as_deref())
    }
}

impl MultiscaleImage {
    /// Extent along a named dimension (1 when absent).
    pub fn size_along(&self, name: &str) -> u64 {
        self.dimension_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.shape[i])
            .unwrap_or(1)
    }
}

// =============================================================================
// Pyramid helpers
// =============================================================================

/// Largest power of two `<= n`; returns 1 for `n <= 0`.
pub fn prev_power_of_2(n: i64) -> u64 {
    if n <= 0 {
        return 1;
    }
    let n = n as u64;
    1u64 << (63 - n.leading_zeros())
}

/// Number of halving pyramid levels a `width x height` base supports
/// before the smaller dimension drops below `min_size`.
pub fn suggested_level_count(width: u64, height: u64, min_size: u64) -> usize {
    let limit = width.min(height).max(1) / min_size.max(1);
    prev_power_of_2(limit as i64).trailing_zeros() as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_image(width: u64, height: u64) -> MultiscaleImage {
        MultiscaleImage {
            dimension_names: vec!["y".into(), "x".into()],
            shape: vec![height, width],
            dtype: ArrayDtype::Uint8,
        }
    }

    fn two_level() -> Multiscales {
        Multiscales {
            name: Some("sample".into()),
            axes: vec![
                AxisDescriptor::space("y", Some("micrometer".into())),
                AxisDescriptor::space("x", Some("micrometer".into())),
            ],
            images: vec![flat_image(64, 48), flat_image(32, 24)],
            datasets: vec![
                DatasetTransform {
                    path: "0".into(),
                    scale: vec![0.5, 0.5],
                    translation: None,
                },
                DatasetTransform {
                    path: "1".into(),
                    scale: vec![1.0, 1.0],
                    translation: None,
                },
            ],
            channels: Vec::new(),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(two_level().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let mut ms = two_level();
        ms.images[0].shape = vec![48];
        assert!(ms.validate().is_err());

        let mut ms = two_level();
        ms.images[1].dimension_names = vec!["x".into(), "y".into()];
        assert!(ms.validate().is_err());

        let mut ms = two_level();
        ms.images[1].dtype = ArrayDtype::Uint16;
        assert!(ms.validate().is_err());

        let mut ms = two_level();
        ms.images.clear();
        assert!(ms.validate().is_err());
    }

    #[test]
    fn test_sizes_and_scales() {
        let ms = two_level();
        assert_eq!(ms.level_count(), 2);
        assert_eq!(ms.level_dimensions(0), (64, 48));
        assert_eq!(ms.level_dimensions(1), (32, 24));
        assert_eq!(ms.size_along("c"), 1);
        assert_eq!(ms.physical_scale("x"), Some(0.5));
        assert_eq!(ms.physical_scale("t"), None);
        assert_eq!(ms.axis_unit("x"), Some("micrometer"));
    }

    #[test]
    fn test_prev_power_of_2() {
        assert_eq!(prev_power_of_2(-5), 1);
        assert_eq!(prev_power_of_2(0), 1);
        assert_eq!(prev_power_of_2(1), 1);
        assert_eq!(prev_power_of_2(2), 2);
        assert_eq!(prev_power_of_2(3), 2);
        assert_eq!(prev_power_of_2(4), 4);
        assert_eq!(prev_power_of_2(1023), 512);
        assert_eq!(prev_power_of_2(1024), 1024);
    }

    #[test]
    fn test_suggested_level_count() {
        assert_eq!(suggested_level_count(4096, 4096, 256), 5);
        assert_eq!(suggested_level_count(512, 256, 256), 1);
        assert_eq!(suggested_level_count(100, 100, 256), 1);
    }
}
