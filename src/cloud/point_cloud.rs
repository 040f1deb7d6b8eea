//! Column-oriented point cloud assembled from fetched batches

use crate::core::error::Error;
use crate::core::types::{DVec3, Result, Vec3};
use crate::math::Bounds;

use super::scalar_field::ScalarField;

/// The query a run of points was fetched with.
///
/// Re-issuing the same query with other dimensions yields records for the
/// same points, in the same order.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentOrigin {
    pub bounds: Bounds,
    pub depth_begin: u32,
    pub depth_end: u32,
}

/// A run of consecutive points ingested from one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub origin: Option<SegmentOrigin>,
    /// Index of the first point of the run
    pub start: usize,
    /// Number of points in the run
    pub len: usize,
}

impl Segment {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Growing local store of positions, colors and scalar fields.
///
/// Positions are kept relative to a precision shift so they fit in `f32`.
/// After every ingested batch the cloud is self-consistent: every scalar
/// field and the color table (when present) have one entry per point.
#[derive(Clone, Debug, Default)]
pub struct PointCloud {
    pub(crate) name: String,
    pub(crate) positions: Vec<Vec3>,
    pub(crate) shift: DVec3,
    /// Set by `set_shift` or the first geometry batch; a zero shift can be established too
    pub(crate) shift_set: bool,
    pub(crate) rgb: Option<Vec<[u8; 3]>>,
    /// Set once a batch without full color arrived; color stays off afterwards
    pub(crate) color_disabled: bool,
    pub(crate) fields: Vec<ScalarField>,
    pub(crate) displayed_field: Option<usize>,
    pub(crate) segments: Vec<Segment>,
}

impl PointCloud {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Shifted positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Absolute coordinates of a point.
    pub fn absolute_position(&self, index: usize) -> Option<DVec3> {
        self.positions.get(index).map(|p| p.as_dvec3() + self.shift)
    }

    pub fn shift(&self) -> DVec3 {
        self.shift
    }

    pub fn has_shift(&self) -> bool {
        self.shift_set
    }

    /// Set the precision shift before any geometry is stored.
    ///
    /// Once set the shift is permanent; setting a different value later fails.
    pub fn set_shift(&mut self, shift: DVec3) -> Result<()> {
        if self.has_shift() && self.shift != shift {
            return Err(Error::IngestionError(format!(
                "precision shift already set to {} (refusing {})",
                self.shift, shift
            )));
        }
        if !self.has_shift() && !self.positions.is_empty() {
            return Err(Error::IngestionError(
                "cannot set a shift on a cloud that already stores unshifted points".to_string(),
            ));
        }
        self.shift = shift;
        self.shift_set = true;
        Ok(())
    }

    pub fn has_colors(&self) -> bool {
        self.rgb.is_some()
    }

    pub fn colors(&self) -> Option<&[[u8; 3]]> {
        self.rgb.as_deref()
    }

    pub fn scalar_fields(&self) -> &[ScalarField] {
        &self.fields
    }

    pub fn scalar_field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn scalar_field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|sf| sf.name() == name)
    }

    pub fn scalar_field(&self, name: &str) -> Option<&ScalarField> {
        self.fields.iter().find(|sf| sf.name() == name)
    }

    pub fn scalar_field_names(&self) -> Vec<String> {
        self.fields.iter().map(|sf| sf.name().to_string()).collect()
    }

    /// The field shown by default (the first Intensity field seen).
    pub fn displayed_field(&self) -> Option<&ScalarField> {
        self.displayed_field.and_then(|i| self.fields.get(i))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Bounding box of the stored (absolute) positions.
    pub fn bounding_box(&self) -> Option<(DVec3, DVec3)> {
        let first = self.positions.first()?.as_dvec3();
        let (min, max) = self.positions.iter().fold((first, first), |(min, max), p| {
            let p = p.as_dvec3();
            (min.min(p), max.max(p))
        });
        Some((min + self.shift, max + self.shift))
    }

    /// Verify the per-point invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let n = self.len();
        for sf in &self.fields {
            if sf.len() != n {
                return Err(Error::IngestionError(format!(
                    "scalar field {} has {} values for {} points",
                    sf.name(),
                    sf.len(),
                    n
                )));
            }
        }
        if let Some(rgb) = &self.rgb {
            if rgb.len() != n {
                return Err(Error::IngestionError(format!(
                    "color table has {} entries for {} points",
                    rgb.len(),
                    n
                )));
            }
        }
        let covered: usize = self.segments.iter().map(|s| s.len).sum();
        if covered != n {
            return Err(Error::IngestionError(format!(
                "segments cover {} of {} points",
                covered, n
            )));
        }
        Ok(())
    }
}
