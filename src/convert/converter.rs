//! Point record ingestion into a [`PointCloud`]

use std::collections::HashSet;

use crate::cloud::dimension::{is_reserved, DIM_INTENSITY};
use crate::cloud::{PointBatch, PointCloud, PointRecord, ScalarField, Segment, SegmentOrigin};
use crate::core::error::Error;
use crate::core::types::{DVec3, Result, Vec3};

use super::color::{to_8bit, ColorDepth};

/// Colors fetched during an extension round, committed only once every
/// point of the cloud received one.
#[derive(Debug, Default)]
struct StagedColors {
    values: Vec<[u8; 3]>,
    segments: HashSet<usize>,
}

/// Converts fetched batches into a point cloud.
///
/// Geometry batches append points (`convert`); extension batches add new
/// dimensions to points already stored (`attach`). Every call validates the
/// whole batch before touching the cloud, so a rejected batch leaves it
/// unchanged.
#[derive(Debug, Default)]
pub struct PointRecordConverter {
    color_depth: ColorDepth,
    staged_colors: Option<StagedColors>,
}

fn position_of(record: &PointRecord, xyz: [usize; 3]) -> DVec3 {
    let get = |i: usize| record.values[i].as_f64();
    DVec3::new(get(xyz[0]), get(xyz[1]), get(xyz[2]))
}

impl PointRecordConverter {
    pub fn new(color_depth: ColorDepth) -> Self {
        Self { color_depth, staged_colors: None }
    }

    pub fn color_depth(&self) -> ColorDepth {
        self.color_depth
    }

    /// Append a batch of points with no recorded query origin.
    pub fn convert(&mut self, batch: &PointBatch, cloud: &mut PointCloud) -> Result<usize> {
        self.convert_from(batch, None, cloud)
    }

    /// Append a batch of points, remembering the query that produced it.
    ///
    /// Returns the number of points appended. An empty batch is a normal
    /// terminal signal and appends nothing.
    pub fn convert_from(
        &mut self,
        batch: &PointBatch,
        origin: Option<SegmentOrigin>,
        cloud: &mut PointCloud,
    ) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        batch.validate()?;

        let xyz = batch.geometry_indices().ok_or_else(|| {
            Error::IngestionError("batch carries points but no X/Y/Z dimensions".to_string())
        })?;

        let absolute: Vec<DVec3> = batch.records.iter().map(|r| position_of(r, xyz)).collect();
        if let Some(bad) = absolute.iter().position(|p| !p.is_finite()) {
            return Err(Error::IngestionError(format!(
                "record {} has a non-finite position",
                bad
            )));
        }

        let shift = if !cloud.shift_set {
            let min = absolute
                .iter()
                .fold(DVec3::splat(f64::INFINITY), |acc, p| acc.min(*p));
            log::debug!("Precision shift established from first batch: {}", min);
            min
        } else {
            cloud.shift
        };

        let colors = self.batch_colors(batch);

        // Nothing below can fail.
        let n = batch.len();
        let start = cloud.len();
        cloud.shift = shift;
        cloud.shift_set = true;

        cloud.positions.reserve(n);
        cloud
            .positions
            .extend(absolute.iter().map(|p| (*p - shift).as_vec3()));

        self.append_colors(colors, start, cloud);
        Self::append_scalar_fields(batch, start, cloud);

        cloud.segments.push(Segment { origin, start, len: n });
        debug_assert!(cloud.check_invariants().is_ok());

        log::trace!("Converted {} points ({} total)", n, cloud.len());
        Ok(n)
    }

    /// Add the dimensions of `batch` to the points of an existing segment.
    ///
    /// The batch must be a re-fetch of the segment's query: same record count,
    /// same order. Geometry in the batch is ignored.
    pub fn attach(
        &mut self,
        batch: &PointBatch,
        segment_index: usize,
        cloud: &mut PointCloud,
    ) -> Result<usize> {
        let segment = cloud.segments.get(segment_index).cloned().ok_or_else(|| {
            Error::IngestionError(format!("cloud has no segment {}", segment_index))
        })?;
        if batch.len() != segment.len {
            return Err(Error::IngestionError(format!(
                "segment {} holds {} points but the batch has {} records",
                segment_index,
                segment.len,
                batch.len()
            )));
        }
        if batch.is_empty() {
            return Ok(0);
        }
        batch.validate()?;

        let colors = self.batch_colors(batch);
        let total = cloud.len();

        for (dim_index, dim) in batch.schema.iter().enumerate() {
            if is_reserved(&dim.name) {
                continue;
            }
            let field_index = Self::field_index_or_create(cloud, &dim.name, total);
            let sf = &mut cloud.fields[field_index];
            let overwrites = sf.values()[segment.range()].iter().any(|v| !v.is_nan());
            for (offset, record) in batch.records.iter().enumerate() {
                sf.set(segment.start + offset, record.values[dim_index].as_f64());
            }
            // Replaced values may have been the extremes.
            if overwrites {
                sf.compute_min_and_max();
            }
        }

        if let Some(colors) = colors {
            let staged = self.staged_colors.get_or_insert_with(|| StagedColors {
                values: vec![[0; 3]; total],
                segments: HashSet::new(),
            });
            if staged.values.len() == total {
                staged.values[segment.range()].copy_from_slice(&colors);
                staged.segments.insert(segment_index);
            }
        }

        debug_assert!(cloud.check_invariants().is_ok());
        Ok(batch.len())
    }

    /// Commit colors gathered by `attach` if they cover every point.
    ///
    /// Returns true when the cloud's color table was replaced.
    pub fn finish(&mut self, cloud: &mut PointCloud) -> bool {
        let Some(staged) = self.staged_colors.take() else {
            return false;
        };
        let covered: usize = staged
            .segments
            .iter()
            .filter_map(|i| cloud.segments.get(*i))
            .map(|s| s.len)
            .sum();
        if staged.values.len() != cloud.len() || covered != cloud.len() {
            log::warn!(
                "Discarding colors for {} of {} points: every point needs a color",
                covered,
                cloud.len()
            );
            return false;
        }
        cloud.rgb = Some(staged.values);
        cloud.color_disabled = false;
        true
    }

    fn batch_colors(&self, batch: &PointBatch) -> Option<Vec<[u8; 3]>> {
        let rgb = batch.color_indices()?;
        let shifts = rgb.map(|i| self.color_depth.needs_downshift(&batch.schema[i]));
        Some(
            batch
                .records
                .iter()
                .map(|r| {
                    [0, 1, 2].map(|c| to_8bit(r.values[rgb[c]].as_u16(), shifts[c]))
                })
                .collect(),
        )
    }

    fn append_colors(&self, colors: Option<Vec<[u8; 3]>>, start: usize, cloud: &mut PointCloud) {
        let Some(colors) = colors else {
            if cloud.rgb.take().is_some() {
                log::warn!("Batch without full color: disabling colors for the whole cloud");
            }
            cloud.color_disabled = true;
            return;
        };
        if let Some(rgb) = cloud.rgb.as_mut() {
            rgb.extend(colors);
        } else if start == 0 && !cloud.color_disabled {
            cloud.rgb = Some(colors);
        }
    }

    fn append_scalar_fields(batch: &PointBatch, start: usize, cloud: &mut PointCloud) {
        let n = batch.len();
        for (dim_index, dim) in batch.schema.iter().enumerate() {
            if is_reserved(&dim.name) {
                continue;
            }
            let field_index = Self::field_index_or_create(cloud, &dim.name, start);
            let sf = &mut cloud.fields[field_index];
            sf.reserve(n);
            for record in &batch.records {
                sf.push(record.values[dim_index].as_f64());
            }
        }

        // Fields this batch did not carry
        for sf in &mut cloud.fields {
            sf.pad_to(start + n);
        }
    }

    fn field_index_or_create(cloud: &mut PointCloud, name: &str, len: usize) -> usize {
        let index = match cloud.scalar_field_index(name) {
            Some(index) => index,
            None => {
                log::debug!("New scalar field {} (back-filled for {} points)", name, len);
                cloud.fields.push(ScalarField::filled(name, len));
                cloud.fields.len() - 1
            }
        };
        if cloud.displayed_field.is_none() && name == DIM_INTENSITY {
            cloud.displayed_field = Some(index);
        }
        index
    }
}
