//! Local point cloud data model

pub mod dimension;
pub mod scalar_field;
pub mod point_cloud;

pub use dimension::{DimensionDescriptor, DimensionKind, PointBatch, PointRecord, Sample};
pub use scalar_field::{ScalarField, MISSING_VALUE};
pub use point_cloud::{PointCloud, Segment, SegmentOrigin};
