//! Remote dimension schema and fetched point records

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

pub const DIM_X: &str = "X";
pub const DIM_Y: &str = "Y";
pub const DIM_Z: &str = "Z";
pub const DIM_RED: &str = "Red";
pub const DIM_GREEN: &str = "Green";
pub const DIM_BLUE: &str = "Blue";
pub const DIM_INTENSITY: &str = "Intensity";
pub const DIM_POINT_ID: &str = "PointId";

/// Names that make up the position of a point.
pub const GEOMETRY_DIMS: [&str; 3] = [DIM_X, DIM_Y, DIM_Z];
/// Names that make up the color of a point.
pub const COLOR_DIMS: [&str; 3] = [DIM_RED, DIM_GREEN, DIM_BLUE];

/// Whether a dimension is stored as geometry or color rather than as a scalar field.
pub fn is_reserved(name: &str) -> bool {
    GEOMETRY_DIMS.contains(&name) || COLOR_DIMS.contains(&name)
}

/// Numeric kind of a remote dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Signed,
    Unsigned,
    Floating,
}

/// One entry of a remote schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DimensionKind,
    /// Width in bytes
    pub size: u8,
}

impl DimensionDescriptor {
    /// Create a descriptor, rejecting widths the wire format cannot carry.
    pub fn new(name: impl Into<String>, kind: DimensionKind, size: u8) -> Result<Self> {
        let name = name.into();
        let valid = match kind {
            DimensionKind::Floating => matches!(size, 4 | 8),
            DimensionKind::Signed | DimensionKind::Unsigned => matches!(size, 1 | 2 | 4 | 8),
        };
        if !valid {
            return Err(Error::IngestionError(format!(
                "dimension {} has unsupported {:?} width {}",
                name, kind, size
            )));
        }
        Ok(Self { name, kind, size })
    }

    pub fn signed(name: impl Into<String>, size: u8) -> Self {
        Self { name: name.into(), kind: DimensionKind::Signed, size }
    }

    pub fn unsigned(name: impl Into<String>, size: u8) -> Self {
        Self { name: name.into(), kind: DimensionKind::Unsigned, size }
    }

    pub fn floating(name: impl Into<String>, size: u8) -> Self {
        Self { name: name.into(), kind: DimensionKind::Floating, size }
    }

    /// Re-validate a descriptor that arrived through serde.
    pub fn validated(self) -> Result<Self> {
        Self::new(self.name, self.kind, self.size)
    }
}

/// A single dynamically-typed value of a point record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Sample {
    /// Widen to `f64` for geometry and scalar fields.
    pub fn as_f64(self) -> f64 {
        match self {
            Sample::Signed(v) => v as f64,
            Sample::Unsigned(v) => v as f64,
            Sample::Float(v) => v,
        }
    }

    /// Clamp to the `u16` range used for color channels.
    pub fn as_u16(self) -> u16 {
        match self {
            Sample::Signed(v) => v.clamp(0, u16::MAX as i64) as u16,
            Sample::Unsigned(v) => v.min(u16::MAX as u64) as u16,
            Sample::Float(v) if v.is_nan() => 0,
            Sample::Float(v) => v.clamp(0.0, u16::MAX as f64) as u16,
        }
    }
}

/// One fetched point: one sample per dimension of its batch schema, in schema order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointRecord {
    pub values: Vec<Sample>,
}

impl PointRecord {
    pub fn new(values: Vec<Sample>) -> Self {
        Self { values }
    }

    /// Convenience constructor from floating values.
    pub fn from_f64(values: &[f64]) -> Self {
        Self { values: values.iter().map(|v| Sample::Float(*v)).collect() }
    }

    pub fn get(&self, index: usize) -> Option<Sample> {
        self.values.get(index).copied()
    }
}

/// The records returned by one fetch plus the dimensions actually present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointBatch {
    pub schema: Vec<DimensionDescriptor>,
    pub records: Vec<PointRecord>,
}

impl PointBatch {
    pub fn new(schema: Vec<DimensionDescriptor>) -> Self {
        Self { schema, records: Vec::new() }
    }

    pub fn with_records(schema: Vec<DimensionDescriptor>, records: Vec<PointRecord>) -> Self {
        Self { schema, records }
    }

    pub fn push(&mut self, record: PointRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a dimension in the schema.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|d| d.name == name)
    }

    pub fn has_dim(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Indices of X, Y and Z when all three are present.
    pub fn geometry_indices(&self) -> Option<[usize; 3]> {
        Some([
            self.index_of(DIM_X)?,
            self.index_of(DIM_Y)?,
            self.index_of(DIM_Z)?,
        ])
    }

    /// Indices of Red, Green and Blue when all three are present.
    pub fn color_indices(&self) -> Option<[usize; 3]> {
        Some([
            self.index_of(DIM_RED)?,
            self.index_of(DIM_GREEN)?,
            self.index_of(DIM_BLUE)?,
        ])
    }

    /// Check that every record carries exactly one sample per schema entry
    /// and that the schema has no duplicate names.
    pub fn validate(&self) -> Result<()> {
        for (i, dim) in self.schema.iter().enumerate() {
            if self.schema[..i].iter().any(|d| d.name == dim.name) {
                return Err(Error::IngestionError(format!(
                    "dimension {} declared twice in batch schema",
                    dim.name
                )));
            }
        }
        for (i, record) in self.records.iter().enumerate() {
            if record.values.len() != self.schema.len() {
                return Err(Error::IngestionError(format!(
                    "record {} has {} values but the schema declares {} dimensions",
                    i,
                    record.values.len(),
                    self.schema.len()
                )));
            }
        }
        Ok(())
    }
}
