//! Mapping local scalar fields back onto a remote schema

use byteorder::{LittleEndian, WriteBytesExt};

use crate::cloud::{DimensionDescriptor, DimensionKind, PointCloud};
use crate::core::error::Error;
use crate::core::types::Result;

/// One local field written into one remote dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteEntry {
    pub name: String,
    /// Index of the scalar field in the cloud
    pub field_index: usize,
    /// Index of the dimension in the remote schema
    pub remote_index: usize,
    pub kind: DimensionKind,
    /// Width in bytes
    pub size: u8,
}

/// Field-to-dimension mapping used to encode a remote-shaped record buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteMapping {
    pub entries: Vec<WriteEntry>,
}

impl WriteMapping {
    /// Map the `selected` fields of `cloud` onto `remote_schema`, in remote
    /// schema order. Selected names missing on either side are skipped.
    pub fn build(
        cloud: &PointCloud,
        remote_schema: &[DimensionDescriptor],
        selected: &[String],
    ) -> Result<Self> {
        if selected.is_empty() {
            return Err(Error::UserCancelled("no dimensions selected for upload".to_string()));
        }

        let mut entries = Vec::new();
        for (remote_index, dim) in remote_schema.iter().enumerate() {
            if !selected.iter().any(|s| *s == dim.name) {
                continue;
            }
            let Some(field_index) = cloud.scalar_field_index(&dim.name) else {
                log::warn!("Skipping {}: the cloud has no such scalar field", dim.name);
                continue;
            };
            entries.push(WriteEntry {
                name: dim.name.clone(),
                field_index,
                remote_index,
                kind: dim.kind,
                size: dim.size,
            });
        }

        if entries.is_empty() {
            return Err(Error::IngestionError(
                "none of the selected fields exist in the remote schema".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// Bytes per encoded point.
    pub fn record_size(&self) -> usize {
        self.entries.iter().map(|e| e.size as usize).sum()
    }

    /// Schema of the encoded buffer.
    pub fn schema(&self) -> Vec<DimensionDescriptor> {
        self.entries
            .iter()
            .map(|e| DimensionDescriptor { name: e.name.clone(), kind: e.kind, size: e.size })
            .collect()
    }

    /// Encode every point of `cloud` as little-endian packed records.
    ///
    /// Integer values outside the declared width are truncated to its low
    /// bytes; missing values are written as zero.
    pub fn encode(&self, cloud: &PointCloud) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.record_size() * cloud.len());
        let fields = cloud.scalar_fields();

        for point in 0..cloud.len() {
            for entry in &self.entries {
                let value = fields
                    .get(entry.field_index)
                    .and_then(|sf| sf.get(point))
                    .filter(|v| !v.is_nan())
                    .unwrap_or(0.0);
                write_value(&mut buffer, value, entry.kind, entry.size)?;
            }
        }
        Ok(buffer)
    }
}

fn truncate(bits: u64, size: u8) -> u64 {
    if size >= 8 { bits } else { bits & ((1u64 << (size as u32 * 8)) - 1) }
}

fn write_value(buffer: &mut Vec<u8>, value: f64, kind: DimensionKind, size: u8) -> Result<()> {
    match kind {
        DimensionKind::Floating if size == 4 => buffer.write_f32::<LittleEndian>(value as f32)?,
        DimensionKind::Floating => buffer.write_f64::<LittleEndian>(value)?,
        DimensionKind::Signed => {
            let bits = truncate(value as i64 as u64, size);
            buffer.write_uint::<LittleEndian>(bits, size as usize)?
        }
        DimensionKind::Unsigned => {
            let bits = truncate(value as u64, size);
            buffer.write_uint::<LittleEndian>(bits, size as usize)?
        }
    }
    Ok(())
}
