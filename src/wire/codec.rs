//! Binary `read` response codec
//!
//! An uncompressed Greyhound read response is the requested dimensions
//! packed little-endian, point after point, in schema order, followed by a
//! trailing `u32` holding the number of points.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::cloud::{DimensionDescriptor, DimensionKind, PointBatch, PointRecord, Sample};
use crate::core::error::Error;
use crate::core::types::Result;

/// Bytes per point for a schema.
pub fn record_size(schema: &[DimensionDescriptor]) -> usize {
    schema.iter().map(|d| d.size as usize).sum()
}

/// Render dimensions as the `schema` query parameter.
pub fn schema_json(schema: &[DimensionDescriptor]) -> Result<String> {
    Ok(serde_json::to_string(schema)?)
}

fn read_sample(cursor: &mut Cursor<&[u8]>, dim: &DimensionDescriptor) -> std::io::Result<Sample> {
    let size = dim.size as usize;
    Ok(match dim.kind {
        DimensionKind::Floating if size == 4 => Sample::Float(cursor.read_f32::<LittleEndian>()? as f64),
        DimensionKind::Floating => Sample::Float(cursor.read_f64::<LittleEndian>()?),
        DimensionKind::Signed => Sample::Signed(cursor.read_int::<LittleEndian>(size)?),
        DimensionKind::Unsigned => Sample::Unsigned(cursor.read_uint::<LittleEndian>(size)?),
    })
}

/// Decode a read response into a batch carrying `schema`.
pub fn decode_read_response(bytes: &[u8], schema: &[DimensionDescriptor]) -> Result<PointBatch> {
    if bytes.len() < 4 {
        return Err(Error::FetchFailure(format!(
            "read response too short ({} bytes)",
            bytes.len()
        )));
    }
    let (body, tail) = bytes.split_at(bytes.len() - 4);
    let count = Cursor::new(tail).read_u32::<LittleEndian>()? as usize;

    let stride = record_size(schema);
    if body.len() != count * stride {
        return Err(Error::FetchFailure(format!(
            "read response announces {} points of {} bytes but carries {} bytes",
            count,
            stride,
            body.len()
        )));
    }

    let mut cursor = Cursor::new(body);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let values = schema
            .iter()
            .map(|dim| read_sample(&mut cursor, dim))
            .collect::<std::io::Result<Vec<_>>>()?;
        records.push(PointRecord::new(values));
    }

    Ok(PointBatch::with_records(schema.to_vec(), records))
}

fn write_sample(buffer: &mut Vec<u8>, sample: Sample, dim: &DimensionDescriptor) -> std::io::Result<()> {
    let size = dim.size as usize;
    match dim.kind {
        DimensionKind::Floating if size == 4 => buffer.write_f32::<LittleEndian>(sample.as_f64() as f32),
        DimensionKind::Floating => buffer.write_f64::<LittleEndian>(sample.as_f64()),
        DimensionKind::Signed => {
            let v = match sample {
                Sample::Signed(v) => v,
                other => other.as_f64() as i64,
            };
            buffer.write_int::<LittleEndian>(v, size)
        }
        DimensionKind::Unsigned => {
            let v = match sample {
                Sample::Unsigned(v) => v,
                other => other.as_f64() as u64,
            };
            buffer.write_uint::<LittleEndian>(v, size)
        }
    }
}

/// Encode a batch in the read response layout. Values must fit their widths.
pub fn encode_read_response(batch: &PointBatch) -> Result<Vec<u8>> {
    batch.validate()?;
    let mut buffer = Vec::with_capacity(record_size(&batch.schema) * batch.len() + 4);
    for record in &batch.records {
        for (sample, dim) in record.values.iter().zip(&batch.schema) {
            write_sample(&mut buffer, *sample, dim)?;
        }
    }
    buffer.write_u32::<LittleEndian>(batch.len() as u32)?;
    Ok(buffer)
}
