//! Conversion of fetched records into the local cloud, and back

pub mod color;
pub mod converter;
pub mod writeback;

pub use color::ColorDepth;
pub use converter::PointRecordConverter;
pub use writeback::{WriteEntry, WriteMapping};
