//! Greyhound loader - progressive point cloud download and ingestion

pub mod core;
pub mod math;
pub mod cloud;
pub mod convert;
pub mod wire;
pub mod streaming;
pub mod session;
