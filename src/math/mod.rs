//! Spatial value types

pub mod bounds;

pub use bounds::Bounds;
