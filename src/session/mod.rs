//! Headless session layer over the downloader

pub mod entity;
pub mod selection;
pub mod manager;

pub use entity::{resource_name, Entity, EntityId, GreyhoundCloud, GreyhoundResource};
pub use selection::{
    AllDimensions, BoundsSelector, DimensionSelector, FixedBounds, FixedDimensions,
    PreselectedDimensions,
};
pub use manager::{Session, DEFAULT_UPLOAD_NAME};
