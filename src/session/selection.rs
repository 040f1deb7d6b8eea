//! Choices a user makes before a download or upload

use crate::math::Bounds;
use crate::wire::ResourceInfo;

/// Picks the dimensions to download or upload.
///
/// Returning an empty list cancels the operation.
pub trait DimensionSelector {
    fn select(&mut self, available: &[String], preselected: &[String]) -> Vec<String>;
}

/// Picks the region to download. `None` falls back to the configured
/// default bounds, then to the resource's conforming bounds.
pub trait BoundsSelector {
    fn select(&mut self, resource: &ResourceInfo) -> Option<Bounds>;
}

impl<F> DimensionSelector for F
where
    F: FnMut(&[String], &[String]) -> Vec<String>,
{
    fn select(&mut self, available: &[String], preselected: &[String]) -> Vec<String> {
        self(available, preselected)
    }
}

impl<F> BoundsSelector for F
where
    F: FnMut(&ResourceInfo) -> Option<Bounds>,
{
    fn select(&mut self, resource: &ResourceInfo) -> Option<Bounds> {
        self(resource)
    }
}

/// Accepts whatever is offered.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllDimensions;

impl DimensionSelector for AllDimensions {
    fn select(&mut self, available: &[String], _preselected: &[String]) -> Vec<String> {
        available.to_vec()
    }
}

/// Accepts only the preselected dimensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreselectedDimensions;

impl DimensionSelector for PreselectedDimensions {
    fn select(&mut self, _available: &[String], preselected: &[String]) -> Vec<String> {
        preselected.to_vec()
    }
}

/// A fixed list, narrowed to what is available.
#[derive(Clone, Debug, Default)]
pub struct FixedDimensions(pub Vec<String>);

impl DimensionSelector for FixedDimensions {
    fn select(&mut self, available: &[String], _preselected: &[String]) -> Vec<String> {
        self.0
            .iter()
            .filter(|name| available.contains(name))
            .cloned()
            .collect()
    }
}

/// Always answers with the same bounds (or defers with `None`).
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedBounds(pub Option<Bounds>);

impl BoundsSelector for FixedBounds {
    fn select(&mut self, _resource: &ResourceInfo) -> Option<Bounds> {
        self.0
    }
}
