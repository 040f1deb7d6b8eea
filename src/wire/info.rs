//! Greyhound resource `info` document

use serde::Deserialize;

use crate::cloud::DimensionDescriptor;
use crate::core::error::Error;
use crate::core::types::{DVec3, Result};
use crate::math::Bounds;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfo {
    #[serde(default)]
    num_points: u64,
    schema: Vec<DimensionDescriptor>,
    bounds: Bounds,
    #[serde(default)]
    bounds_conforming: Option<Bounds>,
    #[serde(default)]
    base_depth: u32,
    #[serde(default)]
    srs: String,
}

/// Description of a remote resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceInfo {
    pub num_points: u64,
    pub schema: Vec<DimensionDescriptor>,
    /// Cubic bounds of the index
    pub bounds: Bounds,
    /// Tight bounds of the actual data
    pub bounds_conforming: Bounds,
    /// Shallowest depth the resource can be queried at
    pub base_depth: u32,
    /// Spatial reference system (WKT)
    pub srs: String,
}

impl ResourceInfo {
    /// Parse the JSON returned by `GET {resource}/info`. Unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawInfo = serde_json::from_str(json)?;
        let schema = raw
            .schema
            .into_iter()
            .map(DimensionDescriptor::validated)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            num_points: raw.num_points,
            schema,
            bounds: raw.bounds,
            bounds_conforming: raw.bounds_conforming.unwrap_or(raw.bounds),
            base_depth: raw.base_depth,
            srs: raw.srs,
        })
    }

    pub fn available_dim_names(&self) -> Vec<String> {
        self.schema.iter().map(|d| d.name.clone()).collect()
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionDescriptor> {
        self.schema.iter().find(|d| d.name == name)
    }

    /// Descriptors for the requested names, in request order.
    pub fn schema_for(&self, names: &[String]) -> Result<Vec<DimensionDescriptor>> {
        names
            .iter()
            .map(|name| {
                self.dimension(name).cloned().ok_or_else(|| {
                    Error::FetchFailure(format!("resource has no dimension named {}", name))
                })
            })
            .collect()
    }

    /// Minimum corner of the conforming bounds, used as the precision shift.
    /// Planar bounds contribute a zero Z.
    pub fn conforming_min(&self) -> DVec3 {
        let min = self.bounds_conforming.min();
        if min.z.is_finite() { min } else { DVec3::new(min.x, min.y, 0.0) }
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_INFO: &str = r#"{
    "type": "octree",
    "numPoints": 10653336,
    "schema": [
        { "name": "X", "size": 8, "type": "floating" },
        { "name": "Y", "size": 8, "type": "floating" },
        { "name": "Z", "size": 8, "type": "floating" },
        { "name": "Intensity", "size": 2, "type": "unsigned" },
        { "name": "Classification", "size": 1, "type": "unsigned" },
        { "name": "Red", "size": 2, "type": "unsigned" },
        { "name": "Green", "size": 2, "type": "unsigned" },
        { "name": "Blue", "size": 2, "type": "unsigned" },
        { "name": "PointId", "size": 4, "type": "unsigned" }
    ],
    "bounds": [635577, 848882, -1000, 639003, 853537, 2000],
    "boundsConforming": [635577.79, 848882.15, 406.14, 638994.75, 853535.43, 615.26],
    "baseDepth": 6,
    "srs": "PROJCS[\"NAD83 / Oregon GIC Lambert (ft)\"]"
}"#;
