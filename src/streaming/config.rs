//! Download configuration

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::convert::ColorDepth;
use crate::math::Bounds;

use super::planner::DownloadMethod;

/// Settings for progressive downloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Traversal used after the base depth
    pub method: DownloadMethod,
    /// Deepest depth ever requested (None = until the service runs dry)
    pub max_depth: Option<u32>,
    /// How color channels are reduced to 8 bits
    pub color_depth: ColorDepth,
    /// Bounds used when the bounds selector declines to choose
    pub default_bounds: Option<Bounds>,
    /// Preset the precision shift from the resource's conforming bounds
    pub shift_from_resource: bool,
    /// Dimensions preselected when asking which ones to download
    pub preselected_dims: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            method: DownloadMethod::DepthByDepth,
            max_depth: None,
            color_depth: ColorDepth::Auto,
            default_bounds: None,
            shift_from_resource: true,
            preselected_dims: vec!["X".to_string(), "Y".to_string(), "Z".to_string()],
        }
    }
}

impl DownloadConfig {
    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<(), io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)
    }

    /// Load from file (sync). Missing keys take their default values.
    pub fn load_sync(path: &Path) -> Result<Self, io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DownloadConfig =
            serde_json::from_str(r#"{"method":"quadtree","max_depth":12}"#).unwrap();
        assert_eq!(config.method, DownloadMethod::Quadtree);
        assert_eq!(config.max_depth, Some(12));
        assert_eq!(config.color_depth, ColorDepth::Auto);
        assert!(config.shift_from_resource);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("download.json");
        let config = DownloadConfig {
            method: DownloadMethod::Octree,
            default_bounds: Some(Bounds::new_2d(0.0, 0.0, 5.0, 5.0).unwrap()),
            color_depth: ColorDepth::Bits8,
            ..Default::default()
        };
        config.save_sync(&path).unwrap();
        assert_eq!(DownloadConfig::load_sync(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download.json");
        std::fs::write(&path, "not json").unwrap();
        let err = DownloadConfig::load_sync(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
