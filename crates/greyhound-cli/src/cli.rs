//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use greyhound_loader::convert::ColorDepth;
use greyhound_loader::core::types::Result;
use greyhound_loader::math::Bounds;
use greyhound_loader::session::{DimensionSelector, FixedDimensions};
use greyhound_loader::streaming::{DownloadConfig, DownloadMethod};

/// Greyhound command-line arguments.
///
/// Flags override settings loaded with `--config`.
#[derive(Parser, Debug)]
#[command(name = "greyhound", about = "Progressive Greyhound point cloud downloads")]
pub struct CliArgs {
    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Download settings file (JSON).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// HTTP settings file (JSON).
    #[arg(long, global = true)]
    pub http_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a resource's description.
    Info {
        /// Resource URL, e.g. http://host:8080/resource/autzen
        url: String,
    },
    /// Download a region of a resource and print a summary of the cloud.
    Download {
        /// Resource URL, e.g. http://host:8080/resource/autzen
        url: String,
        #[command(flatten)]
        options: DownloadArgs,
    },
    /// Same as download, from a generated in-memory resource.
    Demo {
        /// Number of populated depths below the base depth.
        #[arg(long, default_value_t = 4)]
        levels: u32,
        #[command(flatten)]
        options: DownloadArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Traversal: depth_by_depth, quadtree or octree.
    #[arg(long)]
    pub method: Option<DownloadMethod>,

    /// Bounds as xmin,ymin,xmax,ymax or xmin,ymin,zmin,xmax,ymax,zmax.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub bounds: Option<Vec<f64>>,

    /// Dimensions to download (X, Y and Z are always included).
    #[arg(long, value_delimiter = ',')]
    pub dims: Vec<String>,

    /// Download every dimension of the resource.
    #[arg(long, conflicts_with = "dims")]
    pub all_dims: bool,

    /// Dimensions to add in a second round once the download is done.
    #[arg(long, value_delimiter = ',')]
    pub more_dims: Vec<String>,

    /// Deepest depth to request.
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Color channel depth: auto, 16 or 8.
    #[arg(long)]
    pub color_depth: Option<ColorDepth>,

    /// Write the summary to this file instead of stdout.
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

impl DownloadArgs {
    /// Apply flag overrides to a loaded config.
    pub fn apply_overrides(&self, config: &mut DownloadConfig) -> Result<()> {
        if let Some(method) = self.method {
            config.method = method;
        }
        if let Some(max_depth) = self.max_depth {
            config.max_depth = Some(max_depth);
        }
        if let Some(color_depth) = self.color_depth {
            config.color_depth = color_depth;
        }
        if let Some(ref bounds) = self.bounds {
            config.default_bounds = Some(Bounds::from_slice(bounds)?);
        }
        Ok(())
    }
}

impl DimensionSelector for DownloadArgs {
    fn select(&mut self, available: &[String], preselected: &[String]) -> Vec<String> {
        if self.all_dims {
            available.to_vec()
        } else if self.dims.is_empty() {
            preselected.to_vec()
        } else {
            FixedDimensions(self.dims.clone()).select(available, preselected)
        }
    }
}
