//! Entities a session knows about: remote resources and the clouds
//! downloaded from them.

use crate::cloud::dimension::{COLOR_DIMS, DIM_POINT_ID, GEOMETRY_DIMS};
use crate::math::Bounds;
use crate::streaming::{DownloadReport, DownloadState, SharedCloud, StateCell};
use crate::wire::ResourceInfo;

/// Unique identifier for a session entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub usize);

/// Display name for a resource URL: the last non-empty path segment.
pub fn resource_name(url: &str) -> &str {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(url)
}

/// A remote resource the session is connected to.
#[derive(Clone, Debug)]
pub struct GreyhoundResource {
    pub url: String,
    pub info: ResourceInfo,
}

impl GreyhoundResource {
    pub fn name(&self) -> &str {
        resource_name(&self.url)
    }
}

/// A cloud downloaded from a resource.
#[derive(Clone, Debug)]
pub struct GreyhoundCloud {
    /// Resource entity the cloud came from
    pub origin: EntityId,
    pub url: String,
    /// Description of the origin resource at download time
    pub info: ResourceInfo,
    /// Bounds the cloud was downloaded in
    pub bounds: Bounds,
    pub cloud: SharedCloud,
    pub state: StateCell,
    /// Summary of the last progressive download
    pub last_report: Option<DownloadReport>,
    /// Failure that ended the last progressive download early
    pub last_error: Option<String>,
}

impl GreyhoundCloud {
    pub fn state(&self) -> DownloadState {
        self.state.get()
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    /// Scalar field names currently held by the cloud.
    pub fn downloaded_dims(&self) -> Vec<String> {
        self.cloud
            .read()
            .map(|c| c.scalar_field_names())
            .unwrap_or_default()
    }

    /// Resource dimensions that a further round could add.
    pub fn missing_dims(&self) -> Vec<String> {
        let (fields, has_colors) = match self.cloud.read() {
            Ok(c) => (c.scalar_field_names(), c.has_colors()),
            Err(_) => return Vec::new(),
        };
        self.info
            .available_dim_names()
            .into_iter()
            .filter(|name| !GEOMETRY_DIMS.contains(&name.as_str()) && name.as_str() != DIM_POINT_ID)
            .filter(|name| !(has_colors && COLOR_DIMS.contains(&name.as_str())))
            .filter(|name| !fields.contains(name))
            .collect()
    }

    /// Scalar fields that could be written back to the resource.
    pub fn uploadable_dims(&self) -> Vec<String> {
        self.downloaded_dims()
            .into_iter()
            .filter(|name| self.info.dimension(name).is_some())
            .collect()
    }
}

/// What a session entity is.
#[derive(Clone, Debug)]
pub enum Entity {
    Resource(GreyhoundResource),
    Cloud(GreyhoundCloud),
}

impl Entity {
    pub fn name(&self) -> String {
        match self {
            Entity::Resource(r) => r.name().to_string(),
            Entity::Cloud(c) => {
                let name = c.cloud.read().map(|c| c.name().to_string()).unwrap_or_default();
                match c.state() {
                    DownloadState::Idle => name,
                    DownloadState::WaitingForPoints => format!("{} (downloading...)", name),
                }
            }
        }
    }

    /// Resources can be downloaded from; idle clouds can be extended with
    /// more dimensions.
    pub fn can_download(&self) -> bool {
        match self {
            Entity::Resource(_) => true,
            Entity::Cloud(c) => c.is_idle(),
        }
    }

    pub fn can_send_back(&self) -> bool {
        matches!(self, Entity::Cloud(_))
    }

    pub fn as_resource(&self) -> Option<&GreyhoundResource> {
        match self {
            Entity::Resource(r) => Some(r),
            Entity::Cloud(_) => None,
        }
    }

    pub fn as_cloud(&self) -> Option<&GreyhoundCloud> {
        match self {
            Entity::Cloud(c) => Some(c),
            Entity::Resource(_) => None,
        }
    }
}
