//! Boundary to the remote point cloud service

use std::future::Future;

use crate::cloud::{DimensionDescriptor, PointBatch};
use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::Bounds;
use crate::wire::ResourceInfo;

/// One read query against a resource.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchQuery {
    /// Resource endpoint, e.g. `http://host:8080/resource/autzen`
    pub url: String,
    /// Requested dimension names, in order
    pub dims: Vec<String>,
    pub bounds: Bounds,
    /// First depth included
    pub depth_begin: u32,
    /// First depth excluded
    pub depth_end: u32,
}

impl FetchQuery {
    /// Build a query for the half-open depth range `[depth_begin, depth_end)`.
    pub fn new(
        url: impl Into<String>,
        dims: Vec<String>,
        bounds: Bounds,
        depth_begin: u32,
        depth_end: u32,
    ) -> Result<Self> {
        if depth_end <= depth_begin {
            return Err(Error::InvalidDepthRequest(format!(
                "depth range [{}, {}) is empty",
                depth_begin, depth_end
            )));
        }
        Ok(Self { url: url.into(), dims, bounds, depth_begin, depth_end })
    }

    /// Query for a single depth.
    pub fn at_depth(url: impl Into<String>, dims: Vec<String>, bounds: Bounds, depth: u32) -> Result<Self> {
        let end = depth.checked_add(1).ok_or_else(|| {
            Error::InvalidDepthRequest(format!("depth {} has no successor", depth))
        })?;
        Self::new(url, dims, bounds, depth, end)
    }
}

/// An upload of locally modified values.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteRequest {
    pub url: String,
    /// Name the modification is stored under
    pub name: String,
    pub bounds: Bounds,
    /// Layout of `body`
    pub schema: Vec<DimensionDescriptor>,
    /// Packed little-endian records
    pub body: Vec<u8>,
    pub num_points: usize,
}

/// Executes queries against a remote resource.
///
/// Implementations perform the network round trip; the returned batch
/// carries the dimensions actually present, which may be a subset of the
/// requested ones.
pub trait RemoteFetcher: Send + Sync + 'static {
    /// Fetch the resource description.
    fn info(&self, url: &str) -> impl Future<Output = Result<ResourceInfo>> + Send;

    /// Execute one read query.
    fn fetch(&self, query: &FetchQuery) -> impl Future<Output = Result<PointBatch>> + Send;
}

/// Uploads modifications back to a remote resource.
pub trait RemoteWriter: Send + Sync + 'static {
    fn write(&self, request: &WriteRequest) -> impl Future<Output = Result<()>> + Send;
}
