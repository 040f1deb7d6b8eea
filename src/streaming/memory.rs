//! In-memory resource for tests, benches and offline runs

use std::sync::Mutex;

use crate::cloud::{DimensionDescriptor, PointBatch, PointRecord, Sample};
use crate::core::error::Error;
use crate::core::types::{DVec3, Result};
use crate::math::Bounds;
use crate::wire::ResourceInfo;

use super::fetcher::{FetchQuery, RemoteFetcher, RemoteWriter, WriteRequest};

/// A point held by a [`MemoryResource`]: the depth it lives at and one
/// sample per resource schema dimension.
#[derive(Clone, Debug)]
pub struct MemoryPoint {
    pub depth: u32,
    pub values: Vec<Sample>,
}

/// Serves queries from points held in memory, the way a Greyhound server
/// would: a point matches when its depth is in the query range and its
/// position lies in `[min, max)` of the query bounds.
#[derive(Debug)]
pub struct MemoryResource {
    url: String,
    info: ResourceInfo,
    points: Vec<MemoryPoint>,
    queries: Mutex<Vec<FetchQuery>>,
    writes: Mutex<Vec<WriteRequest>>,
    fail_at_depth: Mutex<Option<u32>>,
}

fn inside(bounds: &Bounds, p: DVec3) -> bool {
    let (min, max) = (bounds.min(), bounds.max());
    let planar = bounds.is_planar();
    p.x >= min.x && p.x < max.x &&
    p.y >= min.y && p.y < max.y &&
    (planar || (p.z >= min.z && p.z < max.z))
}

impl MemoryResource {
    pub fn new(url: impl Into<String>, info: ResourceInfo, points: Vec<MemoryPoint>) -> Self {
        Self {
            url: url.into(),
            info,
            points,
            queries: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            fail_at_depth: Mutex::new(None),
        }
    }

    /// A lattice of points over `extent`: depth `base_depth + level` holds
    /// one point per cell of a `2^level` by `2^level` grid, with X/Y/Z,
    /// Intensity, Classification and 16-bit RGB.
    pub fn synthetic(url: impl Into<String>, extent: Bounds, base_depth: u32, levels: u32) -> Result<Self> {
        let Bounds::Volume { min, max } = extent else {
            return Err(Error::InvalidBounds("synthetic resource needs 3D bounds".to_string()));
        };
        let schema = vec![
            DimensionDescriptor::floating("X", 8),
            DimensionDescriptor::floating("Y", 8),
            DimensionDescriptor::floating("Z", 8),
            DimensionDescriptor::unsigned("Intensity", 2),
            DimensionDescriptor::unsigned("Classification", 1),
            DimensionDescriptor::unsigned("Red", 2),
            DimensionDescriptor::unsigned("Green", 2),
            DimensionDescriptor::unsigned("Blue", 2),
        ];

        let size = max - min;
        let mut points = Vec::new();
        for level in 0..levels {
            let cells = 1u32 << level;
            for i in 0..cells {
                for j in 0..cells {
                    // Cell centers; a center on a split plane belongs to the upper child
                    let u = (i as f64 + 0.5) / cells as f64;
                    let v = (j as f64 + 0.5) / cells as f64;
                    let x = min.x + size.x * u;
                    let y = min.y + size.y * v;
                    let z = min.z + size.z * (0.25 + 0.5 * u * v);
                    let shade = ((u * 65535.0) as u64).min(65535);
                    points.push(MemoryPoint {
                        depth: base_depth + level,
                        values: vec![
                            Sample::Float(x),
                            Sample::Float(y),
                            Sample::Float(z),
                            Sample::Unsigned((level as u64 * 100 + (i + j) as u64) % 65536),
                            Sample::Unsigned((i % 3) as u64),
                            Sample::Unsigned(shade),
                            Sample::Unsigned(65535 - shade),
                            Sample::Unsigned(32768),
                        ],
                    });
                }
            }
        }

        let info = ResourceInfo {
            num_points: points.len() as u64,
            schema,
            bounds: extent,
            bounds_conforming: extent,
            base_depth,
            srs: String::new(),
        };
        Ok(Self::new(url, info, points))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn resource_info(&self) -> &ResourceInfo {
        &self.info
    }

    /// Make every query touching `depth` fail.
    pub fn fail_at_depth(&self, depth: Option<u32>) {
        *self.fail_at_depth.lock().unwrap_or_else(|e| e.into_inner()) = depth;
    }

    /// Queries served so far, in order.
    pub fn queries(&self) -> Vec<FetchQuery> {
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Uploads received so far.
    pub fn writes(&self) -> Vec<WriteRequest> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn check_url(&self, url: &str) -> Result<()> {
        if url == self.url {
            Ok(())
        } else {
            Err(Error::FetchFailure(format!("no resource at {}", url)))
        }
    }

    fn position(&self, point: &MemoryPoint) -> DVec3 {
        let get = |i: usize| point.values.get(i).map(|s| s.as_f64()).unwrap_or(f64::NAN);
        DVec3::new(get(0), get(1), get(2))
    }

    fn serve(&self, query: &FetchQuery) -> Result<PointBatch> {
        self.check_url(&query.url)?;
        self.queries.lock().unwrap_or_else(|e| e.into_inner()).push(query.clone());

        if let Some(depth) = *self.fail_at_depth.lock().unwrap_or_else(|e| e.into_inner()) {
            if (query.depth_begin..query.depth_end).contains(&depth) {
                return Err(Error::FetchFailure(format!("injected failure at depth {}", depth)));
            }
        }

        // Only dimensions the resource knows are returned
        let columns: Vec<usize> = query
            .dims
            .iter()
            .filter_map(|name| self.info.schema.iter().position(|d| d.name == *name))
            .collect();
        let schema = columns.iter().map(|&c| self.info.schema[c].clone()).collect();

        let records = self
            .points
            .iter()
            .filter(|p| p.depth >= query.depth_begin && p.depth < query.depth_end)
            .filter(|p| inside(&query.bounds, self.position(p)))
            .map(|p| PointRecord::new(columns.iter().map(|&c| p.values[c]).collect()))
            .collect();

        Ok(PointBatch::with_records(schema, records))
    }
}

impl RemoteFetcher for MemoryResource {
    async fn info(&self, url: &str) -> Result<ResourceInfo> {
        self.check_url(url)?;
        Ok(self.info.clone())
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<PointBatch> {
        self.serve(query)
    }
}

impl RemoteWriter for MemoryResource {
    async fn write(&self, request: &WriteRequest) -> Result<()> {
        self.check_url(&request.url)?;
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).push(request.clone());
        Ok(())
    }
}
