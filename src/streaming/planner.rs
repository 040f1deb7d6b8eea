//! Spatial subdivision planner for progressive downloads
//!
//! The planner hands out `(bounds, depth)` work items one at a time and is
//! told how many records each item produced. Empty results prune: a
//! depth-by-depth plan stops, a tree plan does not descend under that
//! branch. Tree plans are walked depth-first, child 0 first.

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::Bounds;

/// Traversal strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMethod {
    /// Whole bounds, one depth after the other
    #[default]
    DepthByDepth,
    /// Split X/Y in four at every depth
    Quadtree,
    /// Split X/Y/Z in eight at every depth
    Octree,
}

impl std::str::FromStr for DownloadMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "depthbydepth" | "depth" => Ok(DownloadMethod::DepthByDepth),
            "quadtree" | "quad" => Ok(DownloadMethod::Quadtree),
            "octree" | "oct" => Ok(DownloadMethod::Octree),
            _ => Err(format!("unknown download method: {}", s)),
        }
    }
}

/// One unit of work: fetch `bounds` at `depth`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkItem {
    pub bounds: Bounds,
    pub depth: u32,
}

/// Counters kept while planning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlannerStats {
    /// Items handed out
    pub issued: usize,
    /// Items reported empty
    pub pruned: usize,
    /// Children dropped by the depth cap
    pub capped: usize,
}

/// Lazily produces work items for a [`DownloadMethod`].
#[derive(Debug)]
pub struct SubdivisionPlanner {
    method: DownloadMethod,
    /// Pending items, next on top
    stack: Vec<WorkItem>,
    max_depth: Option<u32>,
    stats: PlannerStats,
}

/// Build a planner for `method` starting at `start_depth`.
///
/// Fails before any work is produced when `start_depth` is below the
/// resource's `base_depth`, or when an octree plan is asked for 2D bounds.
pub fn plan(
    method: DownloadMethod,
    bounds: Bounds,
    start_depth: u32,
    base_depth: u32,
) -> Result<SubdivisionPlanner> {
    SubdivisionPlanner::new(method, bounds, start_depth, base_depth)
}

impl SubdivisionPlanner {
    pub fn new(method: DownloadMethod, bounds: Bounds, start_depth: u32, base_depth: u32) -> Result<Self> {
        if start_depth < base_depth {
            return Err(Error::InvalidDepthRequest(format!(
                "start depth {} is below the resource base depth {}",
                start_depth, base_depth
            )));
        }
        if method == DownloadMethod::Octree && bounds.is_planar() {
            return Err(Error::InvalidBounds(
                "octree download needs 3D bounds".to_string(),
            ));
        }
        Ok(Self {
            method,
            stack: vec![WorkItem { bounds, depth: start_depth }],
            max_depth: None,
            stats: PlannerStats::default(),
        })
    }

    /// Never produce items deeper than `max_depth`.
    pub fn with_max_depth(mut self, max_depth: Option<u32>) -> Self {
        self.max_depth = max_depth;
        self.stack.retain(|item| max_depth.is_none_or(|max| item.depth <= max));
        self
    }

    pub fn method(&self) -> DownloadMethod {
        self.method
    }

    pub fn stats(&self) -> PlannerStats {
        self.stats
    }

    /// No more items will be produced.
    pub fn is_exhausted(&self) -> bool {
        self.stack.is_empty()
    }

    /// Number of items waiting to be handed out.
    pub fn pending(&self) -> usize {
        self.stack.len()
    }

    /// Report how many records `item` produced; decides what comes next.
    pub fn report(&mut self, item: &WorkItem, records: usize) {
        if records == 0 {
            self.stats.pruned += 1;
            log::trace!("Pruned {} at depth {}", item.bounds, item.depth);
            return;
        }

        let Some(depth) = item.depth.checked_add(1) else {
            return;
        };
        if self.max_depth.is_some_and(|max| depth > max) {
            self.stats.capped += 1;
            return;
        }

        match self.method {
            DownloadMethod::DepthByDepth => {
                self.stack.push(WorkItem { bounds: item.bounds, depth });
            }
            DownloadMethod::Quadtree => {
                for bounds in item.bounds.split_quad().into_iter().rev() {
                    self.stack.push(WorkItem { bounds, depth });
                }
            }
            DownloadMethod::Octree => match item.bounds.split_oct() {
                Ok(children) => {
                    for bounds in children.into_iter().rev() {
                        self.stack.push(WorkItem { bounds, depth });
                    }
                }
                Err(e) => log::error!("Cannot split {}: {}", item.bounds, e),
            },
        }
    }
}

impl Iterator for SubdivisionPlanner {
    type Item = WorkItem;

    fn next(&mut self) -> Option<WorkItem> {
        let item = self.stack.pop()?;
        self.stats.issued += 1;
        Some(item)
    }
}
