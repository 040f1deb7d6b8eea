//! Progressive download driver

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::cloud::{PointBatch, PointCloud, SegmentOrigin};
use crate::convert::{ColorDepth, PointRecordConverter};
use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::Bounds;

use super::fetcher::{FetchQuery, RemoteFetcher};
use super::planner::{plan, DownloadMethod, WorkItem};
use super::task::CancelToken;

/// A cloud shared between a running download and its readers.
///
/// The download takes the write lock once per batch, so readers always see
/// a cloud that is consistent between batches.
pub type SharedCloud = Arc<RwLock<PointCloud>>;

/// Wrap a cloud for sharing with a download.
pub fn shared(cloud: PointCloud) -> SharedCloud {
    Arc::new(RwLock::new(cloud))
}

/// What to download.
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub dims: Vec<String>,
    pub bounds: Bounds,
    /// First depth to fetch
    pub start_depth: u32,
    /// Shallowest depth the resource accepts
    pub base_depth: u32,
    /// Deepest depth to fetch
    pub max_depth: Option<u32>,
}

/// Progress notifications published while downloading.
#[derive(Clone, Debug, PartialEq)]
pub enum DownloadEvent {
    /// A batch was appended to the cloud
    BatchConverted {
        bounds: Bounds,
        depth: u32,
        points: usize,
        total_points: usize,
    },
    /// A work item returned nothing; its branch is not expanded
    Pruned { bounds: Bounds, depth: u32 },
}

/// Summary of a finished (or cancelled) download.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DownloadReport {
    /// Queries issued
    pub items_issued: usize,
    /// Non-empty batches converted
    pub batches_converted: usize,
    /// Empty results that pruned a branch
    pub items_pruned: usize,
    /// Points appended by this download
    pub points_added: usize,
    /// Deepest depth that returned points
    pub deepest_depth: Option<u32>,
    /// Stopped by a cancellation request
    pub cancelled: bool,
}

/// Drives planner, fetcher and converter against one cloud.
pub struct GreyhoundDownloader<F: RemoteFetcher> {
    fetcher: Arc<F>,
    request: DownloadRequest,
    color_depth: ColorDepth,
    events: Option<mpsc::UnboundedSender<DownloadEvent>>,
}

impl<F: RemoteFetcher> GreyhoundDownloader<F> {
    pub fn new(fetcher: Arc<F>, request: DownloadRequest) -> Self {
        Self {
            fetcher,
            request,
            color_depth: ColorDepth::default(),
            events: None,
        }
    }

    pub fn with_color_depth(mut self, color_depth: ColorDepth) -> Self {
        self.color_depth = color_depth;
        self
    }

    /// Publish progress on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<DownloadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn request(&self) -> &DownloadRequest {
        &self.request
    }

    fn publish(&self, event: DownloadEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means nobody is watching
            let _ = tx.send(event);
        }
    }

    /// Download into `cloud` following `method`.
    ///
    /// Cancellation is checked before every fetch; points converted before
    /// it stay in the cloud. A fetch or ingestion failure stops the download
    /// and is returned; points converted before it stay in the cloud as well.
    pub async fn download_to(
        &self,
        cloud: &SharedCloud,
        method: DownloadMethod,
        cancel: &CancelToken,
    ) -> Result<DownloadReport> {
        let request = &self.request;
        let mut planner = plan(method, request.bounds, request.start_depth, request.base_depth)?
            .with_max_depth(request.max_depth);
        let mut converter = PointRecordConverter::new(self.color_depth);
        let mut report = DownloadReport::default();

        log::info!(
            "Downloading {} ({:?}) from depth {} in {}",
            request.url,
            method,
            request.start_depth,
            request.bounds
        );

        while let Some(item) = planner.next() {
            if cancel.is_cancelled() {
                log::info!("Download of {} cancelled at depth {}", request.url, item.depth);
                report.cancelled = true;
                break;
            }
            report.items_issued += 1;

            let query = FetchQuery::at_depth(&request.url, request.dims.clone(), item.bounds, item.depth)?;
            log::trace!("Fetching {} depth [{}, {})", query.bounds, query.depth_begin, query.depth_end);
            let batch = self.fetcher.fetch(&query).await.map_err(|e| {
                log::error!("Fetch of {} at depth {} failed: {}", item.bounds, item.depth, e);
                e
            })?;

            let origin = SegmentOrigin {
                bounds: query.bounds,
                depth_begin: query.depth_begin,
                depth_end: query.depth_end,
            };
            let (added, total) = ingest(cloud, &mut converter, &batch, origin).map_err(|e| {
                log::error!("Batch at depth {} rejected: {}", item.depth, e);
                e
            })?;

            planner.report(&item, batch.len());
            self.record(&item, added, total, &mut report);
        }

        log::info!(
            "Download of {} done: {} points in {} batches ({} queries, {} pruned)",
            request.url,
            report.points_added,
            report.batches_converted,
            report.items_issued,
            report.items_pruned
        );
        Ok(report)
    }

    fn record(&self, item: &WorkItem, added: usize, total: usize, report: &mut DownloadReport) {
        if added == 0 {
            report.items_pruned += 1;
            log::debug!("Depth {} in {} is empty", item.depth, item.bounds);
            self.publish(DownloadEvent::Pruned { bounds: item.bounds, depth: item.depth });
            return;
        }
        report.batches_converted += 1;
        report.points_added += added;
        report.deepest_depth = report.deepest_depth.max(Some(item.depth));
        log::debug!("Depth {}: {} points ({} total)", item.depth, added, total);
        self.publish(DownloadEvent::BatchConverted {
            bounds: item.bounds,
            depth: item.depth,
            points: added,
            total_points: total,
        });
    }
}

/// Convert one batch under the cloud's write lock.
///
/// Returns the points added and the new point count.
pub(crate) fn ingest(
    cloud: &SharedCloud,
    converter: &mut PointRecordConverter,
    batch: &PointBatch,
    origin: SegmentOrigin,
) -> Result<(usize, usize)> {
    let mut cloud = cloud
        .write()
        .map_err(|_| Error::Worker("point cloud lock poisoned".to_string()))?;
    let added = converter.convert_from(batch, Some(origin), &mut cloud)?;
    Ok((added, cloud.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::cloud::{DimensionDescriptor, PointRecord};
    use crate::core::types::DVec3;
    use crate::wire::ResourceInfo;

    const URL: &str = "http://greyhound.test/resource/scripted";

    /// Answers queries from a table keyed by (depth, bounds), recording every query.
    #[derive(Default)]
    struct ScriptedFetcher {
        answers: HashMap<(u32, String), usize>,
        default_points: usize,
        fail_at: Option<u32>,
        queries: Mutex<Vec<FetchQuery>>,
        cancel_after: Option<(usize, CancelToken)>,
    }

    impl ScriptedFetcher {
        fn points_for(&self, query: &FetchQuery) -> usize {
            self.answers
                .get(&(query.depth_begin, query.bounds.to_query()))
                .copied()
                .unwrap_or(self.default_points)
        }
    }

    fn schema() -> Vec<DimensionDescriptor> {
        vec![
            DimensionDescriptor::floating("X", 8),
            DimensionDescriptor::floating("Y", 8),
            DimensionDescriptor::floating("Z", 8),
        ]
    }

    impl RemoteFetcher for ScriptedFetcher {
        async fn info(&self, _url: &str) -> Result<ResourceInfo> {
            Err(Error::FetchFailure("no info".to_string()))
        }

        async fn fetch(&self, query: &FetchQuery) -> Result<PointBatch> {
            let issued = {
                let mut queries = self.queries.lock().unwrap();
                queries.push(query.clone());
                queries.len()
            };
            if let Some((after, token)) = &self.cancel_after {
                if issued >= *after {
                    token.cancel();
                }
            }
            if self.fail_at == Some(query.depth_begin) {
                return Err(Error::FetchFailure("connection reset".to_string()));
            }
            let n = self.points_for(query);
            let base = query.bounds.min();
            let records = (0..n)
                .map(|i| PointRecord::from_f64(&[base.x + i as f64, base.y, query.depth_begin as f64]))
                .collect();
            Ok(PointBatch::with_records(schema(), records))
        }
    }

    fn request(bounds: Bounds, start_depth: u32) -> DownloadRequest {
        DownloadRequest {
            url: URL.to_string(),
            dims: vec!["X".into(), "Y".into(), "Z".into()],
            bounds,
            start_depth,
            base_depth: 0,
            max_depth: None,
        }
    }

    fn square() -> Bounds {
        Bounds::new_2d(0.0, 0.0, 16.0, 16.0).unwrap()
    }

    #[tokio::test]
    async fn test_depth_by_depth_stops_on_empty_batch() {
        let mut fetcher = ScriptedFetcher::default();
        for depth in 0..3 {
            fetcher.answers.insert((depth, square().to_query()), 4);
        }
        let fetcher = Arc::new(fetcher);
        let downloader = GreyhoundDownloader::new(fetcher.clone(), request(square(), 0));
        let cloud = shared(PointCloud::new("cloud"));

        let report = downloader
            .download_to(&cloud, DownloadMethod::DepthByDepth, &CancelToken::new())
            .await
            .unwrap();

        let depths: Vec<u32> = fetcher.queries.lock().unwrap().iter().map(|q| q.depth_begin).collect();
        assert_eq!(depths, vec![0, 1, 2, 3]);
        assert_eq!(cloud.read().unwrap().len(), 12);
        assert_eq!(report.points_added, 12);
        assert_eq!(report.items_pruned, 1);
        assert_eq!(report.deepest_depth, Some(2));
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_quadtree_prunes_empty_root() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.default_points = 3;
        fetcher.answers.insert((1, square().to_query()), 0);
        let fetcher = Arc::new(fetcher);
        let downloader = GreyhoundDownloader::new(fetcher.clone(), request(square(), 1));
        let cloud = shared(PointCloud::new("cloud"));

        downloader
            .download_to(&cloud, DownloadMethod::Quadtree, &CancelToken::new())
            .await
            .unwrap();

        let queries = fetcher.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries.iter().all(|q| q.depth_begin != 2));
        assert!(cloud.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quadtree_descends_non_empty_branches() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.answers.insert((0, square().to_query()), 2);
        let children = square().split_quad();
        fetcher.answers.insert((1, children[2].to_query()), 1);
        let fetcher = Arc::new(fetcher);
        let downloader = GreyhoundDownloader::new(fetcher.clone(), request(square(), 0));
        let cloud = shared(PointCloud::new("cloud"));

        let report = downloader
            .download_to(&cloud, DownloadMethod::Quadtree, &CancelToken::new())
            .await
            .unwrap();

        // root, 4 children, 4 grandchildren under child 2 before child 3
        assert_eq!(report.items_issued, 9);
        assert_eq!(report.points_added, 3);
        let queries = fetcher.queries.lock().unwrap();
        assert_eq!(queries[3].bounds, children[2]);
        assert!(queries[4..8].iter().all(|q| q.depth_begin == 2));
        assert_eq!(queries[8].bounds, children[3]);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_converted_prefix() {
        let token = CancelToken::new();
        let mut fetcher = ScriptedFetcher::default();
        for depth in 0..5 {
            fetcher.answers.insert((depth, square().to_query()), 10);
        }
        fetcher.cancel_after = Some((2, token.clone()));
        let fetcher = Arc::new(fetcher);
        let downloader = GreyhoundDownloader::new(fetcher.clone(), request(square(), 0))
            .with_color_depth(ColorDepth::Bits16);
        let cloud = shared(PointCloud::new("cloud"));

        let report = downloader
            .download_to(&cloud, DownloadMethod::DepthByDepth, &token)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.batches_converted, 2);
        assert_eq!(fetcher.queries.lock().unwrap().len(), 2);
        let cloud = cloud.read().unwrap();
        assert_eq!(cloud.len(), 20);
        cloud.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_points() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.default_points = 5;
        fetcher.fail_at = Some(2);
        let downloader = GreyhoundDownloader::new(Arc::new(fetcher), request(square(), 0));
        let cloud = shared(PointCloud::new("cloud"));

        let err = downloader
            .download_to(&cloud, DownloadMethod::DepthByDepth, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FetchFailure(_)));
        assert_eq!(cloud.read().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_invalid_depth_fails_before_fetching() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let mut req = request(square(), 2);
        req.base_depth = 5;
        let downloader = GreyhoundDownloader::new(fetcher.clone(), req);
        let cloud = shared(PointCloud::new("cloud"));

        let err = downloader
            .download_to(&cloud, DownloadMethod::DepthByDepth, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDepthRequest(_)));
        assert!(fetcher.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_and_segments() {
        let mut fetcher = ScriptedFetcher::default();
        fetcher.answers.insert((3, square().to_query()), 2);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut req = request(square(), 3);
        req.base_depth = 3;
        let downloader = GreyhoundDownloader::new(Arc::new(fetcher), req).with_events(tx);
        let cloud = shared(PointCloud::new("cloud"));

        downloader
            .download_to(&cloud, DownloadMethod::DepthByDepth, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(DownloadEvent::BatchConverted { bounds: square(), depth: 3, points: 2, total_points: 2 })
        );
        assert_eq!(rx.recv().await, Some(DownloadEvent::Pruned { bounds: square(), depth: 4 }));

        let cloud = cloud.read().unwrap();
        assert_eq!(cloud.segments().len(), 1);
        let origin = cloud.segments()[0].origin.as_ref().unwrap();
        assert_eq!((origin.depth_begin, origin.depth_end), (3, 4));
        assert_eq!(cloud.shift(), DVec3::new(0.0, 0.0, 3.0));
    }
}
