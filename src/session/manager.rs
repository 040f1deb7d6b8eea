//! Headless session: connect to resources, download clouds, extend them
//! with more dimensions and send modified fields back.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;

use crate::cloud::dimension::GEOMETRY_DIMS;
use crate::cloud::{PointCloud, SegmentOrigin};
use crate::convert::{PointRecordConverter, WriteMapping};
use crate::core::error::Error;
use crate::core::types::Result;
use crate::streaming::downloader::ingest;
use crate::streaming::{
    plan, shared, spawn_download, DownloadCallback, DownloadConfig, DownloadEvent, DownloadRequest,
    FetchQuery, GreyhoundDownloader, RemoteFetcher, RemoteWriter, SharedCloud, StateCell,
    WriteRequest,
};

use super::entity::{resource_name, Entity, EntityId, GreyhoundCloud, GreyhoundResource};
use super::selection::{BoundsSelector, DimensionSelector};

/// Name uploads are stored under unless overridden.
pub const DEFAULT_UPLOAD_NAME: &str = "greyhound-loader";

fn read_cloud(cloud: &SharedCloud) -> Result<RwLockReadGuard<'_, PointCloud>> {
    cloud.read().map_err(|_| Error::Worker("point cloud lock poisoned".to_string()))
}

fn write_cloud(cloud: &SharedCloud) -> Result<RwLockWriteGuard<'_, PointCloud>> {
    cloud.write().map_err(|_| Error::Worker("point cloud lock poisoned".to_string()))
}

/// Keep only names in `available`, preserving the selector's order.
fn narrow(selected: Vec<String>, available: &[String]) -> Vec<String> {
    selected.into_iter().filter(|d| available.contains(d)).collect()
}

/// Geometry is always downloaded.
fn with_geometry(mut dims: Vec<String>) -> Vec<String> {
    for name in GEOMETRY_DIMS.iter().rev() {
        if !dims.iter().any(|d| d == name) {
            dims.insert(0, name.to_string());
        }
    }
    dims
}

/// Owns the entities and drives downloads through one fetcher.
pub struct Session<F: RemoteFetcher> {
    fetcher: Arc<F>,
    config: DownloadConfig,
    entities: BTreeMap<EntityId, Entity>,
    next_id: usize,
    upload_name: String,
    events: Option<mpsc::UnboundedSender<DownloadEvent>>,
}

impl<F: RemoteFetcher> Session<F> {
    pub fn new(fetcher: Arc<F>, config: DownloadConfig) -> Self {
        Self {
            fetcher,
            config,
            entities: BTreeMap::new(),
            next_id: 0,
            upload_name: DEFAULT_UPLOAD_NAME.to_string(),
            events: None,
        }
    }

    /// Publish progress of every progressive download on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<DownloadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_upload_name(mut self, name: impl Into<String>) -> Self {
        self.upload_name = name.into();
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DownloadConfig {
        &mut self.config
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(&id).ok_or(Error::UnknownEntity(id.0))
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }

    /// Forget an entity. A running download keeps its cloud alive until it ends.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn can_download(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(Entity::can_download)
    }

    pub fn can_send_back(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(Entity::can_send_back)
    }

    pub fn resource(&self, id: EntityId) -> Result<&GreyhoundResource> {
        self.entity(id)?.as_resource().ok_or(Error::UnknownEntity(id.0))
    }

    pub fn cloud(&self, id: EntityId) -> Result<&GreyhoundCloud> {
        self.entity(id)?.as_cloud().ok_or(Error::UnknownEntity(id.0))
    }

    fn insert(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, entity);
        id
    }

    /// Fetch a resource's description and register it.
    pub async fn connect(&mut self, url: &str) -> Result<EntityId> {
        let info = self.fetcher.info(url).await?;
        log::info!(
            "Connected to {} ({} points, {} dimensions, base depth {})",
            url,
            info.num_points,
            info.schema.len(),
            info.base_depth
        );
        Ok(self.insert(Entity::Resource(GreyhoundResource { url: url.to_string(), info })))
    }

    /// Download from a resource, or extend a cloud with more dimensions.
    pub async fn download(
        &mut self,
        id: EntityId,
        dims: &mut impl DimensionSelector,
        bounds: &mut impl BoundsSelector,
    ) -> Result<Option<EntityId>> {
        let is_cloud = matches!(self.entity(id)?, Entity::Cloud(_));
        if is_cloud {
            self.download_more_dimensions(id, dims).await?;
            Ok(Some(id))
        } else {
            self.download_bounding_box(id, dims, bounds).await
        }
    }

    /// Download a region of a resource into a new cloud.
    ///
    /// The base depth is fetched first; if it holds no points no cloud is
    /// created and `None` is returned. The remaining depths are downloaded on
    /// a background task this call waits for. A failure after the base depth
    /// keeps the cloud and is recorded in its `last_error`.
    pub async fn download_bounding_box(
        &mut self,
        resource: EntityId,
        dims: &mut impl DimensionSelector,
        bounds: &mut impl BoundsSelector,
    ) -> Result<Option<EntityId>> {
        let GreyhoundResource { url, info } = self.resource(resource)?.clone();

        let available = info.available_dim_names();
        let preselected = narrow(self.config.preselected_dims.clone(), &available);
        let selected = narrow(dims.select(&available, &preselected), &available);
        if selected.is_empty() {
            log::info!("No dimensions were selected");
            return Err(Error::UserCancelled("no dimensions were selected".to_string()));
        }
        let selected = with_geometry(selected);

        let bounds = bounds
            .select(&info)
            .or(self.config.default_bounds)
            .unwrap_or(info.bounds_conforming);
        let base_depth = info.base_depth;
        let next_depth = base_depth.checked_add(1).ok_or_else(|| {
            Error::InvalidDepthRequest(format!("base depth {} has no successor", base_depth))
        })?;
        // Reject bad bounds/method pairs before anything is fetched
        plan(self.config.method, bounds, next_depth, base_depth)?;

        let mut cloud = PointCloud::new(resource_name(&url));
        if self.config.shift_from_resource {
            cloud.set_shift(info.conforming_min())?;
        }
        let cloud = shared(cloud);
        let state = StateCell::new();

        {
            let _guard = state.begin()?;
            let query = FetchQuery::at_depth(&url, selected.clone(), bounds, base_depth)?;
            let batch = self.fetcher.fetch(&query).await?;
            let origin = SegmentOrigin {
                bounds,
                depth_begin: query.depth_begin,
                depth_end: query.depth_end,
            };
            let mut converter = PointRecordConverter::new(self.config.color_depth);
            let (added, _) = ingest(&cloud, &mut converter, &batch, origin)?;
            if added == 0 {
                log::warn!("No points at base depth {} in {}", base_depth, bounds);
                return Ok(None);
            }
            log::info!("Base depth {}: {} points", base_depth, added);
        }

        let id = self.insert(Entity::Cloud(GreyhoundCloud {
            origin: resource,
            url: url.clone(),
            info,
            bounds,
            cloud: cloud.clone(),
            state: state.clone(),
            last_report: None,
            last_error: None,
        }));

        let request = DownloadRequest {
            url,
            dims: selected,
            bounds,
            start_depth: next_depth,
            base_depth,
            max_depth: self.config.max_depth,
        };
        let mut downloader = GreyhoundDownloader::new(self.fetcher.clone(), request)
            .with_color_depth(self.config.color_depth);
        if let Some(events) = &self.events {
            downloader = downloader.with_events(events.clone());
        }
        let callback: DownloadCallback = Box::new(|result| match result {
            Ok(report) if report.cancelled => log::info!("Download cancelled"),
            Ok(report) => log::debug!("Download finished at depth {:?}", report.deepest_depth),
            Err(e) => log::warn!("Download stopped: {}", e),
        });

        let handle = spawn_download(downloader, cloud, self.config.method, &state, Some(callback))?;
        let result = handle.wait().await;

        if let Some(Entity::Cloud(entry)) = self.entities.get_mut(&id) {
            match result {
                Ok(report) => entry.last_report = Some(report),
                Err(e) => {
                    log::error!("Download into {} ended early: {}", entry.url, e);
                    entry.last_error = Some(e.to_string());
                }
            }
        }
        Ok(Some(id))
    }

    /// Re-issue every recorded query of an idle cloud with dimensions it
    /// does not have yet, and attach the results. Returns the dimensions added.
    pub async fn download_more_dimensions(
        &mut self,
        id: EntityId,
        dims: &mut impl DimensionSelector,
    ) -> Result<Vec<String>> {
        let entry = self.cloud(id)?.clone();
        let _guard = entry.state.begin().inspect_err(|_| {
            log::warn!("Wait for the current download to finish");
        })?;

        let available = entry.missing_dims();
        let selected = narrow(dims.select(&available, &[]), &available);
        if selected.is_empty() {
            log::info!("No dimensions were selected");
            return Err(Error::UserCancelled("no dimensions were selected".to_string()));
        }

        let segments = read_cloud(&entry.cloud)?.segments().to_vec();
        let mut converter = PointRecordConverter::new(self.config.color_depth);
        let mut attached = 0;
        for (index, segment) in segments.iter().enumerate() {
            let Some(origin) = &segment.origin else {
                log::warn!("Segment {} has no recorded query; its points keep missing values", index);
                continue;
            };
            let query = FetchQuery::new(
                &entry.url,
                selected.clone(),
                origin.bounds,
                origin.depth_begin,
                origin.depth_end,
            )?;
            let batch = self.fetcher.fetch(&query).await?;
            attached += converter.attach(&batch, index, &mut *write_cloud(&entry.cloud)?)?;
        }
        let colored = converter.finish(&mut *write_cloud(&entry.cloud)?);

        log::info!(
            "Added {:?} to {} points{}",
            selected,
            attached,
            if colored { " (with colors)" } else { "" }
        );
        Ok(selected)
    }

    /// Upload the selected scalar fields of a cloud. Returns the number of
    /// points written.
    pub async fn send_back<W: RemoteWriter>(
        &self,
        id: EntityId,
        dims: &mut impl DimensionSelector,
        writer: &W,
    ) -> Result<usize> {
        let entry = self.cloud(id)?;
        let available = entry.uploadable_dims();
        let selected = dims.select(&available, &[]);

        let request = {
            let cloud = read_cloud(&entry.cloud)?;
            let mapping = WriteMapping::build(&cloud, &entry.info.schema, &selected)?;
            WriteRequest {
                url: entry.url.clone(),
                name: self.upload_name.clone(),
                bounds: entry.bounds,
                schema: mapping.schema(),
                body: mapping.encode(&cloud)?,
                num_points: cloud.len(),
            }
        };

        writer.write(&request).await?;
        log::info!(
            "Sent {} points ({} bytes) back to {} as '{}'",
            request.num_points,
            request.body.len(),
            request.url,
            request.name
        );
        Ok(request.num_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DVec3;
    use crate::math::Bounds;
    use crate::session::selection::{AllDimensions, FixedBounds, FixedDimensions, PreselectedDimensions};
    use crate::streaming::{DownloadMethod, DownloadState, MemoryResource};

    const URL: &str = "memory://resource/lattice";

    fn extent() -> Bounds {
        Bounds::new_3d(DVec3::new(1000.0, 2000.0, 0.0), DVec3::new(1016.0, 2016.0, 16.0)).unwrap()
    }

    /// Depths 4, 5 and 6 hold 1, 4 and 16 points.
    fn session(config: DownloadConfig) -> (Arc<MemoryResource>, Session<MemoryResource>) {
        let resource = Arc::new(MemoryResource::synthetic(URL, extent(), 4, 3).unwrap());
        (resource.clone(), Session::new(resource, config))
    }

    #[tokio::test]
    async fn test_download_bounding_box_depth_by_depth() {
        let (resource, mut session) = session(DownloadConfig::default());
        let res = session.connect(URL).await.unwrap();

        let id = session
            .download_bounding_box(res, &mut AllDimensions, &mut FixedBounds(None))
            .await
            .unwrap()
            .unwrap();

        let entry = session.cloud(id).unwrap();
        assert_eq!(entry.state(), DownloadState::Idle);
        assert!(entry.last_error.is_none());
        assert_eq!(entry.last_report.as_ref().unwrap().points_added, 20);

        let cloud = entry.cloud.read().unwrap();
        assert_eq!(cloud.len(), 21);
        assert!(cloud.has_colors());
        assert_eq!(cloud.shift(), DVec3::new(1000.0, 2000.0, 0.0));
        assert_eq!(cloud.scalar_field_names(), vec!["Intensity", "Classification"]);
        assert_eq!(cloud.displayed_field().unwrap().name(), "Intensity");
        cloud.check_invariants().unwrap();

        let depths: Vec<u32> = resource.queries().iter().map(|q| q.depth_begin).collect();
        assert_eq!(depths, vec![4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn test_quadtree_download_gets_every_point() {
        let config = DownloadConfig { method: DownloadMethod::Quadtree, ..Default::default() };
        let (resource, mut session) = session(config);
        let res = session.connect(URL).await.unwrap();

        let id = session
            .download_bounding_box(res, &mut PreselectedDimensions, &mut FixedBounds(None))
            .await
            .unwrap()
            .unwrap();

        let cloud = session.cloud(id).unwrap().cloud.read().unwrap();
        assert_eq!(cloud.len(), 21);
        assert!(!cloud.has_colors());
        // base + root + 4 children + 16 empty grandchildren
        assert_eq!(resource.queries().len(), 22);
    }

    #[tokio::test]
    async fn test_empty_region_creates_no_cloud() {
        let (resource, mut session) = session(DownloadConfig::default());
        let res = session.connect(URL).await.unwrap();
        let outside = Bounds::new_2d(0.0, 0.0, 10.0, 10.0).unwrap();

        let result = session
            .download_bounding_box(res, &mut AllDimensions, &mut FixedBounds(Some(outside)))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(session.entities().count(), 1);
        assert_eq!(resource.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_no_dimensions_cancels_before_fetching() {
        let (resource, mut session) = session(DownloadConfig::default());
        let res = session.connect(URL).await.unwrap();
        let mut none = |_: &[String], _: &[String]| Vec::<String>::new();

        let err = session
            .download_bounding_box(res, &mut none, &mut FixedBounds(None))
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
        assert!(resource.queries().is_empty());
    }

    #[tokio::test]
    async fn test_octree_on_planar_bounds_fails_fast() {
        let config = DownloadConfig { method: DownloadMethod::Octree, ..Default::default() };
        let (resource, mut session) = session(config);
        let res = session.connect(URL).await.unwrap();
        let planar = Bounds::new_2d(1000.0, 2000.0, 1016.0, 2016.0).unwrap();

        let err = session
            .download_bounding_box(res, &mut AllDimensions, &mut FixedBounds(Some(planar)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBounds(_)));
        assert!(resource.queries().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_cloud() {
        let (resource, mut session) = session(DownloadConfig::default());
        resource.fail_at_depth(Some(6));
        let res = session.connect(URL).await.unwrap();

        let id = session
            .download_bounding_box(res, &mut AllDimensions, &mut FixedBounds(None))
            .await
            .unwrap()
            .unwrap();

        let entry = session.cloud(id).unwrap();
        assert!(entry.is_idle());
        assert!(entry.last_error.as_deref().unwrap().contains("depth 6"));
        assert_eq!(entry.cloud.read().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_download_more_dimensions() {
        let (resource, mut session) = session(DownloadConfig::default());
        let res = session.connect(URL).await.unwrap();
        let id = session
            .download_bounding_box(res, &mut PreselectedDimensions, &mut FixedBounds(None))
            .await
            .unwrap()
            .unwrap();
        let before = resource.queries().len();

        let added = session.download(id, &mut AllDimensions, &mut FixedBounds(None)).await.unwrap();
        assert_eq!(added, Some(id));

        // One re-issued query per recorded segment
        let extension = &resource.queries()[before..];
        assert_eq!(extension.len(), 3);
        assert!(extension.iter().all(|q| !q.dims.contains(&"X".to_string())));

        let entry = session.cloud(id).unwrap();
        assert!(entry.is_idle());
        let cloud = entry.cloud.read().unwrap();
        assert_eq!(cloud.len(), 21);
        assert!(cloud.has_colors());
        let intensity = cloud.scalar_field("Intensity").unwrap();
        assert_eq!(intensity.len(), 21);
        assert_eq!(intensity.missing_count(), 0);
        cloud.check_invariants().unwrap();
        drop(cloud);

        // Nothing left to add
        let err = session.download_more_dimensions(id, &mut AllDimensions).await.unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_download_more_dimensions_requires_idle() {
        let (_resource, mut session) = session(DownloadConfig::default());
        let res = session.connect(URL).await.unwrap();
        let id = session
            .download_bounding_box(res, &mut PreselectedDimensions, &mut FixedBounds(None))
            .await
            .unwrap()
            .unwrap();

        let state = session.cloud(id).unwrap().state.clone();
        let guard = state.begin().unwrap();
        assert!(!session.can_download(id));
        let err = session.download_more_dimensions(id, &mut AllDimensions).await.unwrap_err();
        assert!(matches!(err, Error::DownloadInProgress));
        drop(guard);
        assert!(session.can_download(id));
    }

    #[tokio::test]
    async fn test_send_back_selected_fields() {
        let (resource, mut session) = session(DownloadConfig::default());
        let res = session.connect(URL).await.unwrap();
        let id = session
            .download_bounding_box(res, &mut AllDimensions, &mut FixedBounds(None))
            .await
            .unwrap()
            .unwrap();
        assert!(session.can_send_back(id));
        assert!(!session.can_send_back(res));

        let written = session
            .send_back(id, &mut FixedDimensions(vec!["Classification".to_string()]), resource.as_ref())
            .await
            .unwrap();
        assert_eq!(written, 21);

        let writes = resource.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].name, DEFAULT_UPLOAD_NAME);
        assert_eq!(writes[0].schema.len(), 1);
        assert_eq!(writes[0].body.len(), 21);
        assert_eq!(writes[0].num_points, 21);
    }

    #[tokio::test]
    async fn test_wrong_entity_kind() {
        let (_resource, mut session) = session(DownloadConfig::default());
        let res = session.connect(URL).await.unwrap();
        let err = session.download_more_dimensions(res, &mut AllDimensions).await.unwrap_err();
        assert!(matches!(err, Error::UnknownEntity(0)));
        assert!(matches!(session.entity(EntityId(7)), Err(Error::UnknownEntity(7))));
        assert!(session.connect("memory://resource/other").await.is_err());
    }
}
