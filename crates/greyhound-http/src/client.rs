//! HTTP fetcher and writer

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use greyhound_loader::cloud::{DimensionDescriptor, PointBatch};
use greyhound_loader::core::error::Error;
use greyhound_loader::core::types::Result;
use greyhound_loader::streaming::{FetchQuery, RemoteFetcher, RemoteWriter, WriteRequest};
use greyhound_loader::wire::{decode_read_response, ResourceInfo};

use crate::protocol::{info_url, read_params, read_url, write_params, write_url};
use crate::DEFAULT_TIMEOUT_SECS;

/// HTTP client settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("greyhound-loader/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    /// Load from file (sync). Missing keys take their default values.
    pub fn load_sync(path: &Path) -> std::result::Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

fn http_error(e: reqwest::Error) -> Error {
    Error::FetchFailure(e.to_string())
}

async fn checked(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::FetchFailure(format!("{} failed with status {}: {}", what, status, body.trim())))
}

/// Talks to a Greyhound server.
///
/// Resource descriptions are cached per URL; read queries need them to
/// describe the requested dimensions.
pub struct HttpFetcher {
    client: reqwest::Client,
    infos: Mutex<HashMap<String, ResourceInfo>>,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(http_error)?;
        Ok(Self { client, infos: Mutex::new(HashMap::new()) })
    }

    fn cached_info(&self, url: &str) -> Option<ResourceInfo> {
        self.infos.lock().ok().and_then(|infos| infos.get(url).cloned())
    }

    async fn resource_info(&self, url: &str) -> Result<ResourceInfo> {
        match self.cached_info(url) {
            Some(info) => Ok(info),
            None => self.info(url).await,
        }
    }

    /// Descriptors of the queried dimensions the resource actually has.
    fn read_schema(info: &ResourceInfo, query: &FetchQuery) -> Result<Vec<DimensionDescriptor>> {
        let schema: Vec<DimensionDescriptor> = query
            .dims
            .iter()
            .filter_map(|name| {
                let dim = info.dimension(name).cloned();
                if dim.is_none() {
                    log::warn!("{} has no dimension {}; not requesting it", query.url, name);
                }
                dim
            })
            .collect();
        if schema.is_empty() {
            return Err(Error::FetchFailure(format!(
                "none of {:?} exist in {}",
                query.dims, query.url
            )));
        }
        Ok(schema)
    }
}

impl RemoteFetcher for HttpFetcher {
    async fn info(&self, url: &str) -> Result<ResourceInfo> {
        let endpoint = info_url(url);
        log::debug!("GET {}", endpoint);
        let response = self.client.get(&endpoint).send().await.map_err(http_error)?;
        let body = checked(response, "info").await?.text().await.map_err(http_error)?;
        let info = ResourceInfo::from_json(&body)?;

        if let Ok(mut infos) = self.infos.lock() {
            infos.insert(url.to_string(), info.clone());
        }
        Ok(info)
    }

    async fn fetch(&self, query: &FetchQuery) -> Result<PointBatch> {
        let info = self.resource_info(&query.url).await?;
        let schema = Self::read_schema(&info, query)?;
        let params = read_params(query, &schema)?;

        log::trace!("GET {} depth [{}, {})", read_url(&query.url), query.depth_begin, query.depth_end);
        let response = self
            .client
            .get(read_url(&query.url))
            .query(&params)
            .send()
            .await
            .map_err(http_error)?;
        let bytes = checked(response, "read").await?.bytes().await.map_err(http_error)?;
        decode_read_response(&bytes, &schema)
    }
}

impl RemoteWriter for HttpFetcher {
    async fn write(&self, request: &WriteRequest) -> Result<()> {
        let params = write_params(request)?;
        log::debug!("PUT {} ({} bytes)", write_url(&request.url), request.body.len());
        let response = self
            .client
            .put(write_url(&request.url))
            .query(&params)
            .body(request.body.clone())
            .send()
            .await
            .map_err(http_error)?;
        checked(response, "write").await?;
        Ok(())
    }
}
