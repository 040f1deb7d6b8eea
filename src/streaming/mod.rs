//! Progressive download: planning, fetching and background tasks

pub mod planner;
pub mod fetcher;
pub mod memory;
pub mod config;
pub mod downloader;
pub mod task;

pub use planner::{plan, DownloadMethod, PlannerStats, SubdivisionPlanner, WorkItem};
pub use fetcher::{FetchQuery, RemoteFetcher, RemoteWriter, WriteRequest};
pub use memory::{MemoryPoint, MemoryResource};
pub use config::DownloadConfig;
pub use downloader::{
    shared, DownloadEvent, DownloadReport, DownloadRequest, GreyhoundDownloader, SharedCloud,
};
pub use task::{
    spawn_download, CancelToken, DownloadCallback, DownloadGuard, DownloadHandle, DownloadState,
    StateCell,
};
