//! Greyhound HTTP client for greyhound-loader
//!
//! ```ignore
//! let fetcher = Arc::new(HttpFetcher::new(&HttpConfig::default())?);
//! let mut session = Session::new(fetcher, DownloadConfig::default());
//! let resource = session.connect("http://data.greyhound.io/resource/autzen").await?;
//! ```

pub mod protocol;
pub mod client;

pub use client::{HttpConfig, HttpFetcher};
pub use protocol::{info_url, read_params, read_url, write_params, write_url};

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
