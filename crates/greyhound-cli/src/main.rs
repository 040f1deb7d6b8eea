//! greyhound - download point clouds from a Greyhound server
//!
//! Run with `greyhound info http://host:8080/resource/autzen` to inspect a
//! resource, `greyhound download <url> --dims Intensity` to fetch it, or
//! `greyhound demo --method quadtree` to try the pipeline offline.

mod cli;
mod summary;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use greyhound_http::{HttpConfig, HttpFetcher};
use greyhound_loader::core::logging;
use greyhound_loader::core::types::{DVec3, Result};
use greyhound_loader::math::Bounds;
use greyhound_loader::session::{FixedBounds, FixedDimensions, Session};
use greyhound_loader::streaming::{DownloadConfig, DownloadEvent, MemoryResource, RemoteFetcher};

use cli::{CliArgs, Command, DownloadArgs};

const DEMO_URL: &str = "memory://resource/demo";
const DEMO_BASE_DEPTH: u32 = 6;

fn http_fetcher(args: &CliArgs) -> Result<HttpFetcher> {
    let config = match &args.http_config {
        Some(path) => HttpConfig::load_sync(path)?,
        None => HttpConfig::default(),
    };
    HttpFetcher::new(&config)
}

async fn download<F: RemoteFetcher>(
    session: Session<F>,
    url: &str,
    mut options: DownloadArgs,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = session.with_events(tx);

    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let DownloadEvent::BatchConverted { depth, points, total_points, .. } = event {
                log::info!("Depth {}: +{} points ({} total)", depth, points, total_points);
            }
        }
    });

    let resource = session.connect(url).await?;
    let Some(cloud) = session
        .download_bounding_box(resource, &mut options, &mut FixedBounds(None))
        .await?
    else {
        log::warn!("No points in the requested region");
        return Ok(());
    };

    if !options.more_dims.is_empty() {
        let mut more = FixedDimensions(options.more_dims.clone());
        session.download_more_dimensions(cloud, &mut more).await?;
    }

    let summary = serde_json::to_string_pretty(&summary::cloud_json(session.cloud(cloud)?)?)?;
    match &options.summary {
        Some(path) => std::fs::write(path, summary)?,
        None => println!("{}", summary),
    }

    drop(session);
    let _ = progress.await;
    Ok(())
}

async fn run(args: CliArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => DownloadConfig::load_sync(path)?,
        None => DownloadConfig::default(),
    };

    match &args.command {
        Command::Info { url } => {
            let fetcher = http_fetcher(&args)?;
            let info = fetcher.info(url).await?;
            println!("{}", serde_json::to_string_pretty(&summary::info_json(url, &info))?);
            Ok(())
        }
        Command::Download { url, options } => {
            options.apply_overrides(&mut config)?;
            let fetcher = Arc::new(http_fetcher(&args)?);
            download(Session::new(fetcher, config), url, options.clone()).await
        }
        Command::Demo { levels, options } => {
            options.apply_overrides(&mut config)?;
            let extent = Bounds::new_3d(DVec3::ZERO, DVec3::new(1024.0, 1024.0, 256.0))?;
            let resource = MemoryResource::synthetic(DEMO_URL, extent, DEMO_BASE_DEPTH, *levels)?;
            log::info!("Demo resource with {} points", resource.resource_info().num_points);
            download(Session::new(Arc::new(resource), config), DEMO_URL, options.clone()).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    logging::init_with_default(args.log_level.as_deref().unwrap_or("info"));

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
