//! Background download tasks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::core::error::Error;
use crate::core::types::Result;

use super::downloader::{DownloadReport, GreyhoundDownloader, SharedCloud};
use super::fetcher::RemoteFetcher;
use super::planner::DownloadMethod;

/// Cooperative cancellation flag, checked before every fetch.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Download state of a cloud.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DownloadState {
    #[default]
    Idle,
    WaitingForPoints,
}

/// Shared download state. At most one download runs per cell.
#[derive(Clone, Debug, Default)]
pub struct StateCell(Arc<Mutex<DownloadState>>);

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> DownloadState {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_idle(&self) -> bool {
        self.get() == DownloadState::Idle
    }

    /// Move to `WaitingForPoints`. The returned guard moves back to `Idle`
    /// when dropped.
    pub fn begin(&self) -> Result<DownloadGuard> {
        let mut state = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if *state != DownloadState::Idle {
            return Err(Error::DownloadInProgress);
        }
        *state = DownloadState::WaitingForPoints;
        Ok(DownloadGuard { cell: self.clone() })
    }

    fn set(&self, state: DownloadState) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

/// Holds a [`StateCell`] in `WaitingForPoints`.
#[derive(Debug)]
pub struct DownloadGuard {
    cell: StateCell,
}

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        self.cell.set(DownloadState::Idle);
    }
}

/// Called once when a background download ends, however it ends.
pub type DownloadCallback = Box<dyn FnOnce(&Result<DownloadReport>) + Send + 'static>;

/// End-of-download bookkeeping: callback, then `Idle`, then the result
/// goes to the handle. Runs from `Drop` if the task dies without a result.
struct Completion {
    callback: Option<DownloadCallback>,
    guard: Option<DownloadGuard>,
    done: Option<oneshot::Sender<Result<DownloadReport>>>,
}

impl Completion {
    fn fire(&mut self, result: Result<DownloadReport>) {
        if let Some(callback) = self.callback.take() {
            callback(&result);
        }
        self.guard.take();
        if let Some(done) = self.done.take() {
            // Handle dropped means the download was detached
            let _ = done.send(result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.done.is_some() || self.callback.is_some() {
            log::error!("Download task ended without a result");
            self.fire(Err(Error::Worker("download task ended without a result".to_string())));
        }
    }
}

/// A running background download.
#[derive(Debug)]
pub struct DownloadHandle {
    done: oneshot::Receiver<Result<DownloadReport>>,
    cancel: CancelToken,
    task: JoinHandle<()>,
}

impl DownloadHandle {
    /// Ask the download to stop before its next fetch.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the download to end.
    pub async fn wait(self) -> Result<DownloadReport> {
        self.done
            .await
            .map_err(|_| Error::Worker("download task dropped its result".to_string()))?
    }

    /// Wait from synchronous code. Must not be called from within the runtime.
    pub fn wait_blocking(self) -> Result<DownloadReport> {
        self.done
            .blocking_recv()
            .map_err(|_| Error::Worker("download task dropped its result".to_string()))?
    }

    /// Let the download run on without waiting; the callback still fires.
    pub fn detach(self) {}
}

/// Run `downloader` on the current tokio runtime.
///
/// Fails with [`Error::DownloadInProgress`] if `state` is not idle, and with
/// [`Error::Worker`] outside a runtime. `callback` runs exactly once, before
/// `state` returns to `Idle`.
pub fn spawn_download<F: RemoteFetcher>(
    downloader: GreyhoundDownloader<F>,
    cloud: SharedCloud,
    method: DownloadMethod,
    state: &StateCell,
    callback: Option<DownloadCallback>,
) -> Result<DownloadHandle> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| Error::Worker(format!("no tokio runtime: {}", e)))?;
    let guard = state.begin()?;

    let cancel = CancelToken::new();
    let (tx, rx) = oneshot::channel();
    let mut completion = Completion {
        callback,
        guard: Some(guard),
        done: Some(tx),
    };

    let token = cancel.clone();
    let task = runtime.spawn(async move {
        let result = downloader.download_to(&cloud, method, &token).await;
        completion.fire(result);
    });

    Ok(DownloadHandle { done: rx, cancel, task })
}
