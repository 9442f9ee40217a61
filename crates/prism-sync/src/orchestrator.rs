//! Single-flight synchronization of a catalog with a destination.
//!
//! [`SyncOrchestrator::begin`] opens the catalog and change cache, starts a
//! [`ChangeWatcher`] on the catalog file and runs one pass inline. Each pass
//! re-opens the catalog, diffs it against the change cache and, when there is
//! work, launches one worker thread with its own copy of the actions.
//!
//! At most one worker runs at a time. A trigger that arrives while the worker
//! is busy is dropped rather than queued: the next detected change re-diffs
//! and catches up.
//!
//! Lock order is worker slot, then resources. The worker only takes the
//! resources lock, and only for short catalog lookups and cache updates.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use prism_core::PrismConfig;
use prism_store::{CancelHandle, ObjectStoreClient, ObjectStoreRequest, StoreError};
use tracing::{debug, error, info, warn};

use crate::codec::reencode;
use crate::collaborators::{Catalog, ChangeCache, PreviewCodec, PreviewExtractor};
use crate::diff::{SyncAction, diff};
use crate::error::{ItemError, SyncError};
use crate::watcher::{ChangeWatcher, WatchedFile};

/// Content type of uploaded previews.
const PREVIEW_CONTENT_TYPE: &str = "image/jpeg";

/// Lifecycle state of a [`SyncOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No session.
    Idle,
    /// Watching a catalog and synchronizing it.
    Synchronizing,
}

/// What a trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A worker was launched with this many actions.
    Started(usize),
    /// Catalog and destination already agree.
    UpToDate,
    /// A worker is still running. The trigger was dropped.
    Busy,
}

/// Summary of one worker batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Previews uploaded.
    pub uploaded: usize,
    /// Objects deleted.
    pub removed: usize,
    /// Items that failed, with the reason. The batch continued past each.
    pub failures: Vec<(String, ItemError)>,
    /// Whether the batch stopped early because of cancellation.
    pub cancelled: bool,
}

/// Object key of the preview for catalog entry `uuid`.
#[must_use]
pub fn object_key(uuid: &str) -> String {
    format!("{uuid}.jpg")
}

/// Catalog and change cache, shared with the worker behind one mutex.
struct Resources {
    catalog: Box<dyn Catalog>,
    cache: Box<dyn ChangeCache>,
}

struct Inner {
    config: PrismConfig,
    client: Arc<ObjectStoreClient>,
    extractor: Arc<dyn PreviewExtractor>,
    codec: Arc<dyn PreviewCodec>,
    resources: Mutex<Resources>,
    worker: Mutex<Option<JoinHandle<BatchReport>>>,
    last_report: Mutex<Option<BatchReport>>,
    cancel: AtomicBool,
    active_request: Mutex<Option<CancelHandle>>,
}

struct Session {
    catalog_file: PathBuf,
    destination: String,
    watcher: ChangeWatcher,
}

/// Keeps a destination in sync with a watched catalog.
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
    session: Option<Session>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("state", &self.state())
            .field(
                "catalog_file",
                &self.session.as_ref().map(|s| &s.catalog_file),
            )
            .field("destination", &self.session.as_ref().map(|s| &s.destination))
            .finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    /// Create an idle orchestrator.
    pub fn new(
        config: PrismConfig,
        client: Arc<ObjectStoreClient>,
        catalog: Box<dyn Catalog>,
        cache: Box<dyn ChangeCache>,
        extractor: Arc<dyn PreviewExtractor>,
        codec: Arc<dyn PreviewCodec>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                client,
                extractor,
                codec,
                resources: Mutex::new(Resources { catalog, cache }),
                worker: Mutex::new(None),
                last_report: Mutex::new(None),
                cancel: AtomicBool::new(false),
                active_request: Mutex::new(None),
            }),
            session: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        if self.session.is_some() {
            SyncState::Synchronizing
        } else {
            SyncState::Idle
        }
    }

    /// Whether a worker batch is running.
    #[must_use]
    pub fn is_worker_active(&self) -> bool {
        self.inner
            .worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start synchronizing `catalog_file` to `destination` and run the first
    /// pass before returning.
    ///
    /// The session is running once the watcher has started, even if the first
    /// pass fails; call [`stop`](Self::stop) to end it.
    pub fn begin(
        &mut self,
        catalog_file: &Path,
        destination: &str,
    ) -> Result<TriggerOutcome, SyncError> {
        if self.session.is_some() {
            warn!(path = %catalog_file.display(), "already in a synchronizing state");
            return Err(SyncError::AlreadySynchronizing);
        }
        if !self.inner.client.has_destination(destination) {
            warn!(destination, "cannot synchronize to an unknown destination");
            return Err(SyncError::UnknownDestination(destination.to_owned()));
        }

        {
            let mut resources = self.inner.resources.lock();
            resources
                .catalog
                .open(catalog_file)
                .map_err(SyncError::Catalog)?;
            resources
                .cache
                .load_or_create()
                .map_err(SyncError::Cache)?;
        }

        let inner = Arc::clone(&self.inner);
        let watched_destination = destination.to_owned();
        let mut watcher = ChangeWatcher::new(WatchedFile::new(catalog_file), move |change| {
            debug!(path = %change.path.display(), "catalog changed");
            if let Err(err) = inner.process_changes(&watched_destination) {
                error!(error = %err, "failed to process catalog changes");
            }
        });
        watcher.begin(self.inner.config.poll_interval())?;

        info!(path = %catalog_file.display(), destination, "starting to synchronize file");
        self.session = Some(Session {
            catalog_file: catalog_file.to_path_buf(),
            destination: destination.to_owned(),
            watcher,
        });

        self.inner.process_changes(destination)
    }

    /// Run a pass now, under the same single-flight rule as the watcher.
    pub fn trigger(&self) -> Result<TriggerOutcome, SyncError> {
        let session = self.session.as_ref().ok_or(SyncError::NotSynchronizing)?;
        self.inner.process_changes(&session.destination)
    }

    /// Wait for the running batch, if any, and return its report.
    ///
    /// Without a running batch, returns the report of a finished batch that
    /// has not been collected yet.
    pub fn wait_for_batch(&self) -> Result<Option<BatchReport>, SyncError> {
        self.inner.join_worker()
    }

    /// Stop watching, cancel the running batch and wait for it.
    ///
    /// Returns the report of the last uncollected batch.
    pub fn stop(&mut self) -> Result<Option<BatchReport>, SyncError> {
        let Some(mut session) = self.session.take() else {
            warn!("not in a synchronizing state");
            return Err(SyncError::NotSynchronizing);
        };

        session.watcher.stop();

        self.inner.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.active_request.lock().as_ref() {
            handle.cancel();
        }
        let report = self.inner.join_worker();

        info!(path = %session.catalog_file.display(), "stopped synchronizing file");
        report
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(err) = self.stop() {
                error!(error = %err, "failed to stop synchronization");
            }
        }
    }
}

impl Inner {
    /// Diff the catalog against the cache and launch a worker if needed.
    fn process_changes(self: &Arc<Self>, destination: &str) -> Result<TriggerOutcome, SyncError> {
        // A held slot means a launch or join is in progress elsewhere.
        let Some(mut slot) = self.worker.try_lock() else {
            debug!("worker slot busy, dropping trigger");
            return Ok(TriggerOutcome::Busy);
        };
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("worker busy, dropping trigger");
            return Ok(TriggerOutcome::Busy);
        }
        if let Some(handle) = slot.take() {
            let report = handle.join().map_err(|_| SyncError::WorkerPanicked)?;
            *self.last_report.lock() = Some(report);
        }

        info!("processing changes");
        let actions = {
            let mut resources = self.resources.lock();
            resources.catalog.reopen().map_err(SyncError::Catalog)?;
            let keys = resources.catalog.keys().map_err(SyncError::Catalog)?;
            diff(keys, &resources.cache.snapshot())
        };

        if actions.is_empty() {
            debug!("destination is up to date");
            return Ok(TriggerOutcome::UpToDate);
        }

        let count = actions.len();
        info!(count, "changes found, processing");
        self.cancel.store(false, Ordering::SeqCst);

        let inner = Arc::clone(self);
        let destination = destination.to_owned();
        let handle = std::thread::Builder::new()
            .name("prism-sync-worker".to_owned())
            .spawn(move || inner.run_batch(&destination, actions))
            .map_err(SyncError::Spawn)?;
        *slot = Some(handle);

        Ok(TriggerOutcome::Started(count))
    }

    fn join_worker(&self) -> Result<Option<BatchReport>, SyncError> {
        let mut slot = self.worker.lock();
        match slot.take() {
            Some(handle) => handle
                .join()
                .map(Some)
                .map_err(|_| SyncError::WorkerPanicked),
            None => Ok(self.last_report.lock().take()),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn run_batch(&self, destination: &str, actions: Vec<(String, SyncAction)>) -> BatchReport {
        let mut report = BatchReport::default();

        for (key, action) in actions {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            debug!(key, %action, "processing item");

            let result = match action {
                SyncAction::Add => self.upload(destination, &key),
                SyncAction::Remove => self.remove(destination, &key),
                SyncAction::Update => {
                    debug!(key, "content updates are not synchronized, skipping");
                    continue;
                }
            };
            match result {
                Ok(()) if action == SyncAction::Add => report.uploaded += 1,
                Ok(()) => report.removed += 1,
                Err(ItemError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(err) => {
                    warn!(key, %action, error = %err, "failed to synchronize item");
                    report.failures.push((key, err));
                }
            }
        }

        info!(
            uploaded = report.uploaded,
            removed = report.removed,
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "batch finished"
        );
        report
    }

    fn upload(&self, destination: &str, key: &str) -> Result<(), ItemError> {
        let entry = self
            .resources
            .lock()
            .catalog
            .entry(key)
            .map_err(ItemError::Catalog)?
            .ok_or(ItemError::NotInCatalog)?;

        let target = self.config.preview_longest_dimension;
        let level = *entry
            .closest_level(target)
            .ok_or(ItemError::NoPreviewLevel { target })?;

        let raw = self
            .extractor
            .extract(&entry.preview_path, level.index)
            .map_err(ItemError::Extraction)?;
        if self.is_cancelled() {
            return Err(ItemError::Cancelled);
        }

        let jpeg = reencode(
            self.codec.as_ref(),
            &raw,
            target,
            self.config.preview_quality(),
        )
        .map_err(ItemError::Codec)?;
        if self.is_cancelled() {
            return Err(ItemError::Cancelled);
        }

        self.with_request(destination, |request| {
            request.put_with_content_type(&object_key(key), &jpeg, PREVIEW_CONTENT_TYPE)
        })?;

        self.resources
            .lock()
            .cache
            .insert(key)
            .map_err(ItemError::Cache)?;
        Ok(())
    }

    fn remove(&self, destination: &str, key: &str) -> Result<(), ItemError> {
        if self.is_cancelled() {
            return Err(ItemError::Cancelled);
        }
        self.with_request(destination, |request| request.delete(&object_key(key)))?;

        self.resources
            .lock()
            .cache
            .remove(key)
            .map_err(ItemError::Cache)?;
        Ok(())
    }

    /// Run one request, exposing its cancel handle to [`SyncOrchestrator::stop`].
    fn with_request(
        &self,
        destination: &str,
        operation: impl FnOnce(&mut ObjectStoreRequest) -> Result<(), StoreError>,
    ) -> Result<(), ItemError> {
        let mut request = self.client.create_request(destination)?;
        let handle = request.cancel_handle();
        *self.active_request.lock() = Some(handle.clone());
        // stop() may have raised the flag before the handle was published.
        if self.is_cancelled() {
            handle.cancel();
        }

        let result = operation(&mut request);

        *self.active_request.lock() = None;
        self.client.free_request(request);

        match result {
            Ok(()) => Ok(()),
            Err(StoreError::Cancelled) => Err(ItemError::Cancelled),
            Err(err) => Err(ItemError::Store(err)),
        }
    }
}
