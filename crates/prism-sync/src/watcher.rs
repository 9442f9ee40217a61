//! Modification-time polling for a single file.
//!
//! A [`ChangeWatcher`] runs one polling thread. Each cycle reads the source's
//! modification time and fires the callback when it is strictly greater than
//! the value seen on the previous cycle. The first observation only primes the
//! watcher. Between cycles the thread sleeps in short slices and re-checks its
//! stop flag, so [`ChangeWatcher::stop`] returns within one slice.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::error::WatchError;

/// Longest uninterrupted sleep of the polling thread.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Something with a modification time.
pub trait ModificationSource: Send + Sync + 'static {
    /// Path reported to the callback.
    fn path(&self) -> &Path;

    /// Whether the source currently exists.
    fn is_valid(&self) -> bool;

    /// Modification time in nanoseconds since the Unix epoch, if readable.
    fn last_modified(&self) -> Option<u64>;
}

/// A file on disk.
#[derive(Debug, Clone)]
pub struct WatchedFile {
    path: PathBuf,
}

impl WatchedFile {
    /// Watch the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModificationSource for WatchedFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_valid(&self) -> bool {
        self.path.is_file()
    }

    fn last_modified(&self) -> Option<u64> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
        u64::try_from(since_epoch.as_nanos()).ok()
    }
}

/// A detected modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// The watched path.
    pub path: PathBuf,
    /// New modification time, nanoseconds since the Unix epoch.
    pub modified: u64,
}

type Callback = Arc<dyn Fn(&FileChange) + Send + Sync>;

/// Polls one [`ModificationSource`] on a background thread.
pub struct ChangeWatcher {
    source: Arc<dyn ModificationSource>,
    callback: Callback,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("path", &self.source.path())
            .field("watching", &self.is_watching())
            .finish_non_exhaustive()
    }
}

impl ChangeWatcher {
    /// Create a watcher that calls `callback` for every detected change.
    pub fn new<S, F>(source: S, callback: F) -> Self
    where
        S: ModificationSource,
        F: Fn(&FileChange) + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(source),
            callback: Arc::new(callback),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Start polling every `poll_interval`, which must be positive.
    pub fn begin(&mut self, poll_interval: Duration) -> Result<(), WatchError> {
        if self.is_watching() {
            return Err(WatchError::AlreadyWatching);
        }
        if poll_interval.is_zero() {
            warn!(path = %self.source.path().display(), "refusing to poll with a zero interval");
            return Err(WatchError::ZeroInterval);
        }
        // Reap a loop that exited on its own.
        self.stop();

        if !self.source.is_valid() {
            warn!(path = %self.source.path().display(), "attempting to watch an invalid file");
            return Err(WatchError::InvalidFile(self.source.path().to_path_buf()));
        }

        self.stop.store(false, Ordering::SeqCst);
        let source = Arc::clone(&self.source);
        let callback = Arc::clone(&self.callback);
        let stop = Arc::clone(&self.stop);

        let handle = std::thread::Builder::new()
            .name("prism-watcher".to_owned())
            .spawn(move || poll_loop(source.as_ref(), callback.as_ref(), &stop, poll_interval))
            .map_err(WatchError::Spawn)?;

        info!(path = %self.source.path().display(), ?poll_interval, "watching for changes");
        self.worker = Some(handle);
        Ok(())
    }

    /// Stop polling and join the thread. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.stop.store(true, Ordering::SeqCst);
            if handle.join().is_err() {
                warn!(path = %self.source.path().display(), "watcher thread panicked");
            }
            debug!(path = %self.source.path().display(), "watcher stopped");
        }
    }

    /// Whether the polling thread is alive.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(
    source: &dyn ModificationSource,
    callback: &(dyn Fn(&FileChange) + Send + Sync),
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    let mut last: Option<u64> = None;
    while !stop.load(Ordering::SeqCst) {
        let current = source.last_modified();
        if let (Some(now), Some(previous)) = (current, last) {
            if now > previous {
                debug!(path = %source.path().display(), modified = now, "file changed");
                callback(&FileChange {
                    path: source.path().to_path_buf(),
                    modified: now,
                });
            }
        }
        if current.is_some() {
            last = current;
        }

        let started = Instant::now();
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            let elapsed = started.elapsed();
            if elapsed >= poll_interval {
                break;
            }
            std::thread::sleep(SLEEP_SLICE.min(poll_interval - elapsed));
        }
    }
}
