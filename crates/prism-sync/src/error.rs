//! Error types for synchronization.

use std::path::PathBuf;

use prism_store::StoreError;

/// Failure reported by a catalog, cache, extractor or codec implementation.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The requested file, entry or level does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Data was present but malformed.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Image decoding or encoding failed.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// JSON (de)serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors from [`ChangeWatcher`](crate::ChangeWatcher).
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The watched file does not exist.
    #[error("cannot watch {0}: file does not exist")]
    InvalidFile(PathBuf),

    /// The watcher is already running.
    #[error("watcher is already running")]
    AlreadyWatching,

    /// The poll interval is zero.
    #[error("poll interval must be positive")]
    ZeroInterval,

    /// The polling thread could not be started.
    #[error("failed to spawn watcher thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Lifecycle errors from [`SyncOrchestrator`](crate::SyncOrchestrator).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// `begin` was called while a session is running.
    #[error("already synchronizing")]
    AlreadySynchronizing,

    /// An operation that needs a running session was called without one.
    #[error("not synchronizing")]
    NotSynchronizing,

    /// The destination is not registered with the client.
    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    /// The catalog could not be opened or read.
    #[error("catalog error: {0}")]
    Catalog(#[source] CollaboratorError),

    /// The change cache could not be loaded.
    #[error("change cache error: {0}")]
    Cache(#[source] CollaboratorError),

    /// The catalog watcher failed to start.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker thread panicked.
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Per-item failure inside a batch. Never aborts the batch.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    /// The key is no longer in the catalog.
    #[error("entry not found in catalog")]
    NotInCatalog,

    /// The entry has no preview levels.
    #[error("no preview level available for dimension {target}")]
    NoPreviewLevel {
        /// Requested longest dimension.
        target: u32,
    },

    /// The catalog lookup failed.
    #[error("catalog lookup failed: {0}")]
    Catalog(#[source] CollaboratorError),

    /// Preview extraction failed.
    #[error("preview extraction failed: {0}")]
    Extraction(#[source] CollaboratorError),

    /// Re-encoding failed.
    #[error("re-encode failed: {0}")]
    Codec(#[source] CollaboratorError),

    /// Recording the result in the change cache failed.
    #[error("change cache update failed: {0}")]
    Cache(#[source] CollaboratorError),

    /// The object-store request failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The batch was cancelled while this item was in progress.
    #[error("cancelled")]
    Cancelled,
}
