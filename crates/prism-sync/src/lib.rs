//! Catalog change detection and preview synchronization for Prism.
//!
//! A [`SyncOrchestrator`] watches a catalog file with a [`ChangeWatcher`],
//! computes the [`SyncAction`]s needed to bring a remote destination in line
//! with the catalog (see [`diff`]) and hands them to a single background
//! worker. The worker extracts, re-encodes and uploads previews, or deletes
//! them, recording every success in a durable [`ChangeCache`].
//!
//! ```text
//! ChangeWatcher --change--> SyncOrchestrator --actions--> worker thread
//!                                 |                          |
//!                           Catalog + ChangeCache      ObjectStoreRequest
//! ```
//!
//! The catalog reader and preview extractor are external collaborators
//! described by the traits in [`collaborators`].

pub mod cache;
pub mod codec;
pub mod collaborators;
pub mod diff;
pub mod error;
pub mod orchestrator;
pub mod watcher;

pub use cache::{JsonFileChangeCache, MemoryChangeCache};
pub use codec::{ImageCodec, reencode};
pub use collaborators::{
    Catalog, CatalogEntry, ChangeCache, DecodedImage, PreviewCodec, PreviewExtractor, PreviewLevel,
};
pub use diff::{SyncAction, diff};
pub use error::{CollaboratorError, ItemError, SyncError, WatchError};
pub use orchestrator::{BatchReport, SyncOrchestrator, SyncState, TriggerOutcome};
pub use watcher::{ChangeWatcher, FileChange, ModificationSource, WatchedFile};
