//! Interfaces to the collaborators the synchronizer depends on.
//!
//! Implementations must be [`Send`]: the orchestrator shares the catalog and
//! change cache with its worker thread behind a single mutex.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::CollaboratorError;

/// One stored rendition of a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewLevel {
    /// Level index understood by the [`PreviewExtractor`].
    pub index: u32,
    /// Longest edge of this rendition, in pixels.
    pub longest_dimension: u32,
}

/// A catalog entry: an image and its available preview levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Stable key of the entry.
    pub uuid: String,
    /// Content digest reported by the catalog.
    pub digest: String,
    /// File holding the preview pyramid.
    pub preview_path: PathBuf,
    /// Levels present in the pyramid.
    pub levels: Vec<PreviewLevel>,
}

impl CatalogEntry {
    /// Pick the level to re-encode for `target` pixels.
    ///
    /// The smallest level at least `target` pixels long wins, so the result is
    /// only ever scaled down. When every level is smaller, the largest is used.
    #[must_use]
    pub fn closest_level(&self, target: u32) -> Option<&PreviewLevel> {
        self.levels
            .iter()
            .filter(|level| level.longest_dimension >= target)
            .min_by_key(|level| level.longest_dimension)
            .or_else(|| self.levels.iter().max_by_key(|level| level.longest_dimension))
    }
}

/// Decoded RGB8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGB8 samples, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

/// Read access to the photo catalog.
pub trait Catalog: Send {
    /// Open the catalog stored at `path`.
    fn open(&mut self, path: &Path) -> Result<(), CollaboratorError>;

    /// Re-open the current catalog, picking up a replaced file.
    fn reopen(&mut self) -> Result<(), CollaboratorError>;

    /// Every key currently in the catalog.
    fn keys(&self) -> Result<Vec<String>, CollaboratorError>;

    /// Look up one entry.
    fn entry(&self, uuid: &str) -> Result<Option<CatalogEntry>, CollaboratorError>;
}

/// Durable record of the keys already synchronized.
pub trait ChangeCache: Send {
    /// Load the cache, creating it when absent.
    fn load_or_create(&mut self) -> Result<(), CollaboratorError>;

    /// Whether `key` has been synchronized.
    fn contains(&self, key: &str) -> bool;

    /// Record `key`. Returns `false` if it was already present.
    fn insert(&mut self, key: &str) -> Result<bool, CollaboratorError>;

    /// Forget `key`. Returns `false` if it was absent.
    fn remove(&mut self, key: &str) -> Result<bool, CollaboratorError>;

    /// Copy of every recorded key.
    fn snapshot(&self) -> BTreeSet<String>;

    /// Number of recorded keys.
    fn count(&self) -> usize;
}

/// Pulls encoded preview bytes out of a preview pyramid file.
pub trait PreviewExtractor: Send + Sync {
    /// Extract the rendition at `level` from the file at `path`.
    fn extract(&self, path: &Path, level: u32) -> Result<Vec<u8>, CollaboratorError>;
}

/// Image decode, bilinear rescale and encode.
pub trait PreviewCodec: Send + Sync {
    /// Decode encoded image bytes.
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CollaboratorError>;

    /// Bilinear rescale to `width` x `height`.
    fn rescale(
        &self,
        image: &DecodedImage,
        width: u32,
        height: u32,
    ) -> Result<DecodedImage, CollaboratorError>;

    /// Encode at `quality` (1..=100).
    fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>, CollaboratorError>;
}
