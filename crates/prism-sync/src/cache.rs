//! [`ChangeCache`] implementations.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collaborators::ChangeCache;
use crate::error::CollaboratorError;

/// File name of the durable cache inside the cache directory.
pub const CACHE_FILE_NAME: &str = "previewscache.json";

/// Volatile cache, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangeCache {
    keys: BTreeSet<String>,
}

impl MemoryChangeCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Into<String>> FromIterator<S> for MemoryChangeCache {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl ChangeCache for MemoryChangeCache {
    fn load_or_create(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: &str) -> Result<bool, CollaboratorError> {
        Ok(self.keys.insert(key.to_owned()))
    }

    fn remove(&mut self, key: &str) -> Result<bool, CollaboratorError> {
        Ok(self.keys.remove(key))
    }

    fn snapshot(&self) -> BTreeSet<String> {
        self.keys.clone()
    }

    fn count(&self) -> usize {
        self.keys.len()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    keys: BTreeSet<String>,
}

/// Cache persisted as JSON.
///
/// Every mutation rewrites the file through a temporary file in the same
/// directory followed by a rename, so a crash never leaves a torn file.
///
/// Each rewrite serializes the whole key set. A first pass that synchronizes
/// N new keys therefore writes O(N²) bytes in total. In exchange, every
/// completed item is on disk as soon as it finishes.
#[derive(Debug)]
pub struct JsonFileChangeCache {
    path: PathBuf,
    keys: BTreeSet<String>,
}

impl JsonFileChangeCache {
    /// Cache stored as [`CACHE_FILE_NAME`] in `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::at_path(dir.join(CACHE_FILE_NAME))
    }

    /// Cache stored at `path`.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keys: BTreeSet::new(),
        }
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), CollaboratorError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let document = CacheDocument {
            version: 1,
            keys: self.keys.clone(),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, &document)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = %self.path.display(), count = self.keys.len(), "persisted change cache");
        Ok(())
    }
}

impl ChangeCache for JsonFileChangeCache {
    fn load_or_create(&mut self) -> Result<(), CollaboratorError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let document: CacheDocument = serde_json::from_slice(&bytes)?;
                self.keys = document.keys;
                info!(path = %self.path.display(), count = self.keys.len(), "loaded change cache");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                self.keys.clear();
                self.persist()?;
                info!(path = %self.path.display(), "created change cache");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: &str) -> Result<bool, CollaboratorError> {
        if !self.keys.insert(key.to_owned()) {
            return Ok(false);
        }
        if let Err(e) = self.persist() {
            self.keys.remove(key);
            return Err(e);
        }
        Ok(true)
    }

    fn remove(&mut self, key: &str) -> Result<bool, CollaboratorError> {
        if !self.keys.remove(key) {
            return Ok(false);
        }
        if let Err(e) = self.persist() {
            self.keys.insert(key.to_owned());
            return Err(e);
        }
        Ok(true)
    }

    fn snapshot(&self) -> BTreeSet<String> {
        self.keys.clone()
    }

    fn count(&self) -> usize {
        self.keys.len()
    }
}
