// src/cache.rs

//! Persistent cache for addon-repository lookups
//!
//! Repository API responses are memoized across runs in a single CBOR file
//! under the download cache directory. The cache is write-through: every
//! `store` rewrites the whole file atomically. Entries never expire; they
//! disappear only when the file is removed (the `--refresh` flag wipes the
//! whole cache directory).
//!
//! A missing or unreadable cache file is treated as empty. Not safe for
//! concurrent writers.

use crate::error::{Error, Result};
use crate::filesystem::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the cache blob inside the download cache directory
pub const CACHE_FILE_NAME: &str = "resolution.cache";

/// Bumped whenever the on-disk layout changes
const CACHE_FORMAT_VERSION: u32 = 1;

/// Cache key for a repository lookup
pub fn repository_key(repository_id: &str) -> String {
    format!("repo_{repository_id}")
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, String>,
}

/// Key/value store backed by a single file
#[derive(Debug)]
pub struct ResolutionCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    persist: bool,
}

impl ResolutionCache {
    /// Create an empty cache bound to `path` without touching the disk
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            persist: true,
        }
    }

    /// Create a cache bound to `path` and load whatever is on disk
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut cache = Self::new(path);
        cache.load();
        cache
    }

    /// Keep stored entries in memory only (used for dry runs)
    pub fn in_memory_only(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Replace in-memory state with the persisted blob
    ///
    /// Absence yields an empty cache. Corruption is logged and also yields an
    /// empty cache.
    pub fn load(&mut self) {
        self.entries.clear();

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No resolution cache at {}", self.path.display());
                return;
            }
            Err(e) => {
                warn!(
                    "Ignoring unreadable resolution cache {}: {}",
                    self.path.display(),
                    e
                );
                return;
            }
        };

        match ciborium::from_reader::<CacheFile, _>(bytes.as_slice()) {
            Ok(file) if file.version == CACHE_FORMAT_VERSION => {
                debug!(
                    "Loaded {} cached lookups from {}",
                    file.entries.len(),
                    self.path.display()
                );
                self.entries = file.entries;
            }
            Ok(file) => {
                warn!(
                    "Ignoring resolution cache {} with format version {}",
                    self.path.display(),
                    file.version
                );
            }
            Err(e) => {
                warn!(
                    "Ignoring corrupt resolution cache {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }

    /// Look up a cached value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert a value and persist the whole cache immediately
    pub fn store(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.entries.insert(key.into(), value.into());
        if self.persist {
            self.save()?;
        }
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            entries: self.entries.clone(),
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&file, &mut buf)
            .map_err(|e| Error::Cache(format!("Failed to encode cache: {e}")))?;
        atomic_write(&self.path, &buf).map_err(|e| {
            Error::Cache(format!("Failed to write {}: {e}", self.path.display()))
        })?;
        debug!("Persisted {} cache entries", self.entries.len());
        Ok(())
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
