// src/repository/mod.rs

//! Addon repository access
//!
//! This module provides:
//! - The [`AddonSource`] seam over the network (metadata fetch and raw
//!   artifact download)
//! - [`RepositoryClient`], the HTTP implementation of that seam
//! - Cached metadata lookups through the [`ResolutionCache`]

mod client;
mod download;
mod metadata;

pub use client::{RepositoryClient, DEFAULT_API_TEMPLATE};
pub use download::{create_progress_bar, stream_to_file};
pub use metadata::{current_platform, AddonMetadata, InstallVariant};

use crate::cache::{repository_key, ResolutionCache};
use crate::error::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Where addon metadata and artifacts come from
pub trait AddonSource {
    /// Fetch the raw metadata document for a repository ID
    fn fetch_metadata(&self, repository_id: &str) -> Result<String>;

    /// Download `url` to `dest`, returning the number of bytes written
    ///
    /// Implementations must not leave a partial file at `dest` on failure.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Look up addon metadata, going to the network only on a cache miss
///
/// Only responses that parse are stored, so a bad response is retried on
/// the next run instead of being memoized.
pub fn fetch_addon_metadata(
    source: &dyn AddonSource,
    cache: &mut ResolutionCache,
    repository_id: &str,
) -> Result<AddonMetadata> {
    let key = repository_key(repository_id);

    if let Some(cached) = cache.get(&key) {
        match AddonMetadata::parse(cached) {
            Ok(metadata) => {
                debug!("Cache hit for {}", key);
                return Ok(metadata);
            }
            Err(e) => warn!("Discarding unparseable cache entry {}: {}", key, e),
        }
    }

    let body = source.fetch_metadata(repository_id)?;
    let metadata = AddonMetadata::parse(&body).map_err(|e| Error::MetadataUnavailable {
        repository_id: repository_id.to_string(),
        reason: format!("unparseable response: {e}"),
    })?;

    cache.store(key, body)?;
    Ok(metadata)
}
