// src/package.rs

//! Package specifications and download-URL resolution
//!
//! A [`PackageSpec`] is built from a catalog record. For each channel it
//! tries the URL the catalog names directly, then the addon repository.
//! Development builds are preferred when requested; if none exists the
//! stable channel is tried exactly once before giving up.

use crate::cache::ResolutionCache;
use crate::config::CatalogRecord;
use crate::error::{Error, Result};
use crate::prefs::PreferenceMap;
use crate::repository::{fetch_addon_metadata, AddonSource};
use std::fmt;
use tracing::{debug, info};

/// Release channel of an addon build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Stable,
    Dev,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Dev => "dev",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One place a package's download URL can come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionMode {
    /// The catalog names the URL
    DirectUrl { url: String, hash: Option<String> },
    /// The URL comes from the addon repository
    RepositoryLookup { repository_id: String },
}

/// Outcome of resolving a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub url: String,
    /// Expected digest, `algorithm:hex`
    pub hash: Option<String>,
    /// Extension identifier, when known
    pub guid: Option<String>,
    /// Channel the URL belongs to (may differ from the requested one)
    pub channel: Channel,
}

/// Where resolution currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolutionState {
    /// Trying the channel the user asked for
    Requested(Channel),
    /// Dev was asked for and not found; trying stable once
    Fallback,
    Unresolved,
}

/// A package to install
#[derive(Debug, Clone)]
pub struct PackageSpec {
    pub id: String,
    pub display_name: String,
    /// Sources for the stable channel, tried in order
    pub stable_sources: Vec<ResolutionMode>,
    /// Sources for the dev channel, tried in order
    pub dev_sources: Vec<ResolutionMode>,
    pub dev_requested: bool,
    pub local_filename: String,
    pub guid: Option<String>,
    pub preference_overrides: PreferenceMap,
    resolved: Option<ResolvedPackage>,
}

impl PackageSpec {
    /// Build a package from a catalog record
    ///
    /// Each channel tries its direct URL first, then its repository ID.
    /// Development builds are published under the same repository record as
    /// stable ones (marked `Beta`), so the dev channel reuses `moz-addon`
    /// when no `dev-moz-addon` is given. Fails with `UnresolvablePackage`
    /// when the record names neither a URL nor a repository ID.
    pub fn from_record(record: &CatalogRecord, dev_requested: bool) -> Result<Self> {
        let entry = &record.entry;

        let stable_sources = channel_sources(
            entry.url.as_ref(),
            entry.hash.as_ref(),
            entry.moz_addon.as_ref(),
        );
        let dev_sources = channel_sources(
            entry.dev_url.as_ref(),
            None,
            entry.dev_moz_addon.as_ref().or(entry.moz_addon.as_ref()),
        );
        if stable_sources.is_empty() && dev_sources.is_empty() {
            return Err(Error::UnresolvablePackage {
                id: record.id.clone(),
            });
        }

        Ok(Self {
            id: record.id.clone(),
            display_name: entry.name.clone().unwrap_or_else(|| record.id.clone()),
            stable_sources,
            dev_sources,
            dev_requested,
            local_filename: entry
                .filename
                .clone()
                .unwrap_or_else(|| format!("{}.xpi", record.id)),
            guid: entry.guid.clone(),
            preference_overrides: entry.config.clone(),
            resolved: None,
        })
    }

    /// The resolution result, if `resolve` already succeeded
    pub fn resolved(&self) -> Option<&ResolvedPackage> {
        self.resolved.as_ref()
    }

    /// Resolve the download URL, at most once per package
    pub fn resolve(
        &mut self,
        source: &dyn AddonSource,
        cache: &mut ResolutionCache,
    ) -> Result<ResolvedPackage> {
        if let Some(resolved) = &self.resolved {
            return Ok(resolved.clone());
        }

        let requested = if self.dev_requested {
            Channel::Dev
        } else {
            Channel::Stable
        };

        let mut state = ResolutionState::Requested(requested);
        let resolved = loop {
            match state {
                ResolutionState::Requested(channel) => {
                    if let Some(found) = self.resolve_channel(channel, source, cache)? {
                        break found;
                    }
                    state = match channel {
                        Channel::Dev => ResolutionState::Fallback,
                        Channel::Stable => ResolutionState::Unresolved,
                    };
                }
                ResolutionState::Fallback => {
                    info!(
                        "No development build of {}, falling back to stable",
                        self.display_name
                    );
                    if let Some(found) = self.resolve_channel(Channel::Stable, source, cache)? {
                        break found;
                    }
                    state = ResolutionState::Unresolved;
                }
                ResolutionState::Unresolved => {
                    return Err(Error::UnresolvablePackage {
                        id: self.id.clone(),
                    });
                }
            }
        };

        if self.guid.is_none() {
            self.guid = resolved.guid.clone();
        }
        debug!("Resolved {} ({}) to {}", self.id, resolved.channel, resolved.url);
        self.resolved = Some(resolved.clone());
        Ok(resolved)
    }

    /// Sources tried for a channel, in order
    pub fn sources(&self, channel: Channel) -> &[ResolutionMode] {
        match channel {
            Channel::Stable => &self.stable_sources,
            Channel::Dev => &self.dev_sources,
        }
    }

    /// Try a single channel; `None` means "nothing for this channel"
    fn resolve_channel(
        &mut self,
        channel: Channel,
        source: &dyn AddonSource,
        cache: &mut ResolutionCache,
    ) -> Result<Option<ResolvedPackage>> {
        for mode in self.sources(channel).to_vec() {
            match mode {
                ResolutionMode::DirectUrl { url, hash } => {
                    return Ok(Some(ResolvedPackage {
                        url,
                        hash,
                        guid: self.guid.clone(),
                        channel,
                    }));
                }
                ResolutionMode::RepositoryLookup { repository_id } => {
                    let metadata = fetch_addon_metadata(source, cache, &repository_id)?;
                    if self.display_name == self.id {
                        if let Some(name) = &metadata.name {
                            self.display_name = name.clone();
                        }
                    }

                    if let Some(variant) = metadata.select(channel) {
                        return Ok(Some(ResolvedPackage {
                            url: variant.download_url().to_string(),
                            hash: variant.hash.clone(),
                            guid: self.guid.clone().or_else(|| metadata.guid.clone()),
                            channel,
                        }));
                    }
                    debug!(
                        "No {} build of {} in repository entry {}",
                        channel, self.id, repository_id
                    );
                }
            }
        }
        Ok(None)
    }
}

fn channel_sources(
    url: Option<&String>,
    hash: Option<&String>,
    repository_id: Option<&String>,
) -> Vec<ResolutionMode> {
    let mut sources = Vec::new();
    if let Some(url) = url {
        sources.push(ResolutionMode::DirectUrl {
            url: url.clone(),
            hash: hash.cloned(),
        });
    }
    if let Some(id) = repository_id {
        sources.push(ResolutionMode::RepositoryLookup {
            repository_id: id.clone(),
        });
    }
    sources
}
