// src/lib.rs

//! Flint, a Firefox addon installer
//!
//! Reads a YAML list of wanted addons, resolves each one to a download URL
//! through a package catalog (directly or via the addon repository API),
//! downloads and verifies the artifacts into a local cache, installs them
//! into the default Firefox profile and writes preference overrides to the
//! profile's `prefs.js`.
//!
//! # Architecture
//!
//! - Network access sits behind [`AddonSource`], profile writes behind
//!   [`ProfileInstaller`], so the [`InstallationEngine`] runs against fakes
//!   in tests
//! - Repository lookups are memoized in a persistent [`ResolutionCache`]
//! - Every write goes through a temp file and a rename

pub mod cache;
pub mod config;
pub mod engine;
mod error;
pub mod filesystem;
pub mod hash;
pub mod package;
pub mod prefs;
pub mod profile;
pub mod repository;

pub use cache::ResolutionCache;
pub use config::{Catalog, CatalogEntry, CatalogRecord, PackageReference, RunConfig};
pub use engine::{
    EngineOptions, InstallationEngine, PackageOutcome, PackageReport, PlannedActions, RunSummary,
};
pub use error::{Error, Result};
pub use hash::{HashAlgorithm, HashSpec, Hasher};
pub use package::{Channel, PackageSpec, ResolutionMode, ResolvedPackage};
pub use prefs::{PrefValue, PreferenceMap, PreferenceStore};
pub use profile::{ExtensionDirInstaller, ProfileInstaller};
pub use repository::{AddonMetadata, AddonSource, RepositoryClient};
