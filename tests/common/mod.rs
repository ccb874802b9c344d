// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flint::cache::CACHE_FILE_NAME;
use flint::filesystem::atomic_write;
use flint::{
    AddonSource, Catalog, EngineOptions, Error, ExtensionDirInstaller, InstallationEngine,
    PackageSpec, PreferenceStore, ProfileInstaller, ResolutionCache, Result, RunConfig,
    RunSummary,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const HELLO: &[u8] = b"hello world";
pub const HELLO_SHA256: &str =
    "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

/// In-memory addon repository that records every request
#[derive(Default)]
pub struct FakeSource {
    metadata: HashMap<String, String>,
    artifacts: HashMap<String, Vec<u8>>,
    pub metadata_requests: RefCell<Vec<String>>,
    pub downloads: RefCell<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, repository_id: &str, xml: &str) -> Self {
        self.metadata.insert(repository_id.to_string(), xml.to_string());
        self
    }

    pub fn with_artifact(mut self, url: &str, bytes: &[u8]) -> Self {
        self.artifacts.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn metadata_request_count(&self) -> usize {
        self.metadata_requests.borrow().len()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.borrow().len()
    }
}

impl AddonSource for FakeSource {
    fn fetch_metadata(&self, repository_id: &str) -> Result<String> {
        self.metadata_requests
            .borrow_mut()
            .push(repository_id.to_string());
        self.metadata
            .get(repository_id)
            .cloned()
            .ok_or_else(|| Error::MetadataUnavailable {
                repository_id: repository_id.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.downloads.borrow_mut().push(url.to_string());
        let bytes = self.artifacts.get(url).ok_or_else(|| Error::DownloadFailed {
            url: url.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })?;
        atomic_write(dest, bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Installer that refuses every package
pub struct FailingInstaller;

impl ProfileInstaller for FailingInstaller {
    fn install(&self, artifact: &Path, _install_name: &str) -> Result<PathBuf> {
        Err(Error::InstallFailed {
            path: artifact.to_path_buf(),
            reason: "profile is read-only".to_string(),
        })
    }
}

/// A download cache and a profile inside one temp directory
///
/// Keep the struct alive to prevent cleanup.
pub struct Workspace {
    pub temp_dir: TempDir,
    pub cache_dir: PathBuf,
    pub profile_dir: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache_dir = temp_dir.path().join("packages");
        let profile_dir = temp_dir.path().join("profile");
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::create_dir_all(&profile_dir).unwrap();
        Self {
            temp_dir,
            cache_dir,
            profile_dir,
        }
    }

    pub fn artifact(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    pub fn extension(&self, file_name: &str) -> PathBuf {
        self.profile_dir.join("extensions").join(file_name)
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.profile_dir.join("prefs.js")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(CACHE_FILE_NAME)
    }

    /// Run a configuration against this workspace with the real installer
    pub fn run(
        &self,
        source: &FakeSource,
        config_yaml: &str,
        catalog_yaml: &str,
        options: EngineOptions,
        dev: bool,
    ) -> RunSummary {
        let installer = ExtensionDirInstaller::new(&self.profile_dir);
        self.run_with(source, &installer, config_yaml, catalog_yaml, options, dev)
    }

    pub fn run_with(
        &self,
        source: &FakeSource,
        installer: &dyn ProfileInstaller,
        config_yaml: &str,
        catalog_yaml: &str,
        options: EngineOptions,
        dev: bool,
    ) -> RunSummary {
        let config = RunConfig::parse(config_yaml).unwrap();
        let catalog = Catalog::parse(catalog_yaml).unwrap();

        let mut cache = ResolutionCache::open(self.cache_path());
        if options.dry_run {
            cache = cache.in_memory_only();
        }
        let mut prefs = PreferenceStore::for_profile(&self.profile_dir).unwrap();

        let packages = config
            .addons
            .iter()
            .map(|reference| {
                let spec = catalog
                    .lookup(reference)
                    .and_then(|record| PackageSpec::from_record(&record, dev));
                (reference.id().to_string(), spec)
            })
            .collect();

        let mut engine = InstallationEngine::new(
            source,
            installer,
            &mut cache,
            &mut prefs,
            &self.cache_dir,
            options,
        );
        engine.run(packages, &config.prefs).unwrap()
    }
}

/// Every file below `dir`, relative, sorted
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                out.push(path.strip_prefix(base).unwrap().to_path_buf());
            }
        }
    }

    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}

/// Minimal addon API response with one stable build
pub fn addon_xml(id: &str, name: &str, guid: &str, url: &str, hash: Option<&str>) -> String {
    let hash_attr = hash.map(|h| format!(r#" hash="{h}""#)).unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<addon id="{id}">
  <name>{name}</name>
  <guid>{guid}</guid>
  <version>1.0</version>
  <install{hash_attr} os="ALL">{url}</install>
</addon>"#
    )
}
