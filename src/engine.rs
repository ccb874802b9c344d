// src/engine.rs

//! Installation engine
//!
//! Drives every package through resolve, verify, download, install and
//! configure, in declared order. A failing package is reported and the run
//! moves on; the caller inspects the [`RunSummary`] to decide the exit
//! status.

use crate::cache::ResolutionCache;
use crate::error::{Error, Result};
use crate::hash::{compute_hash, HashSpec};
use crate::package::{PackageSpec, ResolvedPackage};
use crate::prefs::{PreferenceMap, PreferenceStore};
use crate::profile::ProfileInstaller;
use crate::repository::AddonSource;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Behavior switches for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Go through the motions without touching the disk
    pub dry_run: bool,
    /// Download artifacts but do not install them
    pub download_only: bool,
}

/// What happened to a package that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    /// Installed at the given path
    Installed(PathBuf),
    /// Artifact present in the download cache, install skipped
    Downloaded(PathBuf),
    /// Dry run; nothing was written
    Simulated(PlannedActions),
}

/// What a dry run would have done for one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlannedActions {
    /// URL the artifact would be downloaded from; `None` when already cached
    pub download_url: Option<String>,
    /// Artifact file name in the download cache
    pub file_name: String,
    /// Preferences that would be set
    pub preferences: PreferenceMap,
}

/// Result of one package
#[derive(Debug)]
pub struct PackageReport {
    pub id: String,
    pub name: String,
    pub result: Result<PackageOutcome>,
}

impl PackageReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a whole run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub packages: Vec<PackageReport>,
    /// Whether prefs.js was rewritten
    pub preferences_written: bool,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.packages.iter().filter(|p| p.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.packages.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &PackageReport> {
        self.packages.iter().filter(|p| !p.is_success())
    }
}

/// Installs packages into one profile
pub struct InstallationEngine<'a> {
    source: &'a dyn AddonSource,
    installer: &'a dyn ProfileInstaller,
    cache: &'a mut ResolutionCache,
    prefs: &'a mut PreferenceStore,
    cache_dir: PathBuf,
    options: EngineOptions,
}

impl<'a> InstallationEngine<'a> {
    pub fn new(
        source: &'a dyn AddonSource,
        installer: &'a dyn ProfileInstaller,
        cache: &'a mut ResolutionCache,
        prefs: &'a mut PreferenceStore,
        cache_dir: impl Into<PathBuf>,
        options: EngineOptions,
    ) -> Self {
        Self {
            source,
            installer,
            cache,
            prefs,
            cache_dir: cache_dir.into(),
            options,
        }
    }

    /// Where a package's artifact lives in the download cache
    pub fn artifact_path(&self, spec: &PackageSpec) -> PathBuf {
        self.cache_dir.join(&spec.local_filename)
    }

    /// Run every package, then merge the top-level preferences and persist
    ///
    /// Packages that could not even be built from the catalog arrive as
    /// errors and are reported alongside the others.
    pub fn run(
        &mut self,
        packages: Vec<(String, Result<PackageSpec>)>,
        profile_prefs: &PreferenceMap,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for (id, package) in packages {
            let report = match package {
                Ok(mut spec) => {
                    info!("Installing {}:", spec.display_name);
                    let result = self.install_package(&mut spec);
                    if let Err(e) = &result {
                        warn!("Package {} failed: {}", spec.id, e);
                    }
                    PackageReport {
                        id: spec.id,
                        name: spec.display_name,
                        result,
                    }
                }
                Err(e) => {
                    warn!("Package {} failed: {}", id, e);
                    PackageReport {
                        name: id.clone(),
                        id,
                        result: Err(e),
                    }
                }
            };
            summary.packages.push(report);
        }

        self.configure("profile", profile_prefs);

        if self.options.dry_run {
            debug!("Dry run, not writing {}", self.prefs.path().display());
        } else {
            summary.preferences_written = self.prefs.commit()?;
            if summary.preferences_written {
                info!("Wrote {}", self.prefs.path().display());
            }
        }

        Ok(summary)
    }

    /// Resolve, fetch, verify, install and configure one package
    pub fn install_package(&mut self, spec: &mut PackageSpec) -> Result<PackageOutcome> {
        let resolved = spec.resolve(self.source, self.cache)?;
        let artifact = self.artifact_path(spec);

        let mut present = artifact.is_file();
        if present {
            if let Some(expected) = &resolved.hash {
                match self.evict_if_mismatched(&artifact, expected) {
                    Ok(()) => {}
                    Err(e @ Error::HashMismatch { .. }) => {
                        warn!("{}, downloading again", e);
                        present = false;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if present {
            debug!("Using cached {}", artifact.display());
        } else if self.options.dry_run {
            info!(
                "Would download {} for {} from {}",
                spec.local_filename, spec.display_name, resolved.url
            );
        } else {
            self.download(&resolved, &artifact)?;
        }

        let outcome = if self.options.dry_run || self.options.download_only {
            info!("Would install {}", spec.local_filename);
            if self.options.dry_run {
                PackageOutcome::Simulated(PlannedActions {
                    download_url: (!present).then(|| resolved.url.clone()),
                    file_name: spec.local_filename.clone(),
                    preferences: spec.preference_overrides.clone(),
                })
            } else {
                PackageOutcome::Downloaded(artifact)
            }
        } else {
            let installed = self.installer.install(&artifact, &install_name(spec))?;
            info!("Installed {}", installed.display());
            PackageOutcome::Installed(installed)
        };

        self.configure(&spec.display_name, &spec.preference_overrides);
        Ok(outcome)
    }

    /// Delete a cached artifact whose digest does not match
    ///
    /// Returns the mismatch so the caller can log it; the file is already
    /// gone at that point.
    fn evict_if_mismatched(&self, artifact: &Path, expected: &str) -> Result<()> {
        let spec = HashSpec::parse(expected)?;
        let actual = compute_hash(spec.algorithm, artifact)?;
        if spec.matches_digest(&actual) {
            debug!("{} matches {}", artifact.display(), spec);
            return Ok(());
        }

        if self.options.dry_run {
            info!("Would delete {} (hash mismatch)", artifact.display());
        } else {
            fs::remove_file(artifact)?;
        }
        Err(Error::HashMismatch {
            path: artifact.to_path_buf(),
            algorithm: spec.algorithm.name().to_string(),
            expected: spec.digest,
            actual,
        })
    }

    fn download(&self, resolved: &ResolvedPackage, artifact: &Path) -> Result<()> {
        info!("Downloading {}...", resolved.url);
        self.source.download(&resolved.url, artifact)?;

        // Never install an unverified file
        if let Some(expected) = &resolved.hash {
            self.evict_if_mismatched(artifact, expected)?;
        }
        Ok(())
    }

    /// Apply overrides on behalf of `owner` (a package name or "profile")
    fn configure(&mut self, owner: &str, overrides: &PreferenceMap) {
        if overrides.is_empty() {
            return;
        }
        if self.options.dry_run {
            for (key, value) in overrides {
                info!("{}: would set {} to {}", owner, key, value);
            }
        } else {
            for (key, value) in overrides {
                info!("Set {} to {}", key, value);
            }
            self.prefs.apply_overrides(overrides);
        }
    }
}

/// File name inside `extensions/`; Firefox keys extensions by their guid
fn install_name(spec: &PackageSpec) -> String {
    match &spec.guid {
        Some(guid) => format!("{guid}.xpi"),
        None => spec.local_filename.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CACHE_FILE_NAME;
    use crate::config::{CatalogEntry, CatalogRecord};
    use crate::prefs::PrefValue;
    use std::cell::RefCell;

    struct StaticSource {
        payload: &'static [u8],
        downloads: RefCell<Vec<String>>,
    }

    impl AddonSource for StaticSource {
        fn fetch_metadata(&self, repository_id: &str) -> Result<String> {
            Err(Error::MetadataUnavailable {
                repository_id: repository_id.to_string(),
                reason: "offline".to_string(),
            })
        }

        fn download(&self, url: &str, dest: &Path) -> Result<u64> {
            self.downloads.borrow_mut().push(url.to_string());
            crate::filesystem::atomic_write(dest, self.payload)?;
            Ok(self.payload.len() as u64)
        }
    }

    struct RecordingInstaller {
        dir: PathBuf,
    }

    impl ProfileInstaller for RecordingInstaller {
        fn install(&self, artifact: &Path, install_name: &str) -> Result<PathBuf> {
            let dest = self.dir.join(install_name);
            fs::copy(artifact, &dest)?;
            Ok(dest)
        }
    }

    const HELLO_SHA256: &str =
        "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn spec(hash: Option<&str>) -> PackageSpec {
        let mut config = PreferenceMap::new();
        config.insert("extensions.x.enabled".into(), PrefValue::Bool(true));
        let record = CatalogRecord {
            id: "x".into(),
            entry: CatalogEntry {
                url: Some("https://example.org/x.xpi".into()),
                hash: hash.map(String::from),
                config,
                ..Default::default()
            },
        };
        PackageSpec::from_record(&record, false).unwrap()
    }

    struct Fixture {
        dir: tempfile::TempDir,
        cache: ResolutionCache,
        prefs: PreferenceStore,
        installer: RecordingInstaller,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("profile")).unwrap();
        fs::create_dir_all(dir.path().join("cache")).unwrap();
        Fixture {
            cache: ResolutionCache::open(dir.path().join("cache").join(CACHE_FILE_NAME)),
            prefs: PreferenceStore::for_profile(&dir.path().join("profile")).unwrap(),
            installer: RecordingInstaller {
                dir: dir.path().join("profile"),
            },
            dir,
        }
    }

    #[test]
    fn test_download_install_configure() {
        let mut fx = fixture();
        let source = StaticSource {
            payload: b"hello world",
            downloads: RefCell::new(Vec::new()),
        };
        let cache_dir = fx.dir.path().join("cache");
        let mut engine = InstallationEngine::new(
            &source,
            &fx.installer,
            &mut fx.cache,
            &mut fx.prefs,
            &cache_dir,
            EngineOptions::default(),
        );

        let outcome = engine.install_package(&mut spec(Some(HELLO_SHA256))).unwrap();
        assert_eq!(
            outcome,
            PackageOutcome::Installed(fx.dir.path().join("profile/x.xpi"))
        );
        assert!(cache_dir.join("x.xpi").is_file());
        assert!(fx.prefs.is_changed());
        assert_eq!(source.downloads.borrow().len(), 1);
    }

    #[test]
    fn test_bad_download_is_deleted() {
        let mut fx = fixture();
        let source = StaticSource {
            payload: b"tampered",
            downloads: RefCell::new(Vec::new()),
        };
        let cache_dir = fx.dir.path().join("cache");
        let mut engine = InstallationEngine::new(
            &source,
            &fx.installer,
            &mut fx.cache,
            &mut fx.prefs,
            &cache_dir,
            EngineOptions::default(),
        );

        let err = engine.install_package(&mut spec(Some(HELLO_SHA256))).unwrap_err();
        assert!(matches!(err, Error::HashMismatch { .. }));
        assert!(!cache_dir.join("x.xpi").exists());
        assert!(!fx.dir.path().join("profile/x.xpi").exists());
        assert!(!fx.prefs.is_changed());
    }

    #[test]
    fn test_stale_artifact_is_replaced() {
        let mut fx = fixture();
        let source = StaticSource {
            payload: b"hello world",
            downloads: RefCell::new(Vec::new()),
        };
        let cache_dir = fx.dir.path().join("cache");
        fs::write(cache_dir.join("x.xpi"), b"stale").unwrap();

        let mut engine = InstallationEngine::new(
            &source,
            &fx.installer,
            &mut fx.cache,
            &mut fx.prefs,
            &cache_dir,
            EngineOptions {
                download_only: true,
                ..Default::default()
            },
        );

        let outcome = engine.install_package(&mut spec(Some(HELLO_SHA256))).unwrap();
        assert_eq!(outcome, PackageOutcome::Downloaded(cache_dir.join("x.xpi")));
        assert_eq!(fs::read(cache_dir.join("x.xpi")).unwrap(), b"hello world");
        assert_eq!(source.downloads.borrow().len(), 1);
    }

    #[test]
    fn test_cached_artifact_without_hash_is_reused() {
        let mut fx = fixture();
        let source = StaticSource {
            payload: b"new",
            downloads: RefCell::new(Vec::new()),
        };
        let cache_dir = fx.dir.path().join("cache");
        fs::write(cache_dir.join("x.xpi"), b"old").unwrap();

        let mut engine = InstallationEngine::new(
            &source,
            &fx.installer,
            &mut fx.cache,
            &mut fx.prefs,
            &cache_dir,
            EngineOptions::default(),
        );
        engine.install_package(&mut spec(None)).unwrap();

        assert!(source.downloads.borrow().is_empty());
        assert_eq!(fs::read(fx.dir.path().join("profile/x.xpi")).unwrap(), b"old");
    }

    #[test]
    fn test_run_isolates_failures() {
        let mut fx = fixture();
        let source = StaticSource {
            payload: b"hello world",
            downloads: RefCell::new(Vec::new()),
        };
        let cache_dir = fx.dir.path().join("cache");
        let mut engine = InstallationEngine::new(
            &source,
            &fx.installer,
            &mut fx.cache,
            &mut fx.prefs,
            &cache_dir,
            EngineOptions::default(),
        );

        let packages = vec![
            (
                "broken".to_string(),
                Err(Error::UnresolvablePackage {
                    id: "broken".into(),
                }),
            ),
            ("x".to_string(), Ok(spec(Some(HELLO_SHA256)))),
        ];
        let summary = engine.run(packages, &PreferenceMap::new()).unwrap();

        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.is_success());
        assert_eq!(summary.failures().next().unwrap().id, "broken");
        assert!(summary.preferences_written);
    }
}
