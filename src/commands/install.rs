// src/commands/install.rs
//! The install command: configuration to installed addons

use anyhow::{Context, Result};
use flint::cache::CACHE_FILE_NAME;
use flint::profile::{self, locate_profile};
use flint::{
    Catalog, EngineOptions, ExtensionDirInstaller, InstallationEngine, PackageOutcome,
    PackageSpec, PreferenceStore, RepositoryClient, ResolutionCache, RunConfig, RunSummary,
};
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything the install command needs from the command line
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub config: PathBuf,
    pub dry_run: bool,
    pub dl_only: bool,
    pub dev: bool,
    pub refresh: bool,
    pub cache_dir: PathBuf,
    pub profile_dir: Option<PathBuf>,
    pub firefox_dir: Option<PathBuf>,
}

/// Install the addons and preferences listed in a configuration file
///
/// Returns whether every package succeeded. Configuration and profile
/// problems abort before any package is touched.
pub fn cmd_install(opts: &InstallOptions) -> Result<bool> {
    if opts.dry_run {
        println!("DRY-RUN ENABLED.");
    }

    // Load everything fallible before the refresh wipes the cache
    let config = RunConfig::load(&opts.config)
        .with_context(|| format!("Failed to load {}", opts.config.display()))?;
    let catalog = Catalog::load_for(&config, &opts.config).context("Failed to load package catalog")?;
    info!("Loaded {} addons and {} catalog entries", config.addons.len(), catalog.len());

    let client = match &config.repository_url {
        Some(template) => RepositoryClient::with_api_template(template.clone())?,
        None => RepositoryClient::new()?,
    }
    .with_progress(!opts.dry_run && std::io::stderr().is_terminal());

    prepare_cache_dir(&opts.cache_dir, opts.refresh, opts.dry_run)?;

    let profile_dir = match &opts.profile_dir {
        Some(dir) => dir.clone(),
        None => {
            let firefox_dir = match &opts.firefox_dir {
                Some(dir) => dir.clone(),
                None => profile::firefox_dir()
                    .context("Unable to determine the Firefox directory; pass --firefox-dir")?,
            };
            locate_profile(&firefox_dir, opts.dry_run)?
        }
    };
    println!("Profile: {}", profile_dir.display());

    let mut cache = ResolutionCache::open(opts.cache_dir.join(CACHE_FILE_NAME));
    if opts.dry_run {
        cache = cache.in_memory_only();
    }
    let mut prefs = PreferenceStore::for_profile(&profile_dir)?;
    let installer = ExtensionDirInstaller::new(&profile_dir);

    let packages = config
        .addons
        .iter()
        .map(|reference| {
            let spec = catalog
                .lookup(reference)
                .and_then(|record| PackageSpec::from_record(&record, opts.dev));
            (reference.id().to_string(), spec)
        })
        .collect();

    let mut engine = InstallationEngine::new(
        &client,
        &installer,
        &mut cache,
        &mut prefs,
        &opts.cache_dir,
        EngineOptions {
            dry_run: opts.dry_run,
            download_only: opts.dl_only,
        },
    );
    let summary = engine.run(packages, &config.prefs)?;

    print_summary(&summary);
    Ok(summary.is_success())
}

/// Wipe the cache directory on refresh, then make sure it exists
fn prepare_cache_dir(cache_dir: &Path, refresh: bool, dry_run: bool) -> Result<()> {
    if dry_run {
        if refresh {
            println!("Would refresh {}", cache_dir.display());
        }
        return Ok(());
    }

    if refresh && cache_dir.is_dir() {
        println!("Refreshing cache...");
        fs::remove_dir_all(cache_dir)
            .with_context(|| format!("Failed to remove {}", cache_dir.display()))?;
    }

    if !cache_dir.is_dir() {
        create_private_dir(cache_dir)
            .with_context(|| format!("Failed to create {}", cache_dir.display()))?;
        debug!("Created cache directory {}", cache_dir.display());
    }
    Ok(())
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== Install Summary ===");
    for report in &summary.packages {
        match &report.result {
            Ok(PackageOutcome::Installed(path)) => {
                println!("  [OK] {} -> {}", report.name, path.display())
            }
            Ok(PackageOutcome::Downloaded(path)) => {
                println!("  [OK] {} (downloaded to {})", report.name, path.display())
            }
            Ok(PackageOutcome::Simulated(plan)) => match &plan.download_url {
                Some(url) => println!("  [--] {} (dry run, would fetch {})", report.name, url),
                None => println!("  [--] {} (dry run, cached)", report.name),
            },
            Err(e) => println!("  [FAILED] {}: {} ({})", report.name, e, e.kind()),
        }
    }
    println!(
        "Succeeded: {}, failed: {}",
        summary.succeeded(),
        summary.failed()
    );
    if summary.preferences_written {
        println!("Preferences updated");
    }
}
