// src/profile.rs

//! Firefox profile discovery and artifact installation
//!
//! The default profile is found through `profiles.ini` in the Firefox
//! application data directory. A fresh installation has no `profiles.ini`;
//! in that case one is written with a single generated default profile so
//! addons can be provisioned before Firefox is first started.

use crate::error::{Error, Result};
use crate::filesystem::{atomic_copy, atomic_write};
use ini::Ini;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the profile index inside the Firefox directory
pub const PROFILES_INI: &str = "profiles.ini";

/// Relative path of the profile created when no `profiles.ini` exists
pub const GENERATED_PROFILE_PATH: &str = "Profiles/generated.default";

/// Subdirectory of a profile holding installed extensions
pub const EXTENSIONS_DIR: &str = "extensions";

/// Platform-specific Firefox application data directory
pub fn firefox_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        dirs::config_dir().map(|d| d.join("Mozilla").join("Firefox"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir().map(|d| d.join("Firefox"))
    } else {
        dirs::home_dir().map(|d| d.join(".mozilla").join("firefox"))
    }
}

/// The `profiles.ini` written on a fresh installation
fn default_profiles_ini() -> Ini {
    let mut ini = Ini::new();
    ini.with_section(Some("General"))
        .set("StartWithLastProfile", "1");
    ini.with_section(Some("Profile0"))
        .set("Name", "default")
        .set("IsRelative", "1")
        .set("Path", GENERATED_PROFILE_PATH)
        .set("Default", "1");
    ini
}

/// Pick the default profile from a parsed `profiles.ini`
///
/// The last section carrying a `Default` key wins. `Install*` sections
/// store the profile path in `Default` itself instead of `Path`.
fn default_profile(ini: &Ini, firefox_dir: &Path) -> Option<PathBuf> {
    let mut found = None;

    for (section, props) in ini.iter() {
        let Some(default) = props.get("Default") else {
            continue;
        };
        let path = props.get("Path").unwrap_or(default);
        if path.is_empty() {
            continue;
        }

        let relative = match props.get("IsRelative") {
            Some(flag) => flag.trim() == "1",
            None => Path::new(path).is_relative(),
        };
        debug!(
            "Default candidate in [{}]: {} (relative: {})",
            section.unwrap_or(""),
            path,
            relative
        );

        found = Some(if relative {
            firefox_dir.join(path)
        } else {
            PathBuf::from(path)
        });
    }

    found
}

/// Locate the default profile directory under `firefox_dir`
///
/// Creates `profiles.ini` and the profile directory when missing, except
/// in dry-run mode where the would-be location is reported untouched.
pub fn locate_profile(firefox_dir: &Path, dry_run: bool) -> Result<PathBuf> {
    let ini_path = firefox_dir.join(PROFILES_INI);

    let ini = if ini_path.is_file() {
        let text = fs::read_to_string(&ini_path)?;
        Ini::load_from_str_noescape(&text).map_err(|e| {
            Error::Config(format!("invalid {}: {}", ini_path.display(), e))
        })?
    } else {
        let ini = default_profiles_ini();
        if dry_run {
            info!("Would create {}", ini_path.display());
        } else {
            let mut buf = Vec::new();
            ini.write_to(&mut buf)?;
            atomic_write(&ini_path, &buf)?;
            info!("Created {}", ini_path.display());
        }
        ini
    };

    let profile = default_profile(&ini, firefox_dir)
        .ok_or_else(|| Error::ProfileDirectoryNotFound(firefox_dir.to_path_buf()))?;

    if !profile.is_dir() && !dry_run {
        fs::create_dir_all(&profile)?;
        debug!("Created profile directory {}", profile.display());
    }

    info!("Profile: {}", profile.display());
    Ok(profile)
}

/// Installs downloaded artifacts into a browser profile
pub trait ProfileInstaller {
    /// Install `artifact` under `install_name`, returning the installed path
    fn install(&self, artifact: &Path, install_name: &str) -> Result<PathBuf>;
}

/// Drops extension packages into `<profile>/extensions/`
#[derive(Debug, Clone)]
pub struct ExtensionDirInstaller {
    profile_dir: PathBuf,
}

impl ExtensionDirInstaller {
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
        }
    }

    pub fn extensions_dir(&self) -> PathBuf {
        self.profile_dir.join(EXTENSIONS_DIR)
    }
}

impl ProfileInstaller for ExtensionDirInstaller {
    fn install(&self, artifact: &Path, install_name: &str) -> Result<PathBuf> {
        let failed = |reason: String| Error::InstallFailed {
            path: artifact.to_path_buf(),
            reason,
        };

        if install_name.is_empty() || install_name.contains(['/', '\\']) || install_name == ".." {
            return Err(failed(format!("invalid install name '{install_name}'")));
        }
        if !artifact.is_file() {
            return Err(failed("artifact is missing".to_string()));
        }

        let dest = self.extensions_dir().join(install_name);
        let bytes = atomic_copy(artifact, &dest)
            .map_err(|e| failed(format!("copy to {} failed: {e}", dest.display())))?;

        debug!("Installed {} ({} bytes)", dest.display(), bytes);
        Ok(dest)
    }
}
