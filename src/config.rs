// src/config.rs

//! Run configuration and package catalog
//!
//! Two YAML documents drive a run. The run configuration lists what to
//! install and which profile-wide preferences to set:
//!
//! ```yaml
//! addons:
//!   - adblock                 # catalog id
//!   - id: my-theme            # inline package
//!     name: My Theme
//!     url: https://example.org/my-theme.xpi
//! prefs:
//!   browser.startup.homepage: about:blank
//! ```
//!
//! The package catalog (`.packages.yml` by default) maps ids to package
//! entries:
//!
//! ```yaml
//! adblock:
//!   name: Adblock Plus
//!   moz-addon: 1865
//!   filename: adblockplus.xpi
//!   aliases: [abp]
//!   config:
//!     extensions.adblockplus.subscriptions_exceptionsurl: ""
//! ```

use crate::error::{Error, Result};
use crate::prefs::PreferenceMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default catalog file name, looked up next to the run configuration
pub const DEFAULT_CATALOG_NAME: &str = ".packages.yml";

/// One package description, as written in the catalog or inline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Direct download URL (stable channel)
    #[serde(default)]
    pub url: Option<String>,

    /// Direct download URL (development channel)
    #[serde(rename = "dev-url", default)]
    pub dev_url: Option<String>,

    /// Addon repository ID
    #[serde(rename = "moz-addon", default, deserialize_with = "deserialize_id")]
    pub moz_addon: Option<String>,

    /// Addon repository ID used for development builds
    #[serde(rename = "dev-moz-addon", default, deserialize_with = "deserialize_id")]
    pub dev_moz_addon: Option<String>,

    /// Local artifact file name (defaults to `<id>.xpi`)
    #[serde(default)]
    pub filename: Option<String>,

    /// Extension identifier, used as the installed file name
    #[serde(default)]
    pub guid: Option<String>,

    /// Expected digest of the direct-URL artifact (`algorithm:hex`)
    #[serde(default)]
    pub hash: Option<String>,

    /// Preference overrides applied after installation
    #[serde(default)]
    pub config: PreferenceMap,

    /// Additional ids resolving to this entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// Repository IDs are often written as bare numbers
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    }))
}

/// A package written out in full inside the run configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InlinePackage {
    pub id: String,
    #[serde(flatten)]
    pub entry: CatalogEntry,
}

/// An entry of the `addons` list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PackageReference {
    /// Catalog id (or alias)
    ById(String),
    /// Complete package description
    Inline(InlinePackage),
}

impl PackageReference {
    /// The id this reference was written with
    pub fn id(&self) -> &str {
        match self {
            Self::ById(id) => id,
            Self::Inline(pkg) => &pkg.id,
        }
    }
}

/// The run configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    /// Packages to install, in order
    #[serde(default)]
    pub addons: Vec<PackageReference>,

    /// Profile-wide preferences, applied after every package
    #[serde(default)]
    pub prefs: PreferenceMap,

    /// Catalog path, relative to the configuration file
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    /// Addon API endpoint template containing `{id}`
    #[serde(rename = "repository-url", default)]
    pub repository_url: Option<String>,
}

impl RunConfig {
    /// Parse a configuration document
    pub fn parse(yaml: &str) -> Result<Self> {
        // An empty document is a valid, empty configuration
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("invalid configuration: {e}")))
    }

    /// Load and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading {}", path.display());
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::parse(&text)
            .map_err(|e| in_file(path, e))?;
        debug!(
            "{} addons and {} preferences configured",
            config.addons.len(),
            config.prefs.len()
        );
        Ok(config)
    }

    /// Where the catalog for a configuration at `config_path` lives
    ///
    /// An explicit `catalog` key wins. Otherwise `.packages.yml` beside the
    /// configuration file, then in the working directory.
    pub fn catalog_path(&self, config_path: &Path) -> Option<PathBuf> {
        let base = config_path.parent().unwrap_or_else(|| Path::new(""));
        if let Some(explicit) = &self.catalog {
            return Some(base.join(explicit));
        }
        [base.join(DEFAULT_CATALOG_NAME), PathBuf::from(DEFAULT_CATALOG_NAME)]
            .into_iter()
            .find(|candidate| candidate.is_file())
    }
}

/// Prefix a configuration error with the file it came from
fn in_file(path: &Path, err: Error) -> Error {
    match err {
        Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
        other => other,
    }
}

/// A catalog lookup result
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    /// Canonical id (aliases map back to the id they were declared on)
    pub id: String,
    pub entry: CatalogEntry,
}

/// Package catalog with aliases expanded
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: BTreeMap<String, CatalogRecord>,
}

impl Catalog {
    /// Parse a catalog document
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, CatalogEntry> = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("invalid package catalog: {e}")))?;
        Self::from_entries(raw)
    }

    /// Build a catalog, expanding every alias to a copy of its entry
    ///
    /// Stored entries never carry `aliases`, so alias chains cannot form.
    pub fn from_entries(raw: BTreeMap<String, CatalogEntry>) -> Result<Self> {
        let mut records = BTreeMap::new();

        for (id, mut entry) in raw.clone() {
            let aliases = std::mem::take(&mut entry.aliases);
            for alias in aliases {
                if raw.contains_key(&alias) || records.contains_key(&alias) {
                    return Err(Error::Config(format!(
                        "alias '{alias}' of package '{id}' collides with another package or alias"
                    )));
                }
                records.insert(
                    alias,
                    CatalogRecord {
                        id: id.clone(),
                        entry: entry.clone(),
                    },
                );
            }
            records.insert(id.clone(), CatalogRecord { id, entry });
        }

        Ok(Self { records })
    }

    /// Load and parse a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading packages from {}", path.display());
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text).map_err(|e| in_file(path, e))
    }

    /// Load the catalog for a run configuration, or an empty one if none exists
    pub fn load_for(config: &RunConfig, config_path: &Path) -> Result<Self> {
        match config.catalog_path(config_path) {
            Some(path) => Self::load(&path),
            None => {
                warn!("No {} found; only inline addons can be installed", DEFAULT_CATALOG_NAME);
                Ok(Self::default())
            }
        }
    }

    /// Look up an id or alias
    pub fn get(&self, id: &str) -> Option<&CatalogRecord> {
        self.records.get(id)
    }

    /// Turn a configuration reference into a canonical record
    pub fn lookup(&self, reference: &PackageReference) -> Result<CatalogRecord> {
        match reference {
            PackageReference::ById(id) => {
                self.get(id)
                    .cloned()
                    .ok_or_else(|| Error::UnresolvablePackage { id: id.clone() })
            }
            PackageReference::Inline(pkg) => {
                let mut entry = pkg.entry.clone();
                entry.aliases.clear();
                Ok(CatalogRecord {
                    id: pkg.id.clone(),
                    entry,
                })
            }
        }
    }

    /// Number of ids, aliases included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
