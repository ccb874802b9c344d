// src/cli/mod.rs
//! CLI definitions for flint
//!
//! The actual command implementation is in the `commands` module.

use clap::Parser;
use std::path::PathBuf;

/// Default download cache directory, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = "packages";

#[derive(Parser, Debug)]
#[command(name = "flint")]
#[command(author = "Flint Contributors")]
#[command(version)]
#[command(about = "Install Firefox addons and preferences from a YAML list", long_about = None)]
pub struct Cli {
    /// YAML file listing the addons and preferences to install
    pub config: PathBuf,

    /// Do not install addons, just go through the motions
    #[arg(long)]
    pub dry_run: bool,

    /// Only download addons; useful for precaching an offline install
    #[arg(long = "dl-only")]
    pub dl_only: bool,

    /// Select the development build of addons, if available
    #[arg(long)]
    pub dev: bool,

    /// Re-download addons and forget cached repository lookups
    #[arg(short = 'R', long)]
    pub refresh: bool,

    /// Directory holding downloaded addons and the resolution cache
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Install into this profile instead of the default one
    #[arg(long)]
    pub profile_dir: Option<PathBuf>,

    /// Firefox application data directory (holds profiles.ini)
    #[arg(long)]
    pub firefox_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
