// src/error.rs

//! Error types shared by the flint library

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while resolving, downloading and installing addons
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed run configuration or package catalog
    #[error("Configuration error: {0}")]
    Config(String),

    /// No usable download URL could be found for a package
    #[error("Unable to resolve a download URL for package '{id}'")]
    UnresolvablePackage { id: String },

    /// The addon repository could not be reached or returned garbage
    #[error("Metadata unavailable for addon '{repository_id}': {reason}")]
    MetadataUnavailable {
        repository_id: String,
        reason: String,
    },

    /// A file on disk does not match its expected digest
    #[error("{algorithm} mismatch for {}: expected {expected}, got {actual}", path.display())]
    HashMismatch {
        path: PathBuf,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// Fetching an artifact failed
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Copying an artifact into the profile failed
    #[error("Failed to install {}: {reason}", path.display())]
    InstallFailed { path: PathBuf, reason: String },

    /// No default profile could be located
    #[error("Unable to find a default profile in {}", .0.display())]
    ProfileDirectoryNotFound(PathBuf),

    /// Hash algorithm name not recognized
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// File expected on disk is missing
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// prefs.js could not be parsed
    #[error("Invalid preference file {} (line {line}): {reason}", path.display())]
    Preferences {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Resolution cache could not be written
    #[error("Cache error: {0}")]
    Cache(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for flint operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short category name used in the run summary
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::UnresolvablePackage { .. } => "unresolvable",
            Self::MetadataUnavailable { .. } => "metadata",
            Self::HashMismatch { .. } => "hash-mismatch",
            Self::DownloadFailed { .. } => "download",
            Self::InstallFailed { .. } => "install",
            Self::ProfileDirectoryNotFound(_) => "profile",
            Self::UnsupportedAlgorithm(_) => "hash-algorithm",
            Self::FileNotFound(_) => "missing-file",
            Self::Preferences { .. } => "preferences",
            Self::Cache(_) => "cache",
            Self::Io(_) => "io",
        }
    }
}
