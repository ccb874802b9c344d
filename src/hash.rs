// src/hash.rs

//! Digest computation and verification for downloaded artifacts
//!
//! Addon repositories publish hashes as prefixed strings such as
//! `sha256:3a7bd3e2...`. This module parses those strings and checks local
//! files against them, streaming the file through the digest so artifacts
//! are never buffered whole.
//!
//! | Algorithm | Prefix   | Backing crate |
//! |-----------|----------|---------------|
//! | SHA-256   | `sha256` | sha2          |
//! | SHA-512   | `sha512` | sha2          |
//! | MD5       | `md5`    | md-5          |

use crate::error::{Error, Result};
use md5::Md5;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Chunk size used when streaming files through a digest
const CHUNK_SIZE: usize = 8192;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-256, the algorithm addons.mozilla.org publishes
    #[default]
    Sha256,
    /// SHA-512
    Sha512,
    /// MD5, still seen on some self-hosted update manifests
    Md5,
}

impl HashAlgorithm {
    /// Get the algorithm name as a string
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Md5 => "md5",
        }
    }

    /// Length of the hex digest
    #[inline]
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
            Self::Md5 => 32,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha512" | "sha-512" => Ok(Self::Sha512),
            "md5" => Ok(Self::Md5),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// An expected digest parsed from an `algorithm:hexdigest` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashSpec {
    pub algorithm: HashAlgorithm,
    /// Lowercased hex digest
    pub digest: String,
}

impl HashSpec {
    /// Parse a prefixed hash string, splitting on the first colon
    pub fn parse(spec: &str) -> Result<Self> {
        let (algo, digest) = spec
            .split_once(':')
            .ok_or_else(|| Error::UnsupportedAlgorithm(spec.to_string()))?;
        Ok(Self {
            algorithm: algo.trim().parse()?,
            digest: digest.trim().to_lowercase(),
        })
    }

    /// Compare a computed hex digest against this spec (case-insensitive)
    pub fn matches_digest(&self, actual: &str) -> bool {
        self.digest.eq_ignore_ascii_case(actual)
    }

    /// Format as a prefixed string (e.g., "sha256:abc123...")
    pub fn to_prefixed_string(&self) -> String {
        format!("{}:{}", self.algorithm.name(), self.digest)
    }
}

impl fmt::Display for HashSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_prefixed_string())
    }
}

/// Hasher that can compute hashes using any supported algorithm
pub struct Hasher {
    state: HasherState,
}

enum HasherState {
    Sha256(Sha256),
    Sha512(Sha512),
    Md5(Md5),
}

impl Hasher {
    /// Create a new hasher with the specified algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => HasherState::Sha512(Sha512::new()),
            HashAlgorithm::Md5 => HasherState::Md5(Md5::new()),
        };
        Self { state }
    }

    /// Update the hasher with more data
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha256(h) => h.update(data),
            HasherState::Sha512(h) => h.update(data),
            HasherState::Md5(h) => h.update(data),
        }
    }

    /// Finalize and return the lowercase hex digest
    pub fn finalize(self) -> String {
        match self.state {
            HasherState::Sha256(h) => format!("{:x}", h.finalize()),
            HasherState::Sha512(h) => format!("{:x}", h.finalize()),
            HasherState::Md5(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Compute hash of data from a reader
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, reader: &mut R) -> io::Result<String> {
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Compute the hex digest of a file
pub fn compute_hash(algorithm: HashAlgorithm, path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    Ok(hash_reader(algorithm, &mut file)?)
}

/// Check a file against an `algorithm:hexdigest` string
pub fn verify(expected: &str, path: &Path) -> Result<bool> {
    let spec = HashSpec::parse(expected)?;
    let actual = compute_hash(spec.algorithm, path)?;
    Ok(spec.matches_digest(&actual))
}
