// src/filesystem.rs

//! Atomic file writes
//!
//! Everything flint persists (the resolution cache, prefs.js, profiles.ini,
//! installed artifacts) goes through a temp file in the destination
//! directory followed by a rename, so readers never observe a half-written
//! file.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Open a temp file in the same directory as `dest`, creating the directory
pub fn temp_file_for(dest: &Path) -> io::Result<NamedTempFile> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    NamedTempFile::new_in(parent)
}

/// Replace `dest` with `contents` atomically
pub fn atomic_write(dest: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = temp_file_for(dest)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Copy `src` over `dest` atomically
pub fn atomic_copy(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut input = fs::File::open(src)?;
    let mut tmp = temp_file_for(dest)?;
    let copied = io::copy(&mut input, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(copied)
}
