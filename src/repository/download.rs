// src/repository/download.rs

//! Artifact download plumbing
//!
//! Responses are streamed in fixed-size chunks into a temp file beside the
//! destination and renamed into place only once the body has been read
//! completely. An interrupted download therefore never leaves a file at the
//! destination path, which the engine treats as "already downloaded".

use crate::error::{Error, Result};
use crate::filesystem::temp_file_for;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Create a styled progress bar for an artifact download
pub fn create_progress_bar(size: u64, name: &str) -> ProgressBar {
    let pb = if size > 0 {
        ProgressBar::new(size)
    } else {
        ProgressBar::new_spinner()
    };
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(name.to_string());
    pb
}

/// Stream `reader` into `dest`, committing with a rename on success
///
/// Returns the number of bytes written.
pub fn stream_to_file<R: Read>(
    url: &str,
    reader: &mut R,
    dest: &Path,
    progress: Option<&ProgressBar>,
) -> Result<u64> {
    let failed = |reason: String| Error::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let mut tmp = temp_file_for(dest)
        .map_err(|e| failed(format!("cannot create temp file for {}: {e}", dest.display())))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];
    loop {
        let n = reader
            .read(&mut buffer)
            .map_err(|e| failed(format!("failed to read response: {e}")))?;
        if n == 0 {
            break;
        }
        tmp.write_all(&buffer[..n])
            .map_err(|e| failed(format!("failed to write data: {e}")))?;
        downloaded += n as u64;
        if let Some(pb) = progress {
            pb.set_position(downloaded);
        }
    }

    tmp.as_file()
        .sync_all()
        .map_err(|e| failed(format!("failed to flush data: {e}")))?;
    tmp.persist(dest)
        .map_err(|e| failed(format!("failed to move into {}: {}", dest.display(), e.error)))?;

    debug!("Wrote {} bytes to {}", downloaded, dest.display());
    Ok(downloaded)
}
