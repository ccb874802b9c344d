// src/repository/client.rs

//! HTTP client for the addon repository
//!
//! Wraps a blocking reqwest client with retry support for fetching addon
//! metadata and downloading artifacts.

use crate::error::{Error, Result};
use indicatif::ProgressBar;
use reqwest::blocking::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::download::{create_progress_bar, stream_to_file};
use super::AddonSource;

/// Default addon API endpoint; `{id}` is replaced by the repository ID
pub const DEFAULT_API_TEMPLATE: &str =
    "https://services.addons.mozilla.org/en-US/firefox/api/1.5/addon/{id}";

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    api_template: String,
    max_retries: u32,
    show_progress: bool,
}

impl RepositoryClient {
    /// Create a client against the default addon API
    pub fn new() -> Result<Self> {
        Self::with_api_template(DEFAULT_API_TEMPLATE)
    }

    /// Create a client against a custom API endpoint template
    pub fn with_api_template(template: impl Into<String>) -> Result<Self> {
        let api_template = template.into();
        if !api_template.contains("{id}") {
            return Err(Error::Config(format!(
                "repository URL template must contain {{id}}: {api_template}"
            )));
        }

        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("flint/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_template,
            max_retries: MAX_RETRIES,
            show_progress: false,
        })
    }

    /// Draw a progress bar while downloading
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build the metadata URL for a repository ID
    pub fn metadata_url(&self, repository_id: &str) -> Result<Url> {
        let encoded: String = url::form_urlencoded::byte_serialize(repository_id.as_bytes()).collect();
        let raw = self.api_template.replace("{id}", &encoded);
        Url::parse(&raw).map_err(|e| Error::MetadataUnavailable {
            repository_id: repository_id.to_string(),
            reason: format!("invalid API URL {raw}: {e}"),
        })
    }

    /// Send a GET request, retrying transport errors with linear backoff
    fn get_with_retry(&self, url: &str) -> std::result::Result<reqwest::blocking::Response, String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(format!("HTTP {} from {}", response.status(), url));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(format!("failed after {attempt} attempts: {e}"));
                    }
                    warn!("Request attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

impl AddonSource for RepositoryClient {
    fn fetch_metadata(&self, repository_id: &str) -> Result<String> {
        let url = self.metadata_url(repository_id)?;
        info!("Fetching addon metadata from {}", url);

        let unavailable = |reason: String| Error::MetadataUnavailable {
            repository_id: repository_id.to_string(),
            reason,
        };

        let response = self.get_with_retry(url.as_str()).map_err(unavailable)?;
        let body = response
            .text()
            .map_err(|e| unavailable(format!("failed to read response: {e}")))?;

        debug!("Received {} bytes of metadata for {}", body.len(), repository_id);
        Ok(body)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {} to {}", url, dest.display());

        Url::parse(url).map_err(|e| Error::DownloadFailed {
            url: url.to_string(),
            reason: format!("invalid URL: {e}"),
        })?;

        let mut response = self.get_with_retry(url).map_err(|reason| Error::DownloadFailed {
            url: url.to_string(),
            reason,
        })?;

        let progress: Option<ProgressBar> = if self.show_progress {
            let name = dest
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| url.to_string());
            Some(create_progress_bar(response.content_length().unwrap_or(0), &name))
        } else {
            None
        };

        let result = stream_to_file(url, &mut response, dest, progress.as_ref());
        if let Some(pb) = &progress {
            match &result {
                Ok(_) => pb.finish_with_message("[done]"),
                Err(_) => pb.abandon_with_message("[FAILED]"),
            }
        }

        let downloaded = result?;
        info!("Downloaded {} bytes to {}", downloaded, dest.display());
        Ok(downloaded)
    }
}
