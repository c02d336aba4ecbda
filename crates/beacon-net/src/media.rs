//! Streams inbox media into the local media directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use beacon_core::config::MediaConfig;
use beacon_core::error::{AppError, ErrorKind};
use beacon_core::result::AppResult;
use beacon_service::MediaFetcher;

/// Downloads media over HTTP.
///
/// Bytes go to a `.part` file that is renamed once the body is complete,
/// so the returned path never names a partial file.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    directory: PathBuf,
    http: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(config: &MediaConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;
        Ok(Self {
            directory: PathBuf::from(&config.directory),
            http,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn fetch_into(&self, url: &str, partial: &Path) -> AppResult<()> {
        let response = self.http.get(url).send().await.map_err(|e| {
            AppError::with_source(ErrorKind::Transport, format!("Request for {url} failed"), e)
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::transport(format!("{url} responded {status}")));
        }

        let mut file = fs::File::create(partial).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                AppError::with_source(ErrorKind::Transport, format!("Download of {url} broke off"), e)
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn download(&self, url: &str, file_stem: &str) -> AppResult<String> {
        fs::create_dir_all(&self.directory).await?;

        let target = self
            .directory
            .join(format!("{file_stem}.{}", extension_of(url)));
        let partial = self.directory.join(format!("{file_stem}.part"));

        let guard = PartialFile::new(partial.clone());
        self.fetch_into(url, &partial).await?;
        fs::rename(&partial, &target).await?;
        guard.keep();

        debug!(url, path = %target.display(), "Media stored");
        Ok(target.to_string_lossy().into_owned())
    }
}

/// Removes a `.part` file when dropped, unless the download completed.
///
/// Covers error returns and futures dropped mid-download alike.
#[derive(Debug)]
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove partial download");
            }
        }
    }
}

/// File extension taken from the URL path, `bin` when it has none usable.
fn extension_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let name = parsed.path_segments()?.next_back()?.to_string();
            let (_, ext) = name.rsplit_once('.')?;
            let usable =
                !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
            usable.then(|| ext.to_ascii_lowercase())
        })
        .unwrap_or_else(|| "bin".to_string())
}
