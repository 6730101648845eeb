// file: src/source/fetcher.rs
// description: pdf download over http with an on-disk cache, or read from a local path
// reference: https://docs.rs/reqwest

use crate::config::SourceConfig;
use crate::error::{RagError, Result};
use crate::utils::Validator;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct FetchedPdf {
    /// Location as requested (URL or local path)
    pub location: String,
    pub bytes: Vec<u8>,
    pub from_cache: bool,
}

pub struct DocumentFetcher {
    client: Client,
    config: SourceConfig,
}

impl DocumentFetcher {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RagError::Fetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub async fn fetch(&self, location: &str, force: bool) -> Result<FetchedPdf> {
        if Validator::is_http_url(location) {
            self.fetch_remote(location, force).await
        } else {
            self.read_local(Path::new(location)).await
        }
    }

    pub fn cache_path(&self, url: &str) -> Option<PathBuf> {
        let dir = self.config.cache_dir.as_ref()?;
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        Some(dir.join(format!("{:x}.pdf", hasher.finalize())))
    }

    async fn fetch_remote(&self, url: &str, force: bool) -> Result<FetchedPdf> {
        let cache_path = self.cache_path(url);

        if !force
            && let Some(path) = cache_path.as_ref()
            && path.is_file()
        {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| RagError::FileOperation {
                    path: path.clone(),
                    source,
                })?;

            if Validator::validate_pdf_bytes(&bytes).is_ok() {
                info!("Using cached download {}", path.display());
                return Ok(FetchedPdf {
                    location: url.to_string(),
                    bytes,
                    from_cache: true,
                });
            }
            warn!("Cached file {} is not a PDF, downloading again", path.display());
        }

        let bytes = self.download(url).await?;

        if let Some(path) = cache_path {
            self.write_cache(&path, &bytes).await?;
        }

        Ok(FetchedPdf {
            location: url.to_string(),
            bytes,
            from_cache: false,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        info!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RagError::Fetch(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(RagError::Fetch(format!(
                "GET {} returned status {}",
                url,
                response.status()
            )));
        }

        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            debug!("Content-Type: {:?}", content_type);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RagError::Fetch(format!("Failed to read body of {}: {}", url, e)))?;

        Validator::validate_pdf_bytes(&bytes)
            .map_err(|e| RagError::Fetch(format!("{}: {}", url, e)))?;

        info!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    async fn write_cache(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RagError::FileOperation {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| RagError::FileOperation {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Cached download at {}", path.display());
        Ok(())
    }

    async fn read_local(&self, path: &Path) -> Result<FetchedPdf> {
        Validator::validate_file_path(path)
            .map_err(|e| RagError::Fetch(format!("Not a URL or readable file: {}", e)))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| RagError::FileOperation {
                path: path.to_path_buf(),
                source,
            })?;

        Validator::validate_pdf_bytes(&bytes)
            .map_err(|e| RagError::Fetch(format!("{}: {}", path.display(), e)))?;

        info!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(FetchedPdf {
            location: path.display().to_string(),
            bytes,
            from_cache: false,
        })
    }
}
