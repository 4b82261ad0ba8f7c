use async_trait::async_trait;
use tracing::debug;

use crate::domain::error::{AppError, Result};

/// Supplies raw bytes for a source address. The byte ceiling is enforced
/// here, incrementally, so an oversized resource is cut off mid-stream
/// instead of after it has been fully buffered.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::IoError(format!("Failed to download {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::IoError(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }

        // A declared length lets us refuse before reading a single chunk;
        // the streaming check below still guards lying or absent headers.
        if let Some(declared) = response.content_length() {
            if declared > max_bytes {
                return Err(AppError::SizeExceeded(format!(
                    "{} bytes exceeds the {} byte limit",
                    declared, max_bytes
                )));
            }
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::IoError(format!("Download interrupted: {}", e)))?
        {
            if body.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(AppError::SizeExceeded(format!(
                    "download exceeded the {} byte limit",
                    max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, bytes = body.len(), "Downloaded source");
        Ok(body)
    }
}
