use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;
use url::Url;

use crate::domain::error::{AppError, Result};
use crate::infrastructure::db::store::TableStore;
use crate::infrastructure::detect::detect;
use crate::infrastructure::fetch::ResourceFetcher;
use crate::infrastructure::parser;

/// Fetch a remote tabular source, parse it and materialize it under its
/// identity hash.
///
/// Materializations of one identity are serialized: concurrent requests
/// for the same source queue behind the in-flight one. Other identities
/// and all reads proceed untouched.
pub struct IngestUseCase {
    store: Arc<TableStore>,
    fetcher: Arc<dyn ResourceFetcher>,
    max_file_size: u64,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Stable external name of the table for one source address.
pub fn identity_for(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

impl IngestUseCase {
    pub fn new(store: Arc<TableStore>, fetcher: Arc<dyn ResourceFetcher>, max_file_size: u64) -> Self {
        Self {
            store,
            fetcher,
            max_file_size,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn execute(&self, raw_url: &str) -> Result<String> {
        let parsed = Url::parse(raw_url)
            .map_err(|_| AppError::InvalidQuery(format!("'{}' is not a valid URL", raw_url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::InvalidQuery(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        let identity = identity_for(raw_url);
        let lock = self.lock_for(&identity);
        let _guard = lock.lock().await;

        info!(url = raw_url, identity = %identity, "Ingesting source");

        let bytes = self.fetcher.fetch(raw_url, self.max_file_size).await?;

        // Detection, parsing and inference are CPU-bound; keep them off
        // the async workers.
        let table = tokio::task::spawn_blocking(move || {
            let detected = detect(&bytes);
            parser::parse(&bytes, &detected, None)
        })
        .await
        .map_err(|e| AppError::IoError(format!("Parser task failed: {}", e)))??;

        self.store.materialize(&table, &identity).await?;

        // The cached profile describes the replaced table
        let _ = std::fs::remove_file(self.store.profile_path(&identity));

        Ok(identity)
    }

    fn lock_for(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap();
        in_flight
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
