use s3sync_core::{BackendClient, BackendError, RawStorageKey};
use thiserror::Error;

use super::paths::NormalizedPath;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    /// Transport or HTTP failure without a backend explanation.
    #[error("failed to fetch files: {0}")]
    Transient(String),
    /// The backend answered with an explicit error payload.
    #[error("{0}")]
    Remote(String),
    #[error("no bucket selected")]
    NoBucket,
}

impl From<BackendError> for ListingError {
    fn from(err: BackendError) -> Self {
        match err.remote_message() {
            Some(message) => ListingError::Remote(message),
            None => ListingError::Transient(err.to_string()),
        }
    }
}

/// Issues listing requests; never caches.
#[derive(Clone)]
pub struct RemoteListingService {
    client: BackendClient,
}

impl RemoteListingService {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub async fn fetch(
        &self,
        path: &NormalizedPath,
        bucket: &str,
    ) -> Result<Vec<RawStorageKey>, ListingError> {
        if bucket.trim().is_empty() {
            return Err(ListingError::NoBucket);
        }
        let keys = self.client.list_files(&path.as_prefix(), bucket).await?;
        tracing::debug!(path = %path, bucket, keys = keys.len(), "listing fetched");
        Ok(keys)
    }
}
