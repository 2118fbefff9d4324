use std::sync::Arc;

use s3sync_core::{BackendClient, BackendError};
use thiserror::Error;
use url::Url;

use crate::listing::{Entry, ListingInvalidator};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} is a folder")]
    NotAFile(String),
    #[error("{0} has no local copy")]
    NoLocalCopy(String),
    #[error("{0}")]
    Remote(String),
    #[error("request failed: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for ActionError {
    fn from(err: BackendError) -> Self {
        match err.remote_message() {
            Some(message) => ActionError::Remote(message),
            None => ActionError::Backend(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    /// The copy inside the sync folder.
    Local,
    /// The object in the bucket.
    Remote,
}

/// Per-entry operations offered by the folder view.
pub struct FileActions {
    client: BackendClient,
    invalidator: Arc<dyn ListingInvalidator>,
}

impl FileActions {
    pub fn new(client: BackendClient, invalidator: Arc<dyn ListingInvalidator>) -> Self {
        Self {
            client,
            invalidator,
        }
    }

    /// Folders never report a local copy.
    pub async fn has_local_copy(&self, entry: &Entry) -> Result<bool, ActionError> {
        if !entry.is_file() {
            return Ok(false);
        }
        Ok(self.client.check_local_file(&entry.path).await?)
    }

    pub async fn delete(&self, entry: &Entry, target: DeleteTarget) -> Result<(), ActionError> {
        require_file(entry)?;
        match target {
            DeleteTarget::Local => {
                if !self.client.check_local_file(&entry.path).await? {
                    return Err(ActionError::NoLocalCopy(entry.path.clone()));
                }
                self.client.delete_local_file(&entry.path).await?;
            }
            DeleteTarget::Remote => self.client.delete_remote_object(&entry.path).await?,
        }
        tracing::info!(path = %entry.path, ?target, "entry deleted");
        self.invalidator.invalidate_all();
        Ok(())
    }

    pub async fn stream_url(&self, entry: &Entry) -> Result<Url, ActionError> {
        require_file(entry)?;
        let link = self.client.stream_link(&entry.path).await?;
        Ok(link.url)
    }
}

fn require_file(entry: &Entry) -> Result<(), ActionError> {
    if entry.is_file() {
        Ok(())
    } else {
        Err(ActionError::NotAFile(entry.path.clone()))
    }
}
