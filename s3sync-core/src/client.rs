use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::types::{
    ErrorPayload, ListFilesResponse, LocalCheckResponse, RawStorageKey, StreamLink,
    StreamLinkResponse, SyncAck, SyncStatus,
};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/api/";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("base url cannot carry path segments")]
    InvalidBase,
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("backend reported: {0}")]
    Remote(String),
}

impl BackendError {
    /// Message the backend itself reported, either as a `200 { "error" }`
    /// payload or inside the body of a non-2xx response.
    pub fn remote_message(&self) -> Option<String> {
        match self {
            BackendError::Remote(message) => Some(message.clone()),
            BackendError::Api { body, .. } => serde_json::from_str::<ErrorPayload>(body)
                .ok()
                .map(|payload| payload.error),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct PathBody<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct StartSyncBody<'a> {
    sync_folder: &'a str,
    bucket_name: &'a str,
}

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new() -> Result<Self, BackendError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, BackendError> {
        // Endpoints are joined relative to the base, which needs a trailing slash.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /files?path=..&bucket=..`. An empty path lists the bucket root.
    pub async fn list_files(
        &self,
        path: &str,
        bucket: &str,
    ) -> Result<Vec<RawStorageKey>, BackendError> {
        let mut url = self.endpoint("files")?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("bucket", bucket);
        let response = self.http.get(url).send().await?;
        let payload: ListFilesResponse = Self::handle_response(response).await?;
        match payload.error {
            Some(error) => Err(BackendError::Remote(error)),
            None => Ok(payload.files),
        }
    }

    pub async fn start_sync(
        &self,
        sync_folder: &str,
        bucket_name: &str,
    ) -> Result<SyncAck, BackendError> {
        let url = self.endpoint("sync/start")?;
        let response = self
            .http
            .post(url)
            .json(&StartSyncBody {
                sync_folder,
                bucket_name,
            })
            .send()
            .await?;
        Self::handle_ack(response).await
    }

    pub async fn stop_sync(&self) -> Result<SyncAck, BackendError> {
        let url = self.endpoint("sync/stop")?;
        let response = self.http.post(url).send().await?;
        Self::handle_ack(response).await
    }

    pub async fn sync_status(&self) -> Result<SyncStatus, BackendError> {
        let url = self.endpoint("sync/status")?;
        let response = self.http.get(url).send().await?;
        Self::handle_response(response).await
    }

    pub async fn check_local_file(&self, path: &str) -> Result<bool, BackendError> {
        let url = self.endpoint("files/local/check")?;
        let response = self
            .http
            .post(url)
            .json(&PathBody { path })
            .send()
            .await?;
        let payload: LocalCheckResponse = Self::handle_response(response).await?;
        Ok(payload.exists)
    }

    pub async fn delete_local_file(&self, path: &str) -> Result<(), BackendError> {
        let url = self.endpoint("files/local")?;
        let response = self
            .http
            .delete(url)
            .json(&PathBody { path })
            .send()
            .await?;
        Self::handle_empty(response).await
    }

    pub async fn delete_remote_object(&self, path: &str) -> Result<(), BackendError> {
        let url = self.endpoint("files/s3")?;
        let response = self
            .http
            .delete(url)
            .json(&PathBody { path })
            .send()
            .await?;
        Self::handle_empty(response).await
    }

    /// `GET /files/stream/<key>`: a short-lived direct URL for one object.
    pub async fn stream_link(&self, key: &str) -> Result<StreamLink, BackendError> {
        let mut url = self.endpoint("files/stream/")?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidBase)?
            .pop_if_empty()
            .extend(key.split('/').filter(|segment| !segment.is_empty()));
        let response = self.http.get(url).send().await?;
        let payload: StreamLinkResponse = Self::handle_response(response).await?;
        if let Some(error) = payload.error {
            return Err(BackendError::Remote(error));
        }
        payload
            .url
            .map(|url| StreamLink { url })
            .ok_or_else(|| BackendError::Remote("stream response is missing url".to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_ack(response: reqwest::Response) -> Result<SyncAck, BackendError> {
        let ack: SyncAck = Self::handle_response(response).await?;
        if let Some(error) = ack.error {
            return Err(BackendError::Remote(error));
        }
        if ack.kind.as_deref() == Some("error") {
            return Err(BackendError::Remote(ack.message.text().to_string()));
        }
        Ok(ack)
    }

    async fn handle_empty(response: reqwest::Response) -> Result<(), BackendError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(BackendError::Api { status, body })
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(BackendError::Api { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = BackendClient::with_base_url("http://localhost:5000/api").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:5000/api/");
        assert_eq!(
            client.endpoint("sync/status").unwrap().as_str(),
            "http://localhost:5000/api/sync/status"
        );
    }

    #[test]
    fn remote_message_reads_error_payload_from_api_body() {
        let err = BackendError::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: r#"{"error": "No bucket configured"}"#.to_string(),
        };
        assert_eq!(err.remote_message().as_deref(), Some("No bucket configured"));

        let plain = BackendError::Api {
            status: StatusCode::BAD_GATEWAY,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert_eq!(plain.remote_message(), None);
    }
}
