//! HTTP ingestion endpoint adapter
//!
//! Both operations target the same script URL and select the operation
//! with an `action` query parameter.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use tracing::debug;

use crate::application::ports::{
    IngestTransport, StoreAdmin, TransportError, TransportResponse, UploadPayload,
};
use crate::domain::delivery::UploadMode;
use crate::domain::recording::Duration;

/// Action that stores one uploaded artifact
const ADD_FILE_ACTION: &str = "add_file";

/// Action that truncates every stored record
const CLEAR_ACTION: &str = "clear_all_files";

/// Multipart field carrying the artifact bytes
const FILE_FIELD: &str = "wavFile";

const WAV_MIME: &str = "audio/wav";

/// reqwest client for the ingestion script
pub struct HttpIngestClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpIngestClient {
    /// Create a client for `endpoint` whose requests give up after `timeout`
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(TransportError::InvalidEndpoint(format!(
                "{}: scheme must be http or https",
                endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout.as_std())
            .build()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Endpoint URL with `action` appended to its query
    fn action_url(&self, action: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("action", action);
        url
    }

    /// Build the multipart body for one attempt
    fn build_form(payload: &UploadPayload) -> Result<Form, TransportError> {
        let file = Part::bytes(payload.content.clone())
            .file_name(payload.name.clone())
            .mime_str(WAV_MIME)
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        let form = Form::new()
            .part(FILE_FIELD, file)
            .text("action", ADD_FILE_ACTION);

        Ok(match payload.mode {
            UploadMode::Digest => form.text("hash", payload.digest.clone()),
            UploadMode::Named => form.text("name", payload.name.clone()),
        })
    }
}

#[async_trait]
impl IngestTransport for HttpIngestClient {
    async fn send(&self, payload: &UploadPayload) -> Result<TransportResponse, TransportError> {
        let url = self.action_url(ADD_FILE_ACTION);
        let form = Self::build_form(payload)?;
        debug!(%url, artifact = %payload.name, bytes = payload.content.len(), "posting artifact");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::BodyFailed(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl StoreAdmin for HttpIngestClient {
    async fn clear_all(&self) -> Result<String, TransportError> {
        let url = self.action_url(CLEAR_ACTION);
        debug!(%url, "clearing remote store");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::BodyFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::RequestFailed(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(body)
    }
}
