//! Upload client.
//!
//! [`UploadClient`] is the seam between the importer and the service: it
//! takes a project id and the raw text of one import file and returns the
//! per-record errors the service reported. [`HttpUploadClient`] is the
//! production implementation.

use std::fmt;
use std::future::Future;

use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::ClientConfig;

/// One record-level error returned by the import service.
///
/// The service's JSON is kept as-is; [`record`](Self::record) and
/// [`message`](Self::message) read the common keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadErrorEntry(Value);

impl UploadErrorEntry {
    /// The raw JSON entry.
    #[must_use]
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Which record the error refers to, if the service said so.
    #[must_use]
    pub fn record(&self) -> Option<&Value> {
        self.0.get("record")
    }

    /// The error description (`error` or `message` key).
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.0
            .get("error")
            .or_else(|| self.0.get("message"))
            .and_then(Value::as_str)
    }
}

impl From<Value> for UploadErrorEntry {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for UploadErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.record(), self.message()) {
            (Some(record), Some(message)) => write!(f, "record {record}: {message}"),
            (None, Some(message)) => f.write_str(message),
            _ => write!(f, "{}", self.0),
        }
    }
}

/// Failures of the upload call itself, as opposed to records the service rejected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The configured endpoint is not a usable base URL.
    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// What was wrong with it.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error status and no error listing.
    #[error("import service returned {status}: {body}")]
    Status {
        /// HTTP status.
        status: StatusCode,
        /// Response body.
        body: String,
    },

    /// The service answered with a success status but the body is not an error listing.
    #[error("import service returned an unexpected response: {body}")]
    InvalidResponse {
        /// Response body.
        body: String,
    },
}

/// Sends one import file to the service.
pub trait UploadClient {
    /// Upload `payload`, the unmodified text of one import file, to `project_id`.
    ///
    /// An empty result means every record was accepted.
    fn upload(
        &self,
        project_id: &str,
        payload: &str,
    ) -> impl Future<Output = Result<Vec<UploadErrorEntry>, ClientError>> + Send;
}

impl<C: UploadClient> UploadClient for &C {
    fn upload(
        &self,
        project_id: &str,
        payload: &str,
    ) -> impl Future<Output = Result<Vec<UploadErrorEntry>, ClientError>> + Send {
        (**self).upload(project_id, payload)
    }
}

/// [`UploadClient`] that `POST`s to `{endpoint}/{project_id}/import`.
#[derive(Debug, Clone)]
pub struct HttpUploadClient {
    http: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpUploadClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] if the endpoint is not an
    /// absolute base URL, or [`ClientError::Http`] if the HTTP client cannot
    /// be initialized.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let invalid = |message: String| ClientError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            message,
        };
        let endpoint = Url::parse(&config.endpoint).map_err(|e| invalid(e.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_owned()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint,
            token: config.token.clone(),
        })
    }

    /// The URL a payload for `project_id` is sent to.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] if the endpoint cannot take
    /// path segments.
    pub fn import_url(&self, project_id: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidEndpoint {
                endpoint: self.endpoint.to_string(),
                message: "not a base URL".to_owned(),
            })?
            .pop_if_empty()
            .push(project_id)
            .push("import");
        Ok(url)
    }
}

impl UploadClient for HttpUploadClient {
    async fn upload(
        &self,
        project_id: &str,
        payload: &str,
    ) -> Result<Vec<UploadErrorEntry>, ClientError> {
        let url = self.import_url(project_id)?;
        tracing::debug!(%url, bytes = payload.len(), "Uploading payload");

        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_owned());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(%status, bytes = body.len(), "Import service responded");

        parse_upload_response(status, body)
    }
}

/// Interpret the service's answer to one upload.
fn parse_upload_response(
    status: StatusCode,
    body: String,
) -> Result<Vec<UploadErrorEntry>, ClientError> {
    if status.is_success() && body.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Vec<UploadErrorEntry>>(&body) {
        Ok(entries) => Ok(entries),
        Err(_) if !status.is_success() => Err(ClientError::Status { status, body }),
        Err(_) => Err(ClientError::InvalidResponse { body }),
    }
}
