//! HTTP transport seam used by the upload controller.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use shared::{domain::SelectedFile, protocol::PHOTO_FIELD};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Status and full body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    TimedOut,
    #[error("{0}")]
    Failed(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimedOut
        } else {
            Self::Failed(err.to_string())
        }
    }
}

#[async_trait]
pub trait PersonalizeTransport: Send + Sync {
    /// Sends `photo` as a multipart form under the `photo` field.
    async fn post_photo(
        &self,
        url: &Url,
        photo: &SelectedFile,
    ) -> Result<RawResponse, TransportError>;

    async fn get(&self, url: &Url) -> Result<RawResponse, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

#[async_trait]
impl PersonalizeTransport for ReqwestTransport {
    async fn post_photo(
        &self,
        url: &Url,
        photo: &SelectedFile,
    ) -> Result<RawResponse, TransportError> {
        let part = Part::bytes(photo.bytes().to_vec())
            .file_name(photo.file_name.clone())
            .mime_str(&photo.mime_type)?;
        let form = Form::new().part(PHOTO_FIELD, part);

        let response = self.http.post(url.clone()).multipart(form).send().await?;
        let status = response.status();
        debug!(%status, headers = ?response.headers(), "personalize response headers");
        let body = response.bytes().await?;
        Ok(RawResponse::new(status, body.to_vec()))
    }

    async fn get(&self, url: &Url) -> Result<RawResponse, TransportError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(RawResponse::new(status, body.to_vec()))
    }
}
