//! Client for the external thumbnail generation service.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::error::AppError;
use crate::form::Submission;
use crate::thumbnail::{ThumbnailRef, ThumbnailSet};

/// Body the service answers with.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub thumbnails: Vec<String>,
}

#[async_trait]
pub trait ThumbnailService: Send + Sync {
    async fn generate(&self, submission: &Submission) -> Result<ThumbnailSet, AppError>;
}

/// Retrieves the bytes behind a reference.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, reference: &ThumbnailRef) -> Result<Bytes, AppError>;
}

#[derive(Debug, Clone)]
pub struct HttpThumbnailService {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpThumbnailService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("thumbgen/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn multipart(submission: &Submission) -> Result<Form, AppError> {
        let photo = Part::bytes(submission.photo.data.to_vec())
            .file_name(submission.photo.file_name.clone())
            .mime_str(&submission.photo.mime)?;

        Ok(Form::new()
            .part("photo", photo)
            .text("videoType", submission.fields.video_type.clone())
            .text("style", submission.fields.style.clone())
            .text("mood", submission.fields.mood.clone())
            .text("placement", submission.fields.placement.to_string()))
    }
}

#[async_trait]
impl ThumbnailService for HttpThumbnailService {
    async fn generate(&self, submission: &Submission) -> Result<ThumbnailSet, AppError> {
        info!(
            endpoint = %self.endpoint,
            photo = %submission.photo.file_name,
            bytes = submission.photo.data.len(),
            "Submitting photo for thumbnail generation"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(Self::multipart(submission)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Status(status));
        }

        let body = response.bytes().await?;
        let parsed: GenerateResponse = serde_json::from_slice(&body)?;
        debug!("Service returned {} thumbnails", parsed.thumbnails.len());

        ThumbnailSet::parse_all(&parsed.thumbnails, &self.endpoint)
    }
}

#[async_trait]
impl ImageSource for HttpThumbnailService {
    async fn fetch(&self, reference: &ThumbnailRef) -> Result<Bytes, AppError> {
        match reference {
            ThumbnailRef::Inline { data, .. } => Ok(data.clone()),
            ThumbnailRef::Remote(url) => {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(AppError::Status(status));
                }
                Ok(response.bytes().await?)
            }
        }
    }
}
