use std::time::Duration;

use async_trait::async_trait;

use reqwest::{Client, StatusCode};

use serde::Deserialize;

use tracing::debug;

use crate::{error::Error, request::UploadPayload};

pub const DEFAULT_ENDPOINT: &str = "https://api.mixcloud.com/upload/";

/// How the hosting API answered a single submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerReply {
    /// Published, with the platform's key for the new show.
    Accepted(String),
    /// Try again once the delay has passed.
    RateLimited(Duration),
    /// Refused for good; carries the raw response body.
    Rejected(String),
}

/// Submits one payload. Implementations never retry on their own.
#[async_trait]
pub trait Uploader {
    async fn submit(&self, payload: UploadPayload) -> Result<ServerReply, Error>;
}

#[derive(Deserialize)]
struct ResponseBody {
    result: Option<UploadResult>,
    error: Option<UploadError>,
}

#[derive(Deserialize)]
struct UploadResult {
    key: Option<String>,
}

#[derive(Deserialize)]
struct UploadError {
    retry_after: Option<u64>,
}

pub struct MixcloudClient {
    http: Client,
    endpoint: String,
    access_token: String,
}

impl MixcloudClient {
    pub fn new(endpoint: String, access_token: String, timeout: Duration) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(MixcloudClient {
            http,
            endpoint,
            access_token,
        })
    }
}

#[async_trait]
impl Uploader for MixcloudClient {
    async fn submit(&self, payload: UploadPayload) -> Result<ServerReply, Error> {
        let form = payload.into_form().await?;
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("access_token", &self.access_token)])
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%status, body = %text, "Upload response");
        Ok(classify(status, text))
    }
}

fn classify(status: StatusCode, text: String) -> ServerReply {
    let body = serde_json::from_str::<ResponseBody>(&text).ok();
    if status == StatusCode::OK {
        match body.and_then(|b| b.result).and_then(|r| r.key) {
            Some(key) => ServerReply::Accepted(key),
            None => ServerReply::Rejected(text),
        }
    } else {
        match body.and_then(|b| b.error).and_then(|e| e.retry_after) {
            Some(secs) => ServerReply::RateLimited(Duration::from_secs(secs)),
            None => ServerReply::Rejected(text),
        }
    }
}
