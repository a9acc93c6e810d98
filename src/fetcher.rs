//! HTTP transport for the crawl engine.
//!
//! The engine talks to the network only through the [`Fetch`] trait so that
//! it can be driven by in-memory sites in tests. [`HttpFetcher`] is the
//! reqwest-backed implementation used by the binary.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use mime::Mime;
use reqwest::{Client, ClientBuilder, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A response whose body has not been read yet.
pub struct FetchResponse {
    pub content_type: Option<String>,
    pub body: BoxStream<'static, Result<Bytes, FetchError>>,
}

impl FetchResponse {
    /// Response backed by an in-memory body.
    pub fn from_bytes(content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            content_type: content_type.map(str::to_string),
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }

    pub fn is_html(&self) -> bool {
        is_html_content_type(self.content_type.as_deref())
    }
}

/// Whether a declared `Content-Type` names an HTML document.
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    let Some(value) = content_type else {
        return false;
    };
    match value.parse::<Mime>() {
        Ok(mime) => mime.type_() == mime::TEXT && mime.subtype() == mime::HTML,
        Err(_) => value.to_ascii_lowercase().contains("text/html"),
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    /// Issue one GET for `url`. Implementations never retry.
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Http(err)
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        debug!(%url, "sending request");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let timeout = self.timeout;
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout(timeout)
                    } else {
                        FetchError::Http(e)
                    }
                })
            })
            .boxed();

        Ok(FetchResponse { content_type, body })
    }
}
