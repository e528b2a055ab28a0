use std::future::Future;

use bytes::Bytes;
use reqwest::{
    StatusCode,
    header::{CONTENT_LENGTH, RANGE},
};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A shard after redirect resolution: the final URL and the total size the
/// remote store declared for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLocation {
    pub url: String,
    pub content_length: u64,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not build the HTTP client")]
    Client {
        #[source]
        source: BoxError,
    },
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("{url} answered HTTP {status}")]
    UnexpectedStatus { url: String, status: u16 },
    #[error("{url} did not declare a Content-Length")]
    MissingContentLength { url: String },
    #[error("{url} declared an unreadable Content-Length")]
    InvalidContentLength { url: String },
}

/// Byte source capable of ranged reads. The production implementation talks
/// HTTP; tests substitute in-memory sources.
pub trait RangedTransport: Send + Sync {
    /// Follow redirects and return the final URL together with the declared
    /// total byte length.
    fn resolve(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ShardLocation, TransportError>> + Send;

    /// Fetch the half-open byte range `[start, end)`. On success the body is
    /// expected to span exactly `end - start` bytes; callers verify.
    fn fetch_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

/// HTTP transport on a shared `reqwest` client. Redirects are followed by the
/// client itself, so `resolve` reports the post-redirect URL.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().build().map_err(|source| {
            TransportError::Client {
                source: Box::new(source),
            }
        })?;
        Ok(Self {
            client,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
        }
    }
}

impl RangedTransport for HttpTransport {
    async fn resolve(&self, url: &str) -> Result<ShardLocation, TransportError> {
        let response =
            self.client.head(url).send().await.map_err(|source| {
                TransportError::Request {
                    url: url.to_string(),
                    source: Box::new(source),
                }
            })?;
        if !response.status().is_success() {
            return Err(TransportError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let resolved = response.url().to_string();
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .ok_or_else(|| TransportError::MissingContentLength {
                url: resolved.clone(),
            })?
            .to_str()
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or_else(|| TransportError::InvalidContentLength {
                url: resolved.clone(),
            })?;
        log::debug!("resolved {url} to {resolved} ({content_length} bytes)");
        Ok(ShardLocation {
            url: resolved,
            content_length,
        })
    }

    async fn fetch_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
    ) -> Result<Bytes, TransportError> {
        debug_assert!(end > start);
        // The Range header is inclusive on both ends; `end` is exclusive.
        let range = format!("bytes={}-{}", start, end - 1);
        let response = self
            .client
            .get(url)
            .header(RANGE, range)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source: Box::new(source),
            })?;
        let status = response.status();
        // 200 happens when the requested span is the whole file. If the
        // server ignored the Range header, the oversized body fails the
        // length check downstream.
        if status != StatusCode::PARTIAL_CONTENT && status != StatusCode::OK {
            return Err(TransportError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.bytes().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source: Box::new(source),
        })
    }
}
