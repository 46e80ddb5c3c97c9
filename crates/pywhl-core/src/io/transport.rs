//! Byte transport for artifact downloads.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use thiserror::Error;

/// Why one download attempt failed.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Timeouts, resets, refused or unreachable hosts, truncated bodies.
    #[error("network error: {0}")]
    Transient(String),

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// An open response body.
pub struct Body {
    /// Length announced by the server, if any.
    pub total: Option<u64>,
    pub stream: ByteStream,
}

#[async_trait]
pub trait ArtifactTransport: Send + Sync {
    /// Start fetching `url`. Errors before the first byte are returned here;
    /// errors mid-body come through the stream.
    async fn open(&self, url: &str) -> Result<Body, FetchError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(classify)?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactTransport for HttpTransport {
    async fn open(&self, url: &str) -> Result<Body, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        Ok(Body {
            total: response.content_length(),
            stream: response.bytes_stream().map(|r| r.map_err(classify)).boxed(),
        })
    }
}

/// Sort a reqwest error into retryable or terminal.
pub fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() || err.is_body() || has_transient_io(&err) {
        FetchError::Transient(err.to_string())
    } else if let Some(status) = err.status() {
        FetchError::Status {
            status: status.as_u16(),
        }
    } else {
        FetchError::Http(err.to_string())
    }
}

fn has_transient_io(err: &(dyn std::error::Error + 'static)) -> bool {
    use std::io::ErrorKind::{
        BrokenPipe, ConnectionAborted, ConnectionRefused, ConnectionReset, HostUnreachable,
        NetworkUnreachable, TimedOut, UnexpectedEof,
    };

    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ConnectionReset
                    | ConnectionAborted
                    | ConnectionRefused
                    | BrokenPipe
                    | TimedOut
                    | UnexpectedEof
                    | HostUnreachable
                    | NetworkUnreachable
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}
