//! Minimal HTTP client used to query remote directories

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("server answered {status} to {url}")]
    Status { url: String, status: u16 },
    #[error("failed to build the http client")]
    Build(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a GET request. Non-success status codes are returned as [`HttpError::Status`].
    async fn get(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, HttpError>;
}

/// [`HttpClient`] backed by reqwest. The connection pool is shared by all the requests.
#[derive(Debug, Default, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives up connecting to a server after `connect_timeout`
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, options: RequestOptions) -> Result<HttpResponse, HttpError> {
        let request_error = |e: reqwest::Error| HttpError::Request {
            url: url.to_string(),
            source: Box::new(e),
        };

        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(request_error)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            body,
        })
    }
}
