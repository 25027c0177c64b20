use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    backend::{HttpClient, HttpError, HttpResponse, MemoryDirectory, RequestOptions},
    plugin::Services,
    result::{SearchResult, SearchResultType},
};

pub(crate) const LOCAL_SERVER: &str = "https://cloud.local";

/// Services backed by `directory`, with an http client that always fails
pub(crate) fn services(directory: MemoryDirectory) -> Services {
    Services::from_directory(Arc::new(directory), LOCAL_SERVER)
        .with_http_client(Arc::new(FailingHttpClient::default()))
}

pub(crate) fn exact_shares<'a>(
    result: &'a SearchResult,
    result_type: &SearchResultType,
) -> Vec<&'a str> {
    result
        .bucket(result_type)
        .map(|bucket| bucket.exact.iter().map(|c| c.share_with()).collect())
        .unwrap_or_default()
}

pub(crate) fn wide_shares<'a>(
    result: &'a SearchResult,
    result_type: &SearchResultType,
) -> Vec<&'a str> {
    result
        .bucket(result_type)
        .map(|bucket| bucket.wide.iter().map(|c| c.share_with()).collect())
        .unwrap_or_default()
}

/// Answers every request with the same body, and records the requested urls
#[derive(Default)]
pub(crate) struct StaticHttpClient {
    body: String,
    pub(crate) requests: std::sync::Mutex<Vec<String>>,
}

impl StaticHttpClient {
    pub(crate) fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            requests: Default::default(),
        }
    }
}

#[async_trait]
impl HttpClient for StaticHttpClient {
    async fn get(&self, url: &str, _options: RequestOptions) -> Result<HttpResponse, HttpError> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(HttpResponse {
            status: 200,
            body: self.body.clone(),
        })
    }
}

/// Simulates a network failure
#[derive(Default)]
pub(crate) struct FailingHttpClient {
    pub(crate) calls: AtomicUsize,
}

#[async_trait]
impl HttpClient for FailingHttpClient {
    async fn get(&self, url: &str, _options: RequestOptions) -> Result<HttpResponse, HttpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(HttpError::Request {
            url: url.to_string(),
            source: "connection refused".into(),
        })
    }
}
