//! HTTP transport.
//!
//! The [`Client`](crate::Client) only needs four verbs and a fully-read body,
//! so the transport is a small trait. [`HttpTransport`] implements it on top
//! of `reqwest`; tests plug in their own implementation.

use std::future::Future;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use tracing::debug;

use crate::error::Result;

/// Status code and body of a completed request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Empty when the server sent no body.
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// One request in flight yields one [`RawResponse`] or one transport error.
///
/// Non-2xx statuses are not errors at this level.
pub trait Transport: Send + Sync {
    /// POST a JSON document.
    fn post(&self, url: &Url, body: String) -> impl Future<Output = Result<RawResponse>> + Send;

    /// POST a gzip-compressed document.
    fn post_compressed(
        &self,
        url: &Url,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<RawResponse>> + Send;

    fn get(&self, url: &Url) -> impl Future<Output = Result<RawResponse>> + Send;

    fn delete(&self, url: &Url) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// `reqwest`-backed transport.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, TLS settings).
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<RawResponse> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!(status, body_len = body.len(), "received response");
        Ok(RawResponse { status, body })
    }
}

impl Transport for HttpTransport {
    async fn post(&self, url: &Url, body: String) -> Result<RawResponse> {
        debug!(method = "POST", %url, body_len = body.len(), "sending request");
        let request = self
            .http
            .request(Method::POST, url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.send(request).await
    }

    async fn post_compressed(&self, url: &Url, body: Vec<u8>) -> Result<RawResponse> {
        debug!(method = "POST", %url, body_len = body.len(), "sending compressed request");
        let request = self
            .http
            .request(Method::POST, url.clone())
            .header(CONTENT_TYPE, "application/gzip")
            .body(body);
        self.send(request).await
    }

    async fn get(&self, url: &Url) -> Result<RawResponse> {
        debug!(method = "GET", %url, "sending request");
        self.send(self.http.request(Method::GET, url.clone())).await
    }

    async fn delete(&self, url: &Url) -> Result<RawResponse> {
        debug!(method = "DELETE", %url, "sending request");
        self.send(self.http.request(Method::DELETE, url.clone())).await
    }
}
