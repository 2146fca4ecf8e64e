//! Network seam between the translation client and the service.

use std::time::Duration;

use async_trait::async_trait;

use super::error::{TranslateError, TranslateResult};

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues requests against the translation service.
///
/// Implementations must honor `timeout` and report an expired timeout as
/// [`TranslateError::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET {base}{path}`.
    async fn get(&self, path: &str, timeout: Duration) -> TranslateResult<HttpResponse>;

    /// `POST {base}{path}` with a JSON body.
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> TranslateResult<HttpResponse>;
}

/// [`Transport`] backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the service at `base_url` (e.g. `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>) -> TranslateResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> TranslateResult<HttpResponse> {
        let id = uuid::Uuid::new_v4().to_string();
        let exchange = async {
            let response = request.header(REQUEST_ID_HEADER, id).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, TranslateError>(HttpResponse { status, body })
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TranslateError::Timeout(timeout)),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, timeout: Duration) -> TranslateResult<HttpResponse> {
        let request = self.client.get(self.url(path));
        self.send(request, timeout).await
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> TranslateResult<HttpResponse> {
        let request = self.client.post(self.url(path)).json(body);
        self.send(request, timeout).await
    }
}
