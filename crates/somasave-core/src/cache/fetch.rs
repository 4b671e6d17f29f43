use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use thiserror::Error;
use tracing::debug;
use url::Origin;

use super::{Request, Snapshot};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unsupported method: {0}")]
    Method(String),

    /// Used by test and offline fetchers.
    #[error("Offline")]
    Offline,
}

/// The network side of the router. A resolved fetch is any HTTP answer,
/// including 4xx/5xx; only transport failures are errors.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, request: &Request) -> Result<Snapshot, FetchError>;
}

/// reqwest-backed fetcher. Attaches the session token to same-origin requests.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Origin,
    token: Option<Arc<str>>,
}

impl HttpFetcher {
    pub fn new(origin: Origin) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, origin))
    }

    /// Share an existing connection pool, e.g. the `ApiClient`'s.
    pub fn with_client(client: Client, origin: Origin) -> Self {
        Self {
            client,
            origin,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl AsRef<str>) -> Self {
        self.token = Some(Arc::from(token.as_ref()));
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Snapshot, FetchError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| FetchError::Method(request.method.clone()))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref token) = self.token {
            if request.url.origin() == self.origin {
                builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
            }
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status = status, bytes = body.len(), "Fetched");
        Ok(Snapshot::new(status, headers, body))
    }
}
