//! API client for communicating with the SomaSave REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests for member, dashboard, payment and push data.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::models::{
    DashboardStats, DepositInitiation, DepositRequest, DepositStatusResponse, LoginRequest,
    LoginResponse, PushSubscription, UnsubscribeRequest, User,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the SomaSave backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (e.g. `https://portal.example/api`).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
            token: None,
        })
    }

    /// Set the token for authenticated requests
    pub fn set_token(&mut self, token: impl AsRef<str>) {
        self.token = Some(Arc::from(token.as_ref()));
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl AsRef<str>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: Some(Arc::from(token.as_ref())),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client, shared with the cache router's fetcher.
    pub fn http(&self) -> &Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| ApiError::InvalidResponse(format!("Invalid token header: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn send_with_retry(
        &self,
        url: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().headers(self.auth_headers()?).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send_with_retry(&url, || self.client.get(&url)).await?;
        Self::parse_json(response, &url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self
            .send_with_retry(&url, || self.client.post(&url).json(body))
            .await?;
        Self::parse_json(response, &url).await
    }

    /// POST where the response body carries nothing the caller needs.
    async fn post_discard<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = self.url(path);
        self.send_with_retry(&url, || self.client.post(&url).json(body))
            .await?;
        Ok(())
    }

    // ===== Authentication =====

    /// Log in with an email address or student ID.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        otp: Option<&str>,
    ) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest {
            identifier,
            password,
            otp,
        };
        let response: LoginResponse = self.post("auth/login/", &body).await?;
        debug!(user_id = response.user.id, has_token = response.token.is_some(), "Login accepted");
        Ok(response)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.post_discard("auth/logout/", &serde_json::json!({})).await
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get("auth/user/").await
    }

    // ===== Dashboard =====

    /// Fetch dashboard figures directly, bypassing the offline cache.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get("dashboard/stats/").await
    }

    // ===== Payments =====

    pub async fn initiate_deposit(&self, request: &DepositRequest) -> Result<DepositInitiation, ApiError> {
        self.post("payment-requests/initiate-deposit/", request).await
    }

    pub async fn verify_deposit(&self, tx_ref: &str) -> Result<DepositStatusResponse, ApiError> {
        self.post(
            "payment-requests/verify-deposit/",
            &serde_json::json!({ "tx_ref": tx_ref }),
        )
        .await
    }

    // ===== Push Subscriptions =====

    /// Upsert a push subscription; the backend keys it by endpoint.
    pub async fn register_push_subscription(&self, subscription: &PushSubscription) -> Result<(), ApiError> {
        self.post_discard("push-subscriptions/", subscription).await
    }

    pub async fn unregister_push_subscription(&self, endpoint: &str) -> Result<(), ApiError> {
        self.post_discard(
            "push-subscriptions/unsubscribe/",
            &UnsubscribeRequest { endpoint },
        )
        .await
    }
}
