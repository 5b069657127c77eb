//! Backend HTTP client
//!
//! Bearer-authenticated JSON/form requests with a bounded timeout and a
//! uniform error mapping. Idempotent reads retry transient failures with
//! exponential backoff; submissions never retry — they are user-initiated
//! and at-most-once.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use url::Url;

use crate::credentials::CredentialStore;

/// Default backend address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum attempts for idempotent reads
const MAX_READ_ATTEMPTS: u32 = 3;

/// Base delay for read-retry backoff in milliseconds
const BASE_RETRY_DELAY_MS: u64 = 100;

/// Errors from backend exchanges
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("server error ({status}): {detail}")]
    Upstream { status: u16, detail: String },

    #[error("credential missing or rejected")]
    Unauthorized,

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Whether a retry could plausibly succeed (transport faults and
    /// server-side 5xx only)
    fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout(_) => true,
            ApiError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// HTTP client bound to one backend and one credential provider
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<CredentialStore>,
    timeout_secs: u64,
}

impl ApiClient {
    /// Build a client for `base_url` with the given request timeout
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid base URL '{}': {}", base_url, e)))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            credentials,
            timeout_secs,
        })
    }

    /// The configured request timeout in seconds
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.credentials.current().ok_or(ApiError::Unauthorized)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout_secs)
        } else {
            ApiError::Network(err.to_string())
        }
    }

    /// Authenticated POST with a JSON body, no retry
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let token = self.bearer()?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        decode(response).await
    }

    /// Authenticated GET with bounded retry on transient failures
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let token = self.bearer()?;

        let mut attempt = 0;
        loop {
            let outcome = match self
                .http
                .get(url.clone())
                .bearer_auth(&token)
                .send()
                .await
            {
                Ok(response) => decode::<T>(response).await,
                Err(e) => Err(self.map_send_error(e)),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!("read succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !err.is_transient() || attempt + 1 == MAX_READ_ATTEMPTS {
                        return Err(err);
                    }
                    let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
                    tracing::warn!(
                        "read of {} failed (attempt {}), retrying in {}ms: {}",
                        path,
                        attempt + 1,
                        delay_ms,
                        err
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Unauthenticated POST with a form-encoded body (token endpoint)
    pub async fn post_form_unauthenticated<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        decode(response).await
    }

    /// Unauthenticated POST with a JSON body (register endpoint)
    pub async fn post_json_unauthenticated<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        decode(response).await
    }
}

/// Map a response onto the error taxonomy and decode the JSON body
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.as_u16() == 401 {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let detail = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(ApiError::Upstream {
            status: status.as_u16(),
            detail,
        });
    }
    response.json().await.map_err(|e| ApiError::Parse(e.to_string()))
}
