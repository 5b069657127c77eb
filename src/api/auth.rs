//! Account operations: register, login, logout
//!
//! The token endpoint takes form-encoded credentials and returns the
//! opaque access token, which is persisted through the injected
//! credential store. Registration is a plain JSON POST.

use std::sync::Arc;

use super::client::{ApiClient, ApiError};
use super::types::{RegisterRequest, TokenResponse};
use crate::credentials::CredentialStore;

/// Path of the token endpoint
const TOKEN_PATH: &str = "/api/auth/token";

/// Path of the register endpoint
const REGISTER_PATH: &str = "/api/auth/register";

/// Auth errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to persist credential: {0}")]
    Storage(String),
}

/// Client for the unauthenticated account endpoints
pub struct AuthClient {
    api: Arc<ApiClient>,
    credentials: Arc<CredentialStore>,
}

impl AuthClient {
    pub fn new(api: Arc<ApiClient>, credentials: Arc<CredentialStore>) -> Self {
        Self { api, credentials }
    }

    /// Exchange username/password for an access token and persist it
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let token: TokenResponse = self
            .api
            .post_form_unauthenticated(TOKEN_PATH, &[("username", username), ("password", password)])
            .await?;

        self.credentials
            .store(token.access_token, username.to_string())
            .map_err(AuthError::Storage)?;

        tracing::info!("logged in as {}", username);
        Ok(())
    }

    /// Create a new account
    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let request = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let _created: serde_json::Value = self
            .api
            .post_json_unauthenticated(REGISTER_PATH, &request)
            .await?;

        tracing::info!("registered account {}", username);
        Ok(())
    }

    /// Drop the stored credential
    pub fn logout(&self) {
        self.credentials.invalidate();
    }
}
