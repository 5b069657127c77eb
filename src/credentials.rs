//! Credential persistence
//!
//! One opaque bearer token (and the username it was issued to) persisted
//! as JSON under `~/.echonative/credentials.json`. The store is an
//! explicit, injected provider: the HTTP client reads the current token
//! through it, and expiry is an explicit `invalidate` call rather than a
//! side effect scattered across call sites.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted credential record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Opaque bearer token
    pub token: String,
    /// Username the token was issued to
    pub username: String,
    /// When the token was stored
    pub saved_at: DateTime<Utc>,
}

/// Injected credential provider with disk persistence
pub struct CredentialStore {
    path: PathBuf,
    cached: RwLock<Option<StoredCredential>>,
}

/// Default credential file path (~/.echonative/credentials.json)
fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".echonative")
        .join("credentials.json")
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    /// Open the store at the default path, loading any persisted token
    pub fn new() -> Self {
        Self::at_path(default_credentials_path())
    }

    /// Open the store at an explicit path (tests use a temp dir)
    pub fn at_path(path: PathBuf) -> Self {
        let cached = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(credential) => Some(credential),
                    Err(e) => {
                        tracing::warn!("credential file unreadable, ignoring: {}", e);
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!("failed to read credential file: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Self {
            path,
            cached: RwLock::new(cached),
        }
    }

    /// The current bearer token, if logged in
    pub fn current(&self) -> Option<String> {
        self.cached.read().as_ref().map(|c| c.token.clone())
    }

    /// The username the current token belongs to
    pub fn username(&self) -> Option<String> {
        self.cached.read().as_ref().map(|c| c.username.clone())
    }

    /// Persist a freshly issued token
    pub fn store(&self, token: String, username: String) -> Result<(), String> {
        let credential = StoredCredential {
            token,
            username,
            saved_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create credential directory: {}", e))?;
        }
        let content = serde_json::to_string_pretty(&credential)
            .map_err(|e| format!("Failed to serialise credential: {}", e))?;
        fs::write(&self.path, content)
            .map_err(|e| format!("Failed to write credential file: {}", e))?;

        tracing::info!("credential stored for {}", credential.username);
        *self.cached.write() = Some(credential);
        Ok(())
    }

    /// Clear the credential from memory and disk
    ///
    /// The single explicit expiry event: called on logout and after the
    /// backend rejects the token.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!("failed to remove credential file: {}", e);
            }
        }
        tracing::info!("credential invalidated");
    }
}
