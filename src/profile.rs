//! User progress counters
//!
//! The backend owns the profile; the client keeps a read-only cached copy
//! and refreshes it after successful practice/panic submissions. The
//! refresh is fire-and-forget — its failure never touches session state.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::api::client::{ApiClient, ApiError};
use crate::api::types::ProfileResponse;

/// Path of the profile endpoint
const PROFILE_PATH: &str = "/api/users/me";

/// Read-only copy of the user's progress counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub streak_count: u32,
    pub daily_process_count: u32,
}

impl From<ProfileResponse> for UserProfile {
    fn from(wire: ProfileResponse) -> Self {
        Self {
            username: wire.username,
            streak_count: wire.streak_count,
            daily_process_count: wire.daily_process_count,
        }
    }
}

/// Client for the profile endpoint with a cached copy
pub struct ProfileClient {
    api: Arc<ApiClient>,
    cached: RwLock<Option<UserProfile>>,
}

impl ProfileClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            cached: RwLock::new(None),
        }
    }

    /// Fetch the profile and update the cached copy
    pub async fn fetch(&self) -> Result<UserProfile, ApiError> {
        let profile: UserProfile = self
            .api
            .get_json::<ProfileResponse>(PROFILE_PATH)
            .await?
            .into();
        *self.cached.write() = Some(profile.clone());
        Ok(profile)
    }

    /// Refresh the cached copy, logging the new counters
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let profile = self.fetch().await?;
        tracing::info!(
            "profile refreshed: streak={}, today={}",
            profile.streak_count,
            profile.daily_process_count
        );
        Ok(())
    }

    /// The last fetched profile, if any
    pub fn cached(&self) -> Option<UserProfile> {
        self.cached.read().clone()
    }
}
