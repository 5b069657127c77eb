//! Wire types for the backend endpoints
//!
//! Field names follow the backend's snake_case JSON. Response shapes are
//! kept separate from the domain result types; the router owns the
//! mapping between the two.

use serde::{Deserialize, Serialize};

/// `POST /api/process` request body
#[derive(Debug, Serialize)]
pub struct ProcessRequest {
    pub user_id: String,
    /// Base64-encoded WAV clip
    pub audio_data: String,
    /// `"shadowing"` or `"panic"`
    pub mode: String,
    pub context_text: String,
}

/// One diff entry as the backend sends it
#[derive(Debug, Clone, Deserialize)]
pub struct WireDiffItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub old: Option<String>,
    #[serde(default)]
    pub new: Option<String>,
}

/// One pitch sample as the backend sends it
#[derive(Debug, Clone, Deserialize)]
pub struct WirePitchPoint {
    #[serde(default)]
    pub t: f64,
    pub f: f64,
}

/// `POST /api/process` response body
#[derive(Debug, Deserialize)]
pub struct ProcessResponse {
    pub original_text: String,
    pub corrected_text: String,
    #[serde(default)]
    pub diff: Vec<WireDiffItem>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub pitch_data: Vec<WirePitchPoint>,
}

/// `POST /api/clips/dub` request body
#[derive(Debug, Serialize)]
pub struct DubRequest {
    /// Base64-encoded WAV clip
    pub audio_data: String,
    pub clip_filename: String,
    pub clip_text: String,
}

/// `POST /api/clips/dub` response body
#[derive(Debug, Deserialize)]
pub struct DubResponse {
    pub video_url: String,
}

/// One entry from `GET /api/clips`
#[derive(Debug, Clone, Deserialize)]
pub struct WireClip {
    pub id: String,
    pub title: String,
    pub quote: String,
    pub filename: String,
}

/// `GET /api/users/me` response body
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
    pub streak_count: u32,
    pub daily_process_count: u32,
}

/// `POST /api/auth/token` response body
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

/// `POST /api/auth/register` request body
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}
