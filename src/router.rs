//! Mode-dispatch protocol
//!
//! Maps the active interaction mode to a request shape and target
//! endpoint. Routing is a pure lookup keyed by mode: practice and panic
//! share the correction endpoint under different wire tags, magic clip
//! goes to the dubbing endpoint. The clip buffer is consumed when the
//! payload is built and dropped with it once the request is dispatched.
//! Submissions are at-most-once — a failed one requires a fresh
//! user-initiated recording.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::api::client::{ApiClient, ApiError};
use crate::api::types::{
    DubRequest, DubResponse, ProcessRequest, ProcessResponse, WireDiffItem,
};
use crate::audio::AudioClip;
use crate::catalog::SelectedClip;
use crate::result::{
    sanitize_pitch, DiffKind, DiffOp, MagicClipResult, ModeResult, PanicResult, PitchPoint,
    PracticeResult,
};

/// Path of the correction endpoint
const PROCESS_PATH: &str = "/api/process";

/// Path of the clip-dubbing endpoint
const DUB_PATH: &str = "/api/clips/dub";

/// The active interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Pronunciation correction with diff and echo audio
    Practice,
    /// Speech translation
    Panic,
    /// Dub-over-video generation
    MagicClip,
}

impl Mode {
    /// The wire tag the correction endpoint expects
    ///
    /// Magic clip has no tag; it uses a different endpoint entirely.
    pub fn wire_tag(&self) -> Option<&'static str> {
        match self {
            Mode::Practice => Some("shadowing"),
            Mode::Panic => Some("panic"),
            Mode::MagicClip => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Practice => write!(f, "practice"),
            Mode::Panic => write!(f, "panic"),
            Mode::MagicClip => write!(f, "magic clip"),
        }
    }
}

/// Everything a submission needs besides the clip itself
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    /// Who is submitting
    pub actor_id: String,
    /// Free-form context for the correction model
    pub context_text: String,
    /// The selected template, required in magic-clip mode
    pub selected_clip: Option<SelectedClip>,
}

/// The submission seam between the session machine and the backend
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Package and dispatch one clip, returning the mode-shaped result
    async fn submit(
        &self,
        mode: Mode,
        clip: AudioClip,
        context: &SubmissionContext,
    ) -> Result<ModeResult, ApiError>;
}

/// The real router over the backend endpoints
pub struct ModeRouter {
    api: Arc<ApiClient>,
}

impl ModeRouter {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Submitter for ModeRouter {
    async fn submit(
        &self,
        mode: Mode,
        clip: AudioClip,
        context: &SubmissionContext,
    ) -> Result<ModeResult, ApiError> {
        // The clip is consumed here; once the payload exists the raw
        // buffer is gone regardless of how the request ends.
        let encoded = BASE64.encode(clip.bytes);
        tracing::info!(
            "submitting {:.2}s clip in {} mode ({} base64 chars)",
            clip.duration_seconds,
            mode,
            encoded.len()
        );

        match mode {
            Mode::Practice | Mode::Panic => {
                let tag = mode.wire_tag().unwrap_or_default();
                let request = ProcessRequest {
                    user_id: context.actor_id.clone(),
                    audio_data: encoded,
                    mode: tag.to_string(),
                    context_text: context.context_text.clone(),
                };
                let response: ProcessResponse = self.api.post_json(PROCESS_PATH, &request).await?;
                destructure_correction(mode, response)
            }
            Mode::MagicClip => {
                let selected = context.selected_clip.as_ref().ok_or_else(|| {
                    ApiError::InvalidRequest(
                        "magic clip submission without a selected clip".to_string(),
                    )
                })?;
                let request = DubRequest {
                    audio_data: encoded,
                    clip_filename: selected.filename.clone(),
                    clip_text: selected.quote.clone(),
                };
                let response: DubResponse = self.api.post_json(DUB_PATH, &request).await?;
                Ok(ModeResult::MagicClip(MagicClipResult {
                    video_url: response.video_url,
                }))
            }
        }
    }
}

/// Split a correction response into the practice or panic variant
fn destructure_correction(mode: Mode, response: ProcessResponse) -> Result<ModeResult, ApiError> {
    match mode {
        Mode::Practice => {
            let diff = response
                .diff
                .into_iter()
                .map(diff_op_from_wire)
                .collect::<Result<Vec<_>, _>>()?;
            let pitch = sanitize_pitch(
                response
                    .pitch_data
                    .into_iter()
                    .map(|p| PitchPoint {
                        time: p.t,
                        frequency: p.f,
                    })
                    .collect(),
            );
            Ok(ModeResult::Practice(PracticeResult {
                original_text: response.original_text,
                corrected_text: response.corrected_text,
                diff,
                audio_url: response.audio_url,
                pitch,
            }))
        }
        Mode::Panic => Ok(ModeResult::Panic(PanicResult {
            original_text: response.original_text,
            translated_text: response.corrected_text,
            audio_url: response.audio_url,
        })),
        Mode::MagicClip => Err(ApiError::InvalidRequest(
            "magic clip does not use the correction endpoint".to_string(),
        )),
    }
}

/// Parse one wire diff entry
fn diff_op_from_wire(item: WireDiffItem) -> Result<DiffOp, ApiError> {
    let kind = match item.kind.as_str() {
        "equal" => DiffKind::Equal,
        "insert" => DiffKind::Insert,
        "delete" => DiffKind::Delete,
        "replace" => DiffKind::Replace,
        other => {
            return Err(ApiError::Parse(format!("unknown diff op type '{}'", other)));
        }
    };
    Ok(DiffOp {
        kind,
        old_text: item.old,
        new_text: item.new,
    })
}
