//! Session state machine
//!
//! Governs the lifecycle `Idle → Recording → Processing →
//! Succeeded|Failed → Idle` for a single client session. At most one
//! recording and one in-flight submission exist at a time; every
//! transition is guarded by the current state under one lock, and the
//! only suspension point (the network exchange) runs outside it, raced
//! against a cancellation token. A generation counter keeps a cancelled
//! or superseded submission from ever writing its result back.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::client::ApiError;
use crate::audio::{AudioError, CaptureHandle, CaptureSource};
use crate::catalog::SelectedClip;
use crate::profile::ProfileClient;
use crate::result::ModeResult;
use crate::router::{Mode, SubmissionContext, Submitter};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Ready to record
    #[default]
    Idle,
    /// Microphone open, frames buffering
    Recording,
    /// Clip submitted, waiting on the backend
    Processing,
    /// Result stored and ready to render
    Succeeded,
    /// Submission failed; error retained for display
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Recording => "recording",
            SessionStatus::Processing => "processing",
            SessionStatus::Succeeded => "succeeded",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{operation} not allowed while {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("a clip must be selected before recording in magic clip mode")]
    PreconditionFailed,

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("submission cancelled before completion")]
    Cancelled,
}

/// Read-only view of the session for display
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub mode: Mode,
    pub active_clip: Option<SelectedClip>,
    pub last_result: Option<ModeResult>,
    pub last_error: Option<String>,
}

/// Mutable session state, guarded by one lock
struct SessionState {
    status: SessionStatus,
    mode: Mode,
    active_clip: Option<SelectedClip>,
    context_text: String,
    last_result: Option<ModeResult>,
    last_error: Option<String>,
    capture: Option<Box<dyn CaptureHandle>>,
    cancel: Option<CancellationToken>,
    /// Bumped whenever an in-flight submission is superseded
    generation: u64,
}

/// The client-side state machine for one recording/result cycle
pub struct SessionController {
    actor_id: String,
    source: Box<dyn CaptureSource>,
    submitter: Arc<dyn Submitter>,
    profile: Option<Arc<ProfileClient>>,
    state: Mutex<SessionState>,
}

impl SessionController {
    /// Build a session in `Practice` mode
    pub fn new(
        actor_id: impl Into<String>,
        source: Box<dyn CaptureSource>,
        submitter: Arc<dyn Submitter>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            source,
            submitter,
            profile: None,
            state: Mutex::new(SessionState {
                status: SessionStatus::Idle,
                mode: Mode::Practice,
                active_clip: None,
                context_text: String::new(),
                last_result: None,
                last_error: None,
                capture: None,
                cancel: None,
                generation: 0,
            }),
        }
    }

    /// Attach the profile client refreshed after practice/panic successes
    pub fn with_profile(mut self, profile: Arc<ProfileClient>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Current state for display
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            status: state.status,
            mode: state.mode,
            active_clip: state.active_clip.clone(),
            last_result: state.last_result.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Current lifecycle state
    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    /// Current interaction mode
    pub fn mode(&self) -> Mode {
        self.state.lock().mode
    }

    /// Set the free-form context passed with correction submissions
    pub fn set_context_text(&self, text: impl Into<String>) {
        self.state.lock().context_text = text.into();
    }

    /// Select the clip template used by magic-clip submissions
    pub fn select_clip(&self, clip: SelectedClip) {
        tracing::info!("clip selected: {} ({})", clip.title, clip.id);
        self.state.lock().active_clip = Some(clip);
    }

    /// Open the microphone and start buffering
    ///
    /// Accepted only from `Idle`. In magic-clip mode a selected clip is
    /// required before any device or network work happens.
    pub fn begin_recording(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if state.status != SessionStatus::Idle {
            return Err(SessionError::InvalidState {
                operation: "begin_recording",
                status: state.status,
            });
        }
        if state.mode == Mode::MagicClip && state.active_clip.is_none() {
            return Err(SessionError::PreconditionFailed);
        }

        let mut handle = match self.source.open() {
            Ok(handle) => handle,
            Err(err) => {
                state.last_error = Some(err.to_string());
                return Err(err.into());
            }
        };
        if let Err(err) = handle.start() {
            // Dropping the handle releases the device
            state.last_error = Some(err.to_string());
            return Err(err.into());
        }

        state.capture = Some(handle);
        state.status = SessionStatus::Recording;
        state.last_result = None;
        state.last_error = None;
        tracing::info!("recording started in {} mode", state.mode);
        Ok(())
    }

    /// Stop the capture, submit the clip, and wait for the result
    ///
    /// Accepted only from `Recording`; a second call while `Processing`
    /// fails with `InvalidState` and causes no side effect. Capture-stop
    /// failures return the machine to `Idle`; submission failures leave
    /// it `Failed` with the error retained.
    pub async fn end_recording(&self) -> Result<ModeResult, SessionError> {
        let submission_id = Uuid::new_v4();
        let (handle, mode, context, token, generation) = {
            let mut state = self.state.lock();
            if state.status != SessionStatus::Recording {
                return Err(SessionError::InvalidState {
                    operation: "end_recording",
                    status: state.status,
                });
            }
            let handle = state.capture.take().ok_or(SessionError::InvalidState {
                operation: "end_recording",
                status: state.status,
            })?;

            state.status = SessionStatus::Processing;
            let token = CancellationToken::new();
            state.cancel = Some(token.clone());
            state.generation += 1;

            let context = SubmissionContext {
                actor_id: self.actor_id.clone(),
                context_text: state.context_text.clone(),
                selected_clip: state.active_clip.clone(),
            };
            (handle, state.mode, context, token, state.generation)
        };

        // Finalise the capture outside the lock; stop joins the capture
        // thread.
        let clip = match handle.stop() {
            Ok(clip) => clip,
            Err(err) => {
                tracing::warn!("capture stop failed: {}", err);
                let mut state = self.state.lock();
                if state.generation == generation {
                    state.status = SessionStatus::Idle;
                    state.cancel = None;
                    state.last_error = Some(err.to_string());
                }
                return Err(err.into());
            }
        };

        tracing::info!(
            "submission {} dispatched ({} mode, {:.2}s clip)",
            submission_id,
            mode,
            clip.duration_seconds
        );

        let outcome = tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("submission {} cancelled; result discarded", submission_id);
                return Err(SessionError::Cancelled);
            }
            outcome = self.submitter.submit(mode, clip, &context) => outcome,
        };

        let mut state = self.state.lock();
        if state.generation != generation {
            // Superseded by a mode switch or reset while the response was
            // in flight.
            tracing::info!("submission {} superseded; result discarded", submission_id);
            return Err(SessionError::Cancelled);
        }
        state.cancel = None;

        match outcome {
            Ok(result) => {
                state.status = SessionStatus::Succeeded;
                state.last_result = Some(result.clone());
                state.last_error = None;
                drop(state);
                tracing::info!("submission {} succeeded", submission_id);
                if matches!(mode, Mode::Practice | Mode::Panic) {
                    self.spawn_profile_refresh();
                }
                Ok(result)
            }
            Err(err) => {
                state.status = SessionStatus::Failed;
                state.last_error = Some(err.to_string());
                tracing::warn!("submission {} failed: {}", submission_id, err);
                Err(err.into())
            }
        }
    }

    /// Switch the interaction mode
    ///
    /// Always returns the machine to `Idle` and clears the last result.
    /// A recording in progress is discarded (device released); an
    /// in-flight submission is cancelled and its eventual result dropped.
    pub fn switch_mode(&self, mode: Mode) {
        let mut state = self.state.lock();
        Self::cancel_in_flight(&mut state);
        if state.mode != mode {
            tracing::info!("mode switched: {} -> {}", state.mode, mode);
        }
        state.mode = mode;
        state.status = SessionStatus::Idle;
        state.last_result = None;
        state.last_error = None;
    }

    /// Return to `Idle`, discarding any recording or in-flight submission
    pub fn reset(&self) {
        let mut state = self.state.lock();
        Self::cancel_in_flight(&mut state);
        state.status = SessionStatus::Idle;
        state.last_result = None;
        state.last_error = None;
        tracing::debug!("session reset to idle");
    }

    /// Discard the capture handle and/or cancel the pending submission
    fn cancel_in_flight(state: &mut SessionState) {
        if let Some(handle) = state.capture.take() {
            drop(handle);
            tracing::info!("recording discarded");
        }
        if let Some(token) = state.cancel.take() {
            token.cancel();
            state.generation += 1;
            tracing::info!("in-flight submission cancelled");
        }
    }

    /// Detached profile refresh after a successful practice/panic
    /// submission; failure is logged and never demotes the result.
    fn spawn_profile_refresh(&self) {
        let Some(profile) = self.profile.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(err) = profile.refresh().await {
                tracing::warn!("profile refresh failed after submission: {}", err);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioClip, FixtureCapture};
    use crate::result::{MagicClipResult, PanicResult};
    use async_trait::async_trait;

    /// Submitter that returns a canned panic result
    struct CannedSubmitter;

    #[async_trait]
    impl Submitter for CannedSubmitter {
        async fn submit(
            &self,
            _mode: Mode,
            _clip: AudioClip,
            _context: &SubmissionContext,
        ) -> Result<ModeResult, ApiError> {
            Ok(ModeResult::Panic(PanicResult {
                original_text: "hoi".to_string(),
                translated_text: "hi".to_string(),
                audio_url: None,
            }))
        }
    }

    /// Submitter that always fails with an upstream error
    struct FailingSubmitter;

    #[async_trait]
    impl Submitter for FailingSubmitter {
        async fn submit(
            &self,
            _mode: Mode,
            _clip: AudioClip,
            _context: &SubmissionContext,
        ) -> Result<ModeResult, ApiError> {
            Err(ApiError::Upstream {
                status: 500,
                detail: "engine exploded".to_string(),
            })
        }
    }

    fn sample_clip_ref() -> SelectedClip {
        SelectedClip {
            id: "clip-1".to_string(),
            title: "The Godfather".to_string(),
            quote: "An offer he can't refuse.".to_string(),
            filename: "godfather.mp4".to_string(),
        }
    }

    fn controller(submitter: Arc<dyn Submitter>) -> SessionController {
        SessionController::new(
            "demo-user",
            Box::new(FixtureCapture::new().with_duration(0.2)),
            submitter,
        )
    }

    #[tokio::test]
    async fn test_happy_path() {
        let session = controller(Arc::new(CannedSubmitter));
        assert_eq!(session.status(), SessionStatus::Idle);

        session.switch_mode(Mode::Panic);
        session.begin_recording().unwrap();
        assert_eq!(session.status(), SessionStatus::Recording);

        let result = session.end_recording().await.unwrap();
        assert_eq!(session.status(), SessionStatus::Succeeded);
        assert!(matches!(result, ModeResult::Panic(_)));
        assert!(session.snapshot().last_result.is_some());

        session.reset();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.snapshot().last_result.is_none());
    }

    #[tokio::test]
    async fn test_begin_recording_only_from_idle() {
        let session = controller(Arc::new(CannedSubmitter));
        session.begin_recording().unwrap();

        let second = session.begin_recording();
        assert!(matches!(
            second,
            Err(SessionError::InvalidState { status: SessionStatus::Recording, .. })
        ));

        session.end_recording().await.unwrap();
        let third = session.begin_recording();
        assert!(matches!(
            third,
            Err(SessionError::InvalidState { status: SessionStatus::Succeeded, .. })
        ));
    }

    #[tokio::test]
    async fn test_end_recording_requires_recording() {
        let session = controller(Arc::new(CannedSubmitter));
        let result = session.end_recording().await;
        assert!(matches!(
            result,
            Err(SessionError::InvalidState { status: SessionStatus::Idle, .. })
        ));
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_magic_clip_requires_selected_clip() {
        let session = controller(Arc::new(CannedSubmitter));
        session.switch_mode(Mode::MagicClip);

        let refused = session.begin_recording();
        assert!(matches!(refused, Err(SessionError::PreconditionFailed)));
        assert_eq!(session.status(), SessionStatus::Idle);

        session.select_clip(sample_clip_ref());
        session.begin_recording().unwrap();
        assert_eq!(session.status(), SessionStatus::Recording);
    }

    #[tokio::test]
    async fn test_failed_submission_retains_error() {
        let session = controller(Arc::new(FailingSubmitter));
        session.begin_recording().unwrap();

        let result = session.end_recording().await;
        assert!(matches!(result, Err(SessionError::Api(_))));
        assert_eq!(session.status(), SessionStatus::Failed);

        let snapshot = session.snapshot();
        assert!(snapshot.last_result.is_none());
        assert!(snapshot.last_error.unwrap().contains("engine exploded"));
    }

    #[tokio::test]
    async fn test_empty_capture_returns_to_idle() {
        let session = SessionController::new(
            "demo-user",
            Box::new(FixtureCapture::new().empty()),
            Arc::new(CannedSubmitter),
        );
        session.begin_recording().unwrap();

        let result = session.end_recording().await;
        assert!(matches!(
            result,
            Err(SessionError::Audio(AudioError::EmptyCapture))
        ));
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_idle() {
        let session = SessionController::new(
            "demo-user",
            Box::new(
                FixtureCapture::new()
                    .failing_open(AudioError::PermissionDenied("denied".to_string())),
            ),
            Arc::new(CannedSubmitter),
        );

        let result = session.begin_recording();
        assert!(matches!(
            result,
            Err(SessionError::Audio(AudioError::PermissionDenied(_)))
        ));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.snapshot().last_error.is_some());
    }

    #[tokio::test]
    async fn test_switch_mode_clears_result() {
        let session = controller(Arc::new(CannedSubmitter));
        session.switch_mode(Mode::Panic);
        session.begin_recording().unwrap();
        session.end_recording().await.unwrap();
        assert!(session.snapshot().last_result.is_some());

        session.switch_mode(Mode::Practice);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert_eq!(snapshot.mode, Mode::Practice);
        assert!(snapshot.last_result.is_none());
    }

    #[tokio::test]
    async fn test_switch_mode_during_recording_discards_capture() {
        let session = controller(Arc::new(CannedSubmitter));
        session.begin_recording().unwrap();

        session.switch_mode(Mode::Panic);
        assert_eq!(session.status(), SessionStatus::Idle);

        // The device was released, so a new recording can start
        session.begin_recording().unwrap();
        assert_eq!(session.status(), SessionStatus::Recording);
    }

    #[tokio::test]
    async fn test_magic_clip_result_is_binary() {
        struct DubSubmitter;

        #[async_trait]
        impl Submitter for DubSubmitter {
            async fn submit(
                &self,
                _mode: Mode,
                _clip: AudioClip,
                _context: &SubmissionContext,
            ) -> Result<ModeResult, ApiError> {
                Ok(ModeResult::MagicClip(MagicClipResult {
                    video_url: "/static/outputs/magic_1.mp4".to_string(),
                }))
            }
        }

        let session = controller(Arc::new(DubSubmitter));
        session.switch_mode(Mode::MagicClip);
        session.select_clip(sample_clip_ref());
        session.begin_recording().unwrap();

        let result = session.end_recording().await.unwrap();
        match result {
            ModeResult::MagicClip(clip) => assert!(clip.is_ready()),
            other => panic!("expected magic clip result, got {:?}", other),
        }
    }
}
