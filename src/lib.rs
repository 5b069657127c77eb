//! EchoNative client core
//!
//! Records a short utterance, submits it to the correction/translation/
//! dubbing backend, and exposes the result through mode-specific
//! contracts. The session state machine in [`session`] coordinates the
//! microphone, the one-shot network exchange, and the result contracts;
//! everything else supports it.

pub mod api;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod profile;
pub mod result;
pub mod router;
pub mod session;

pub use api::{ApiClient, ApiError, AuthClient, AuthError};
pub use audio::{AudioClip, AudioError, CaptureHandle, CaptureSource, MicrophoneCapture};
pub use catalog::{ClipCatalogClient, SelectedClip};
pub use credentials::CredentialStore;
pub use profile::{ProfileClient, UserProfile};
pub use result::{DiffKind, DiffOp, MagicClipResult, ModeResult, PanicResult, PracticeResult};
pub use router::{Mode, ModeRouter, SubmissionContext, Submitter};
pub use session::{SessionController, SessionError, SessionSnapshot, SessionStatus};
