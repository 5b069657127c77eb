//! Deterministic capture source for tests and offline demos
//!
//! Produces a synthetic sine take instead of touching the microphone, with
//! scriptable failures so the session state machine can be exercised
//! without hardware.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::capture::{AudioClip, AudioError, CaptureHandle, CaptureSource};
use super::format::{self, CLIP_SAMPLE_RATE};

/// Tone frequency of the synthetic take
const FIXTURE_TONE_HZ: f32 = 440.0;

/// A capture source backed by generated samples
pub struct FixtureCapture {
    duration_seconds: f32,
    fail_open: Option<AudioError>,
    fail_start: Option<AudioError>,
    empty: bool,
    in_use: Arc<AtomicBool>,
}

impl Default for FixtureCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureCapture {
    /// One second of tone
    pub fn new() -> Self {
        Self {
            duration_seconds: 1.0,
            fail_open: None,
            fail_start: None,
            empty: false,
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Change the synthetic take length
    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Make every `open` call fail with the given error
    pub fn failing_open(mut self, err: AudioError) -> Self {
        self.fail_open = Some(err);
        self
    }

    /// Make every `start` call fail with the given error
    pub fn failing_start(mut self, err: AudioError) -> Self {
        self.fail_start = Some(err);
        self
    }

    /// Make `stop` fail with `EmptyCapture`
    pub fn empty(mut self) -> Self {
        self.empty = true;
        self
    }
}

impl CaptureSource for FixtureCapture {
    fn open(&self) -> Result<Box<dyn CaptureHandle>, AudioError> {
        if let Some(err) = &self.fail_open {
            return Err(err.clone());
        }
        if self.in_use.swap(true, Ordering::SeqCst) {
            return Err(AudioError::InvalidState(
                "capture device already in use".to_string(),
            ));
        }
        Ok(Box::new(FixtureHandle {
            duration_seconds: self.duration_seconds,
            fail_start: self.fail_start.clone(),
            empty: self.empty,
            started: false,
            _release: FixtureRelease(self.in_use.clone()),
        }))
    }
}

/// Clears the source's in-use flag when the handle goes away
struct FixtureRelease(Arc<AtomicBool>);

impl Drop for FixtureRelease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct FixtureHandle {
    duration_seconds: f32,
    fail_start: Option<AudioError>,
    empty: bool,
    started: bool,
    _release: FixtureRelease,
}

impl CaptureHandle for FixtureHandle {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.started {
            return Err(AudioError::InvalidState(
                "capture already started".to_string(),
            ));
        }
        if let Some(err) = &self.fail_start {
            return Err(err.clone());
        }
        self.started = true;
        Ok(())
    }

    fn stop(self: Box<Self>) -> Result<AudioClip, AudioError> {
        if !self.started {
            return Err(AudioError::InvalidState(
                "capture never started".to_string(),
            ));
        }
        if self.empty {
            return Err(AudioError::EmptyCapture);
        }

        let total = (CLIP_SAMPLE_RATE as f32 * self.duration_seconds) as usize;
        let samples: Vec<f32> = (0..total)
            .map(|i| (TAU * FIXTURE_TONE_HZ * i as f32 / CLIP_SAMPLE_RATE as f32).sin() * 0.3)
            .collect();

        let (bytes, duration_seconds) = format::package_take(&samples, CLIP_SAMPLE_RATE, 1)?;
        Ok(AudioClip {
            bytes,
            media_type: "audio/wav",
            duration_seconds,
        })
    }

    fn is_capturing(&self) -> bool {
        self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_produces_clip() {
        let source = FixtureCapture::new().with_duration(0.5);
        let mut handle = source.open().unwrap();
        handle.start().unwrap();
        let clip = handle.stop().unwrap();

        assert_eq!(clip.media_type, "audio/wav");
        assert!((clip.duration_seconds - 0.5).abs() < 0.01);
        assert!(!clip.bytes.is_empty());
    }

    #[test]
    fn test_fixture_single_handle() {
        let source = FixtureCapture::new();
        let first = source.open().unwrap();
        assert!(matches!(
            source.open(),
            Err(AudioError::InvalidState(_))
        ));

        // Dropping the first handle releases the device
        drop(first);
        assert!(source.open().is_ok());
    }

    #[test]
    fn test_fixture_double_start() {
        let source = FixtureCapture::new();
        let mut handle = source.open().unwrap();
        handle.start().unwrap();
        assert!(matches!(
            handle.start(),
            Err(AudioError::InvalidState(_))
        ));
    }

    #[test]
    fn test_fixture_stop_without_start() {
        let source = FixtureCapture::new();
        let handle = source.open().unwrap();
        assert!(matches!(
            handle.stop(),
            Err(AudioError::InvalidState(_))
        ));
        // Device must be released despite the error
        assert!(source.open().is_ok());
    }

    #[test]
    fn test_fixture_empty_capture() {
        let source = FixtureCapture::new().empty();
        let mut handle = source.open().unwrap();
        handle.start().unwrap();
        assert!(matches!(handle.stop(), Err(AudioError::EmptyCapture)));
        assert!(source.open().is_ok());
    }

    #[test]
    fn test_fixture_scripted_open_failure() {
        let source = FixtureCapture::new()
            .failing_open(AudioError::PermissionDenied("denied".to_string()));
        assert!(matches!(
            source.open(),
            Err(AudioError::PermissionDenied(_))
        ));
    }
}
