//! Microphone capture with scoped device ownership
//!
//! The microphone is an exclusive OS resource, so acquisition and release
//! form a strict pair: `CaptureSource::open` returns a handle that owns
//! the device, and every exit path — stop, error, or drop — releases it.
//! The cpal stream lives on a dedicated capture thread; the real-time
//! callback writes into a lock-free ring and the thread drains it into the
//! accumulating take. A single in-memory WAV clip is packaged at stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::Sender;

use super::device;
use super::format;
use super::ring_buffer::SampleRing;

/// How long `start` waits for the capture thread to bring the stream up
const STREAM_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioError {
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("no capture device available: {0}")]
    DeviceUnavailable(String),

    #[error("capture produced no audio")]
    EmptyCapture,

    #[error("invalid capture state: {0}")]
    InvalidState(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// A single encoded utterance, ready for submission
///
/// Owned exclusively by the capture layer until handed to the router,
/// which consumes it when building the request payload.
#[derive(Debug)]
pub struct AudioClip {
    /// Encoded WAV bytes
    pub bytes: Vec<u8>,
    /// Declared media type of `bytes`
    pub media_type: &'static str,
    /// Clip length in seconds
    pub duration_seconds: f64,
}

/// Something that can hand out exclusive capture handles
pub trait CaptureSource: Send + Sync {
    /// Acquire the capture device
    ///
    /// Fails with `PermissionDenied` or `DeviceUnavailable` when the
    /// device cannot be acquired, and `InvalidState` when a handle is
    /// already open.
    fn open(&self) -> Result<Box<dyn CaptureHandle>, AudioError>;
}

/// An open capture session bound to the device
///
/// Dropping the handle releases the device and discards any buffered
/// audio.
pub trait CaptureHandle: Send {
    /// Begin buffering audio frames
    fn start(&mut self) -> Result<(), AudioError>;

    /// Finalise the capture and package the clip
    ///
    /// Consumes the handle; the device is released whether packaging
    /// succeeds or fails. Fails with `EmptyCapture` when no audio was
    /// buffered.
    fn stop(self: Box<Self>) -> Result<AudioClip, AudioError>;

    /// Whether frames are currently being buffered
    fn is_capturing(&self) -> bool;
}

/// Process-wide microphone-in-use flag
static DEVICE_IN_USE: AtomicBool = AtomicBool::new(false);

/// RAII claim on the process-wide device flag
///
/// Held by the open handle; dropping it on any path releases the claim.
struct DeviceClaim;

impl DeviceClaim {
    fn acquire() -> Result<Self, AudioError> {
        if DEVICE_IN_USE.swap(true, Ordering::SeqCst) {
            return Err(AudioError::InvalidState(
                "capture device already in use".to_string(),
            ));
        }
        Ok(Self)
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        DEVICE_IN_USE.store(false, Ordering::SeqCst);
    }
}

/// The cpal-backed capture source
pub struct MicrophoneCapture {
    device_id: Option<String>,
}

impl MicrophoneCapture {
    /// Create a source bound to a configured device id, or the system
    /// default when `None`
    pub fn new(device_id: Option<String>) -> Self {
        Self { device_id }
    }
}

impl CaptureSource for MicrophoneCapture {
    fn open(&self) -> Result<Box<dyn CaptureHandle>, AudioError> {
        let claim = DeviceClaim::acquire()?;

        // Resolve now so open fails fast; the capture thread re-resolves
        // when the stream is built.
        let device = device::resolve_input_device(self.device_id.as_deref()).ok_or_else(|| {
            AudioError::DeviceUnavailable("no input device available".to_string())
        })?;
        tracing::info!(
            "capture device acquired: {}",
            device::device_display_name(&device)
        );

        Ok(Box::new(MicrophoneHandle {
            device_id: self.device_id.clone(),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            _claim: claim,
        }))
    }
}

/// Raw take handed back by the capture thread
struct CaptureOutcome {
    samples: Vec<f32>,
    source_rate: u32,
    channels: usize,
}

/// Open cpal capture session
struct MicrophoneHandle {
    device_id: Option<String>,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<Result<CaptureOutcome, AudioError>>>,
    _claim: DeviceClaim,
}

impl CaptureHandle for MicrophoneHandle {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.worker.is_some() {
            return Err(AudioError::InvalidState(
                "capture already started".to_string(),
            ));
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let stop = self.stop.clone();
        let device_id = self.device_id.clone();
        let worker = thread::spawn(move || capture_loop(device_id, stop, ready_tx));

        match ready_rx.recv_timeout(STREAM_STARTUP_TIMEOUT) {
            Ok(Ok(())) => {
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                self.stop.store(true, Ordering::SeqCst);
                let _ = worker.join();
                Err(AudioError::Stream(
                    "capture thread did not start in time".to_string(),
                ))
            }
        }
    }

    fn stop(self: Box<Self>) -> Result<AudioClip, AudioError> {
        // _claim drops when this function returns, releasing the device on
        // success and on every error path.
        let mut this = *self;
        let worker = this
            .worker
            .take()
            .ok_or_else(|| AudioError::InvalidState("capture never started".to_string()))?;

        this.stop.store(true, Ordering::SeqCst);
        let outcome = worker
            .join()
            .map_err(|_| AudioError::Stream("capture thread panicked".to_string()))??;

        if outcome.samples.is_empty() {
            return Err(AudioError::EmptyCapture);
        }

        let (bytes, duration_seconds) =
            format::package_take(&outcome.samples, outcome.source_rate, outcome.channels)?;
        tracing::info!(
            "clip packaged: {:.2}s, {} bytes ({}Hz/{}ch source)",
            duration_seconds,
            bytes.len(),
            outcome.source_rate,
            outcome.channels
        );

        Ok(AudioClip {
            bytes,
            media_type: "audio/wav",
            duration_seconds,
        })
    }

    fn is_capturing(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for MicrophoneHandle {
    fn drop(&mut self) {
        // Abandoned handle (cancel path): stop the capture thread so the
        // stream is torn down; the buffered take is discarded with it.
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            tracing::debug!("capture discarded without packaging");
        }
    }
}

/// Map cpal stream-construction failures onto the capture taxonomy
///
/// OS-level capture denial surfaces as a backend-specific error.
fn map_build_error(err: cpal::BuildStreamError) -> AudioError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            AudioError::DeviceUnavailable("input device disappeared".to_string())
        }
        cpal::BuildStreamError::BackendSpecific { err } => {
            AudioError::PermissionDenied(err.to_string())
        }
        other => AudioError::Stream(other.to_string()),
    }
}

/// Body of the capture thread: owns the cpal stream for its whole life
fn capture_loop(
    device_id: Option<String>,
    stop: Arc<AtomicBool>,
    ready_tx: Sender<Result<(), AudioError>>,
) -> Result<CaptureOutcome, AudioError> {
    let device = match device::resolve_input_device(device_id.as_deref()) {
        Some(device) => device,
        None => {
            let err = AudioError::DeviceUnavailable("no input device available".to_string());
            let _ = ready_tx.send(Err(err.clone()));
            return Err(err);
        }
    };

    let config = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let err = AudioError::DeviceUnavailable(e.to_string());
            let _ = ready_tx.send(Err(err.clone()));
            return Err(err);
        }
    };
    let source_rate = config.sample_rate();
    let channels = config.channels() as usize;

    let ring = Arc::new(SampleRing::for_stream(source_rate, channels, 2.0));
    let callback_ring = ring.clone();
    let (err_tx, err_rx) = crossbeam_channel::bounded::<String>(4);

    let stream = match device.build_input_stream(
        &config.into(),
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let accepted = callback_ring.push(data);
            if accepted < data.len() {
                tracing::warn!("capture overflow: dropped {} samples", data.len() - accepted);
            }
        },
        move |err| {
            let _ = err_tx.try_send(err.to_string());
        },
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let err = map_build_error(e);
            let _ = ready_tx.send(Err(err.clone()));
            return Err(err);
        }
    };

    if let Err(e) = stream.play() {
        let err = AudioError::Stream(e.to_string());
        let _ = ready_tx.send(Err(err.clone()));
        return Err(err);
    }
    let _ = ready_tx.send(Ok(()));
    tracing::debug!("capture stream running: {}Hz, {}ch", source_rate, channels);

    let mut take = Vec::new();
    while !stop.load(Ordering::SeqCst) {
        if let Ok(message) = err_rx.try_recv() {
            drop(stream);
            return Err(AudioError::Stream(message));
        }
        if ring.drain_into(&mut take) == 0 {
            thread::sleep(Duration::from_millis(10));
        }
    }

    // Tear the stream down first so no more frames arrive, then drain the
    // tail that accumulated since the last pass.
    drop(stream);
    ring.drain_into(&mut take);

    Ok(CaptureOutcome {
        samples: take,
        source_rate,
        channels,
    })
}
