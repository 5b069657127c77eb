//! Audio subsystem
//!
//! Device enumeration, exclusive microphone capture, and clip packaging.
//! The microphone implementation keeps the cpal stream on a dedicated
//! thread; `fixture` provides a hardware-free source for tests.

pub mod capture;
pub mod device;
pub mod fixture;
pub mod format;
pub mod ring_buffer;

pub use capture::{AudioClip, AudioError, CaptureHandle, CaptureSource, MicrophoneCapture};
pub use device::{device_display_name, list_input_devices, resolve_input_device, AudioDevice};
pub use fixture::FixtureCapture;
pub use format::CLIP_SAMPLE_RATE;
pub use ring_buffer::SampleRing;
