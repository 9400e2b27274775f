#[cfg(feature = "mic")]
pub mod capture;
pub mod clip;
pub mod listener;

#[cfg(feature = "mic")]
pub use capture::MicCapture;
pub use listener::{sample_ring, AudioListener, DEFAULT_AUDIO_DEVICE};
