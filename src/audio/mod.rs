//! Audio sources for the translation pipelines.

pub mod source;
pub mod wav;

pub use source::{AudioSource, FramePhase, MockAudioSource};
pub use wav::WavAudioSource;
