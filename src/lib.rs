//! duotalk - Real-time bidirectional speech translation for voice chat.
//!
//! Segments two live audio streams (game loopback and microphone) into
//! utterances, transcribes and translates them in opposite directions,
//! and emits final and preview text to an overlay sink.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod classify;
pub mod config;
pub mod defaults;
pub mod error;
pub mod glossary;
pub mod pipeline;
pub mod segment;
pub mod stt;
pub mod translate;

// Core traits (source → process → sink)
pub use audio::source::AudioSource;
pub use pipeline::sink::{CollectorSink, LogSink, TranslationSink};
pub use stt::{Transcriber, Transcription};
pub use translate::Translator;

// Pipeline
pub use pipeline::orchestrator::{DualPipeline, PipelineConfig, PipelineHandle, SourceBundle};
pub use pipeline::types::{SourceKind, SourceSettings};

// Segmentation
pub use segment::{SegmentBuffer, SegmentEvent, SegmenterConfig, find_silence_split};

// Classification
pub use classify::{HallucinationFilter, is_repetitive_translation, looks_like_speech, rms};

// Error handling
pub use error::{DuotalkError, Result};

// Config
pub use config::Config;

/// Build version string from the crate metadata.
pub fn version_string() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
