//! Data types shared across the pipeline stages.

use crate::config::Config;
use crate::segment::SegmenterConfig;
use std::fmt;
use std::time::Duration;

/// Which audio stream a pipeline handles.
///
/// Carried on the per-source settings and read once at setup; behavior
/// never branches on display labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// System/game loopback audio (incoming speech).
    Game,
    /// Microphone input (outgoing speech).
    Mic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Game => write!(f, "game"),
            SourceKind::Mic => write!(f, "mic"),
        }
    }
}

/// A batch of captured samples flowing from the capture thread to the
/// processing loop. Immutable once queued.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// float32 mono samples.
    pub samples: Vec<f32>,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl AudioChunk {
    /// Creates a new audio chunk.
    pub fn new(samples: Vec<f32>, sequence: u64) -> Self {
        Self { samples, sequence }
    }

    /// Returns the duration of this chunk in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        (self.samples.len() as u32 * 1000) / sample_rate
    }
}

/// Everything one source's pipeline needs to know about itself.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// Expected language of this stream ("ru", "en").
    pub language: String,
    /// Skip utterances whose detected language differs from `language`
    /// with high confidence.
    pub strict_language_filter: bool,
    /// Confidence above which a mismatching detection is trusted.
    pub language_confidence: f32,
    /// Segmentation tuning for this source.
    pub segmenter: SegmenterConfig,
}

impl SourceSettings {
    /// Settings for the game/loopback pipeline.
    ///
    /// The noise gate is relaxed when the band-pass filter already
    /// suppressed non-speech energy; the ZCR gate only runs on unfiltered
    /// audio, where energy alone passes music and explosions.
    pub fn game(config: &Config) -> Self {
        let segmenter = SegmenterConfig {
            speech_rms_threshold: config.effective_game_gate(),
            zcr_gate: !config.audio.speech_filter_enabled,
            ..base_segmenter(config)
        };

        Self {
            kind: SourceKind::Game,
            language: config.language.game.clone(),
            strict_language_filter: config.language.filter_game_language,
            language_confidence: config.language.confidence_threshold,
            segmenter,
        }
    }

    /// Settings for the microphone pipeline.
    pub fn mic(config: &Config) -> Self {
        let segmenter = SegmenterConfig {
            speech_rms_threshold: config.audio.mic_noise_gate,
            zcr_gate: false,
            ..base_segmenter(config)
        };

        Self {
            kind: SourceKind::Mic,
            language: config.language.mic.clone(),
            strict_language_filter: false,
            language_confidence: config.language.confidence_threshold,
            segmenter,
        }
    }
}

fn base_segmenter(config: &Config) -> SegmenterConfig {
    SegmenterConfig {
        sample_rate: config.audio.sample_rate,
        min_utterance_secs: config.segmenter.min_utterance_secs,
        max_utterance_secs: config.segmenter.max_utterance_secs,
        silence_rms_threshold: config.audio.silence_threshold,
        silence_trigger_chunks: config.segmenter.silence_trigger_chunks,
        preview_enabled: config.preview.enabled,
        preview_min_secs: config.preview.min_duration_secs,
        preview_interval: Duration::from_millis(config.preview.interval_ms),
        ..SegmenterConfig::default()
    }
}
