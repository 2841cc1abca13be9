use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub segmenter: SegmenterSettings,
    pub preview: PreviewConfig,
    pub language: LanguageConfig,
}

/// Audio gating configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// RMS noise gate for game/loopback audio (higher = reject more noise).
    pub game_noise_gate: f32,
    /// RMS noise gate for microphone audio.
    pub mic_noise_gate: f32,
    /// Chunk RMS below this counts as silence.
    pub silence_threshold: f32,
    /// Band-pass filter (300-3000 Hz) active on game audio upstream.
    /// When set, the game gate is relaxed and the ZCR check is skipped.
    pub speech_filter_enabled: bool,
}

/// Utterance boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterSettings {
    pub min_utterance_secs: f32,
    pub max_utterance_secs: f32,
    pub silence_trigger_chunks: u32,
}

/// Streaming preview configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
    /// How often preview text may refresh.
    pub interval_ms: u64,
    pub min_duration_secs: f32,
}

/// Language and translation-direction configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageConfig {
    /// Expected language of game audio.
    pub game: String,
    /// Expected language of microphone audio.
    pub mic: String,
    /// Only process game audio whose detected language matches `game`.
    pub filter_game_language: bool,
    /// Detection confidence above which a mismatch is trusted.
    pub confidence_threshold: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            game_noise_gate: defaults::GAME_NOISE_GATE,
            mic_noise_gate: defaults::MIC_NOISE_GATE,
            silence_threshold: defaults::SILENCE_RMS_THRESHOLD,
            speech_filter_enabled: true,
        }
    }
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            min_utterance_secs: defaults::MIN_UTTERANCE_SECS,
            max_utterance_secs: defaults::MAX_UTTERANCE_SECS,
            silence_trigger_chunks: defaults::SILENCE_TRIGGER_CHUNKS,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: defaults::PREVIEW_INTERVAL_MS,
            min_duration_secs: defaults::PREVIEW_MIN_SECS,
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            game: "ru".to_string(),
            mic: "en".to_string(),
            filter_game_language: true,
            confidence_threshold: defaults::LANGUAGE_CONFIDENCE_THRESHOLD,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Effective finalize gate for game audio. The band-pass filter
    /// removes non-speech energy, so the remaining signal is quieter and
    /// the gate is relaxed accordingly.
    pub fn effective_game_gate(&self) -> f32 {
        if self.audio.speech_filter_enabled {
            self.audio.game_noise_gate * defaults::BAND_LIMITED_GATE_FACTOR
        } else {
            self.audio.game_noise_gate
        }
    }
}
