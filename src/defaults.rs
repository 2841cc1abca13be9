//! Default tuning constants for duotalk.
//!
//! Shared across configuration types so the segmenter, classifier, and
//! orchestrator agree on one set of values.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per capture chunk (64ms at 16kHz).
pub const CHUNK_SAMPLES: usize = 1024;

/// Capacity of the bounded chunk queue between capture and processing.
///
/// At 64ms per chunk this buffers ~19s of audio. When processing falls
/// behind, new chunks are dropped rather than blocking the capture thread.
pub const CHUNK_QUEUE_CAPACITY: usize = 300;

/// RMS level below which a chunk counts toward the consecutive-silence run.
pub const SILENCE_RMS_THRESHOLD: f32 = 0.005;

/// Default noise gate for game/loopback audio.
///
/// Game audio carries music, effects, and UI sounds; the gate sits well above
/// the silence threshold so a finalized buffer must contain real energy.
/// 0.005 is very sensitive, 0.02 strict, 0.04 very strict.
pub const GAME_NOISE_GATE: f32 = 0.012;

/// Default noise gate for microphone audio.
pub const MIC_NOISE_GATE: f32 = 0.005;

/// Gate relaxation applied when a band-pass filter already limited the
/// source to the speech band. The filter removes non-speech energy, so the
/// remaining signal is quieter overall.
pub const BAND_LIMITED_GATE_FACTOR: f32 = 0.6;

/// Minimum accumulated audio before a silence-triggered finalize may fire.
pub const MIN_UTTERANCE_SECS: f32 = 0.8;

/// Hard cap on utterance length; forces a finalize regardless of silence.
pub const MAX_UTTERANCE_SECS: f32 = 20.0;

/// Absolute buffer ceiling. If ever exceeded, the buffer front is dropped
/// down to the last [`MAX_UTTERANCE_SECS`] worth of samples.
pub const HARD_CEILING_SECS: f32 = 30.0;

/// Consecutive below-threshold chunks that constitute end of utterance.
pub const SILENCE_TRIGGER_CHUNKS: u32 = 10;

/// Minimum buffered audio before a streaming preview may be emitted.
pub const PREVIEW_MIN_SECS: f32 = 1.0;

/// Minimum wall-clock gap between streaming previews.
pub const PREVIEW_INTERVAL_MS: u64 = 1200;

/// Blocking timeout for the per-source chunk queue poll.
///
/// Also bounds shutdown latency: both loops observe the running flag at
/// least this often.
pub const QUEUE_POLL: Duration = Duration::from_millis(300);

/// Interval between capture-source polls.
pub const CAPTURE_POLL: Duration = Duration::from_millis(16);

/// Span searched backward for a silent window when force-splitting.
pub const SPLIT_SEARCH_SECS: f32 = 4.0;

/// Window size, in samples, for the silence-split scan.
pub const SPLIT_WINDOW_SAMPLES: usize = 1024;

/// Minimum audio duration for the speech-likelihood check.
pub const MIN_SPEECH_SECS: f32 = 0.3;

/// Zero-crossing-rate band that speech occupies (crossings per sample).
///
/// Steady tones and rumble fall below, broadband noise above.
pub const ZCR_SPEECH_MIN: f32 = 0.02;
pub const ZCR_SPEECH_MAX: f32 = 0.30;

/// Detected-language confidence above which a mismatching detection is
/// trusted and the utterance is skipped (strict language filter).
pub const LANGUAGE_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Converts a duration in seconds to a sample count at the given rate.
pub const fn secs_to_samples(secs: f32, sample_rate: u32) -> usize {
    (secs * sample_rate as f32) as usize
}
