//! Utterance segmentation for a single audio source.
//!
//! [`SegmentBuffer`] accumulates capture chunks and decides, per arrival,
//! whether the buffer is still growing, ready for a streaming preview, a
//! complete utterance, or silence to discard. One instance exists per
//! source and is owned exclusively by that source's processing loop.

use crate::classify;
use crate::defaults;
use std::time::{Duration, Instant};

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Mock clock with manual time advancement, for deterministic tests.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: std::sync::Arc<std::sync::Mutex<Instant>>,
}

impl MockClock {
    /// Creates a new mock clock starting at the current instant.
    pub fn new() -> Self {
        Self {
            current: std::sync::Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    /// Advances the mock clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut current) = self.current.lock() {
            *current += duration;
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.current
            .lock()
            .map(|current| *current)
            .unwrap_or_else(|_| Instant::now())
    }
}

/// Configuration for utterance segmentation. Values differ per source:
/// game audio runs a higher noise gate than the microphone.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Sample rate for duration calculations.
    pub sample_rate: u32,
    /// Minimum accumulated audio before a silence-triggered finalize (seconds).
    pub min_utterance_secs: f32,
    /// Hard cap forcing a finalize regardless of silence (seconds).
    pub max_utterance_secs: f32,
    /// Absolute buffer ceiling; the front is evicted past this (seconds).
    pub hard_ceiling_secs: f32,
    /// Chunk RMS below this counts toward the consecutive-silence run.
    pub silence_rms_threshold: f32,
    /// Whole-buffer RMS a finalized segment must exceed to be processed.
    pub speech_rms_threshold: f32,
    /// Apply the zero-crossing-rate gate on finalize. On for unfiltered
    /// game audio; off when a band-pass filter already shaped the signal
    /// and for microphone input.
    pub zcr_gate: bool,
    /// Consecutive silent chunks that constitute end of utterance.
    pub silence_trigger_chunks: u32,
    /// Emit streaming previews of the in-progress buffer.
    pub preview_enabled: bool,
    /// Minimum buffered audio before a preview may fire (seconds).
    pub preview_min_secs: f32,
    /// Minimum wall-clock gap between previews.
    pub preview_interval: Duration,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            min_utterance_secs: defaults::MIN_UTTERANCE_SECS,
            max_utterance_secs: defaults::MAX_UTTERANCE_SECS,
            hard_ceiling_secs: defaults::HARD_CEILING_SECS,
            silence_rms_threshold: defaults::SILENCE_RMS_THRESHOLD,
            speech_rms_threshold: defaults::MIC_NOISE_GATE,
            zcr_gate: false,
            silence_trigger_chunks: defaults::SILENCE_TRIGGER_CHUNKS,
            preview_enabled: true,
            preview_min_secs: defaults::PREVIEW_MIN_SECS,
            preview_interval: Duration::from_millis(defaults::PREVIEW_INTERVAL_MS),
        }
    }
}

impl SegmenterConfig {
    fn min_samples(&self) -> usize {
        defaults::secs_to_samples(self.min_utterance_secs, self.sample_rate)
    }

    fn max_samples(&self) -> usize {
        defaults::secs_to_samples(self.max_utterance_secs, self.sample_rate)
    }

    fn ceiling_samples(&self) -> usize {
        defaults::secs_to_samples(self.hard_ceiling_secs, self.sample_rate)
    }

    fn preview_min_samples(&self) -> usize {
        defaults::secs_to_samples(self.preview_min_secs, self.sample_rate)
    }
}

/// Outcome of one buffer-evaluation step.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    /// A copy of the in-progress buffer for asynchronous preview
    /// transcription. The original keeps accumulating.
    Preview(Vec<f32>),
    /// A complete utterance ready for full processing.
    Utterance(Vec<f32>),
    /// A finalized buffer that failed the speech gate and was cleared
    /// without any service call.
    Discarded {
        /// Number of samples dropped.
        samples: usize,
    },
}

/// Accumulates chunks for one source and decides utterance boundaries.
pub struct SegmentBuffer<C: Clock = SystemClock> {
    config: SegmenterConfig,
    samples: Vec<f32>,
    consecutive_silent: u32,
    last_preview: Instant,
    clock: C,
}

impl SegmentBuffer<SystemClock> {
    /// Creates a segment buffer with the system clock.
    pub fn new(config: SegmenterConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SegmentBuffer<C> {
    /// Creates a segment buffer with the given clock.
    pub fn with_clock(config: SegmenterConfig, clock: C) -> Self {
        let last_preview = clock.now();
        Self {
            config,
            samples: Vec::new(),
            consecutive_silent: 0,
            last_preview,
            clock,
        }
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if no audio is buffered.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Current consecutive-silent-chunk count.
    pub fn consecutive_silent(&self) -> u32 {
        self.consecutive_silent
    }

    /// Clears all buffered audio and counters.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.consecutive_silent = 0;
        self.last_preview = self.clock.now();
    }

    /// Processes one arriving chunk and returns the resulting events.
    ///
    /// At most one [`SegmentEvent::Preview`] and one terminal event
    /// ([`SegmentEvent::Utterance`] or [`SegmentEvent::Discarded`]) are
    /// produced per call.
    pub fn push_chunk(&mut self, chunk: &[f32]) -> Vec<SegmentEvent> {
        let mut events = Vec::new();

        self.samples.extend_from_slice(chunk);

        if classify::rms(chunk) < self.config.silence_rms_threshold {
            self.consecutive_silent += 1;
        } else {
            self.consecutive_silent = 0;
        }

        let now = self.clock.now();
        if self.preview_ready(now) {
            self.last_preview = now;
            events.push(SegmentEvent::Preview(self.samples.clone()));
        }

        let at_max = self.samples.len() >= self.config.max_samples();
        let at_silence_boundary = self.samples.len() >= self.config.min_samples()
            && self.consecutive_silent >= self.config.silence_trigger_chunks;

        if at_max || at_silence_boundary {
            events.push(self.finalize(at_max));
            self.consecutive_silent = 0;
            self.last_preview = now;
        }

        self.enforce_ceiling();
        events
    }

    /// Handles a queue-read timeout: no chunk arrived within the poll
    /// interval. A buffer at or above the minimum duration is treated as an
    /// implicit silence boundary and finalized through the same speech gate.
    pub fn flush_timeout(&mut self) -> Option<SegmentEvent> {
        if self.samples.len() < self.config.min_samples() {
            return None;
        }

        let event = self.finalize(false);
        self.consecutive_silent = 0;
        self.last_preview = self.clock.now();
        Some(event)
    }

    fn preview_ready(&self, now: Instant) -> bool {
        self.config.preview_enabled
            && self.samples.len() >= self.config.preview_min_samples()
            && self.consecutive_silent < self.config.silence_trigger_chunks
            && now.duration_since(self.last_preview) >= self.config.preview_interval
    }

    /// Finalizes the current buffer. A buffer that fails the speech gate is
    /// always cleared, never left to grow through a long non-speech passage.
    fn finalize(&mut self, forced: bool) -> SegmentEvent {
        let passes = classify::looks_like_speech(
            &self.samples,
            self.config.sample_rate,
            self.config.speech_rms_threshold,
            !self.config.zcr_gate,
        );

        if !passes {
            let dropped = self.samples.len();
            self.samples.clear();
            return SegmentEvent::Discarded { samples: dropped };
        }

        if forced {
            // Reached the hard cap without a silence boundary: split at the
            // most recent pause so the remainder continues next cycle.
            let split = find_silence_split(
                &self.samples,
                self.config.silence_rms_threshold,
                defaults::SPLIT_WINDOW_SAMPLES,
                defaults::secs_to_samples(defaults::SPLIT_SEARCH_SECS, self.config.sample_rate),
            );
            let remainder = self.samples.split_off(split);
            let head = std::mem::replace(&mut self.samples, remainder);
            SegmentEvent::Utterance(head)
        } else {
            SegmentEvent::Utterance(std::mem::take(&mut self.samples))
        }
    }

    fn enforce_ceiling(&mut self) {
        let ceiling = self.config.ceiling_samples();
        if self.samples.len() > ceiling {
            let keep = self.config.max_samples().min(ceiling);
            let cut = self.samples.len() - keep;
            self.samples.drain(..cut);
        }
    }
}

/// Finds where to split an overlong buffer so the retained part ends at a
/// natural pause.
///
/// Walks backward from the end in `window`-sized steps over the last
/// `search_span` samples, looking for the most recent window whose peak
/// amplitude is below `threshold`. Returns the index just after that
/// window, or the full length when no silent window exists (process
/// everything, nothing carries over).
pub fn find_silence_split(
    samples: &[f32],
    threshold: f32,
    window: usize,
    search_span: usize,
) -> usize {
    let len = samples.len();
    if window == 0 || len <= window {
        return len;
    }

    let span = search_span.min(len);
    let start = len - span;

    let mut i = len - window;
    while i > start {
        if classify::peak_amplitude(&samples[i..i + window]) < threshold {
            return i + window;
        }
        if i < window {
            break;
        }
        i -= window;
    }

    len
}
