//! Latency measurement and reporting for the translation pipelines.

use std::time::{Duration, Instant};

/// Timing information for a single finalized utterance.
#[derive(Debug, Clone)]
pub struct UtteranceTiming {
    /// When the finalize decision fired.
    pub finalized: Instant,
    /// When transcription completed.
    pub transcription_done: Instant,
    /// When translation (and text filtering) completed.
    pub translation_done: Instant,
    /// When the sink update completed.
    pub output_done: Instant,
    /// Duration of the audio content.
    pub audio_duration: Duration,
}

impl UtteranceTiming {
    /// Time spent in transcription.
    pub fn transcription_latency(&self) -> Duration {
        self.transcription_done.duration_since(self.finalized)
    }

    /// Time spent in translation and text filtering.
    pub fn translation_latency(&self) -> Duration {
        self.translation_done.duration_since(self.transcription_done)
    }

    /// Time spent in glossary application and sink output.
    pub fn output_latency(&self) -> Duration {
        self.output_done.duration_since(self.translation_done)
    }

    /// End-to-end latency from finalize decision to sink update.
    pub fn total_latency(&self) -> Duration {
        self.output_done.duration_since(self.finalized)
    }

    /// Real-time factor for the whole pipeline.
    /// < 1.0 means faster than real-time, > 1.0 means slower.
    pub fn realtime_factor(&self) -> f64 {
        if self.audio_duration.is_zero() {
            return 0.0;
        }
        self.total_latency().as_secs_f64() / self.audio_duration.as_secs_f64()
    }
}

/// Aggregated latency statistics.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub count: usize,
    pub total_avg: Duration,
    pub total_min: Duration,
    pub total_max: Duration,
    pub transcription_avg: Duration,
    pub translation_avg: Duration,
    pub audio_duration_avg: Duration,
    pub realtime_factor_avg: f64,
}

/// Collects and aggregates latency measurements for one source.
#[derive(Debug, Default)]
pub struct LatencyTracker {
    measurements: Vec<UtteranceTiming>,
}

impl LatencyTracker {
    /// Creates a new latency tracker.
    pub fn new() -> Self {
        Self {
            measurements: Vec::new(),
        }
    }

    /// Records a timing measurement.
    pub fn record(&mut self, timing: UtteranceTiming) {
        self.measurements.push(timing);
    }

    /// Number of recorded measurements.
    pub fn count(&self) -> usize {
        self.measurements.len()
    }

    /// Computes aggregated statistics, or None when nothing was recorded.
    pub fn stats(&self) -> Option<LatencyStats> {
        if self.measurements.is_empty() {
            return None;
        }

        let count = self.measurements.len();
        let totals: Vec<Duration> = self.measurements.iter().map(|t| t.total_latency()).collect();

        let total_min = totals.iter().min().copied()?;
        let total_max = totals.iter().max().copied()?;

        let sum =
            |durations: &[Duration]| -> Duration { durations.iter().sum::<Duration>() };
        let avg = |durations: &[Duration]| -> Duration { sum(durations) / count as u32 };

        let transcriptions: Vec<Duration> = self
            .measurements
            .iter()
            .map(|t| t.transcription_latency())
            .collect();
        let translations: Vec<Duration> = self
            .measurements
            .iter()
            .map(|t| t.translation_latency())
            .collect();
        let audio_durations: Vec<Duration> =
            self.measurements.iter().map(|t| t.audio_duration).collect();

        let realtime_factor_sum: f64 = self.measurements.iter().map(|t| t.realtime_factor()).sum();

        Some(LatencyStats {
            count,
            total_avg: avg(&totals),
            total_min,
            total_max,
            transcription_avg: avg(&transcriptions),
            translation_avg: avg(&translations),
            audio_duration_avg: avg(&audio_durations),
            realtime_factor_avg: realtime_factor_sum / count as f64,
        })
    }
}
