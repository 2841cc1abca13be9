//! Per-source processing loop.
//!
//! Pulls chunks from the bounded capture queue with a short blocking
//! timeout, feeds them through the segment buffer, and runs the full
//! pipeline on finalized utterances:
//! transcribe → hallucination filter → translate → repetition filter →
//! glossary → sink.
//!
//! Final processing blocks the loop iteration; previews are dispatched to
//! short-lived threads so accumulation never waits on transcription
//! latency. At most one preview runs per source at a time.

use crate::classify::{self, HallucinationFilter};
use crate::error::Result;
use crate::glossary::Glossary;
use crate::pipeline::latency::{LatencyTracker, UtteranceTiming};
use crate::pipeline::sink::TranslationSink;
use crate::pipeline::types::{AudioChunk, SourceSettings};
use crate::segment::{SegmentBuffer, SegmentEvent};
use crate::stt::Transcriber;
use crate::translate::Translator;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Exclusive claim on a source's preview slot. Releasing is a `Drop`
/// impl, so a panicking or failing preview can never leave the slot
/// permanently stuck.
struct PreviewPermit {
    flag: Arc<AtomicBool>,
}

impl PreviewPermit {
    fn try_claim(flag: Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PreviewPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs one source's segmentation and translation pipeline.
pub struct SourceProcessor {
    settings: SourceSettings,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    glossary: Arc<Glossary>,
    sink: Arc<dyn TranslationSink>,
    hallucinations: Arc<HallucinationFilter>,
    preview_busy: Arc<AtomicBool>,
    latency: LatencyTracker,
}

impl SourceProcessor {
    /// Creates a processor with the default hallucination tables.
    pub fn new(
        settings: SourceSettings,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
        glossary: Arc<Glossary>,
        sink: Arc<dyn TranslationSink>,
    ) -> Self {
        Self {
            settings,
            transcriber,
            translator,
            glossary,
            sink,
            hallucinations: Arc::new(HallucinationFilter::default()),
            preview_busy: Arc::new(AtomicBool::new(false)),
            latency: LatencyTracker::new(),
        }
    }

    /// Replaces the hallucination filter (per-locale tables, tests).
    pub fn with_hallucination_filter(mut self, filter: HallucinationFilter) -> Self {
        self.hallucinations = Arc::new(filter);
        self
    }

    /// Latency statistics recorded so far.
    pub fn latency_stats(&self) -> Option<crate::pipeline::latency::LatencyStats> {
        self.latency.stats()
    }

    /// Consumes the processor and runs the loop until `running` clears or
    /// the chunk queue disconnects (finite source drained).
    pub fn run(mut self, chunks: Receiver<AudioChunk>, running: Arc<AtomicBool>, poll: Duration) {
        let mut segmenter = SegmentBuffer::new(self.settings.segmenter.clone());

        while running.load(Ordering::SeqCst) {
            match chunks.recv_timeout(poll) {
                Ok(chunk) => {
                    for event in segmenter.push_chunk(&chunk.samples) {
                        self.handle_event(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(event) = segmenter.flush_timeout() {
                        self.handle_event(event);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Finite source drained: flush trailing audio, then exit.
                    if let Some(event) = segmenter.flush_timeout() {
                        self.handle_event(event);
                    }
                    break;
                }
            }
        }

        debug!(source = %self.settings.kind, "processing loop stopped");
    }

    fn handle_event(&mut self, event: SegmentEvent) {
        match event {
            SegmentEvent::Preview(samples) => self.dispatch_preview(samples),
            SegmentEvent::Utterance(samples) => self.process_utterance(samples),
            SegmentEvent::Discarded { samples } => {
                debug!(
                    source = %self.settings.kind,
                    samples,
                    "discarded non-speech buffer"
                );
            }
        }
    }

    /// Fires an asynchronous preview transcription over a buffer copy.
    /// The main loop keeps consuming while it runs.
    fn dispatch_preview(&self, samples: Vec<f32>) {
        let Some(permit) = PreviewPermit::try_claim(self.preview_busy.clone()) else {
            debug!(source = %self.settings.kind, "preview skipped, one already in flight");
            return;
        };

        let transcriber = self.transcriber.clone();
        let sink = self.sink.clone();
        let filter = self.hallucinations.clone();
        let kind = self.settings.kind;
        let language = self.settings.language.clone();

        let spawned = thread::Builder::new()
            .name(format!("duotalk-{kind}-preview"))
            .spawn(move || {
                let _permit = permit;
                match transcriber.transcribe(&samples, &language) {
                    Ok(text) => {
                        if !text.trim().is_empty() && !filter.is_hallucination(&text) {
                            sink.update_preview(kind, &text);
                        }
                    }
                    Err(e) => {
                        debug!(source = %kind, error = %e, "preview transcription failed");
                    }
                }
            });

        if let Err(e) = spawned {
            // The unspawned closure drops the permit, releasing the slot.
            warn!(source = %self.settings.kind, error = %e, "could not spawn preview thread");
        }
    }

    /// Full pipeline for one finalized utterance. Every failure is logged
    /// and ends this utterance only; the loop continues with the next.
    fn process_utterance(&mut self, samples: Vec<f32>) {
        let finalized = Instant::now();
        let audio_duration = Duration::from_secs_f64(
            samples.len() as f64 / self.settings.segmenter.sample_rate as f64,
        );

        let transcript = match self.transcribe_final(&samples) {
            Ok(Some(text)) => text,
            Ok(None) => return,
            Err(e) => {
                warn!(source = %self.settings.kind, error = %e, "transcription failed, dropping utterance");
                return;
            }
        };
        let transcription_done = Instant::now();

        if self.hallucinations.is_hallucination(&transcript) {
            debug!(source = %self.settings.kind, text = %transcript, "rejected hallucinated transcript");
            return;
        }

        let translated = match self.translator.translate(&transcript) {
            Ok(text) => text,
            Err(e) => {
                warn!(source = %self.settings.kind, error = %e, "translation failed, dropping utterance");
                return;
            }
        };

        if translated.trim().is_empty() {
            debug!(source = %self.settings.kind, "empty translation, dropping utterance");
            return;
        }

        if self.hallucinations.is_hallucination(&translated)
            || classify::is_repetitive_translation(&translated)
        {
            debug!(source = %self.settings.kind, text = %translated, "rejected degenerate translation");
            return;
        }
        let translation_done = Instant::now();

        let final_text = self.glossary.apply(&translated);
        self.sink.update_final(self.settings.kind, &final_text);
        let output_done = Instant::now();

        let timing = UtteranceTiming {
            finalized,
            transcription_done,
            translation_done,
            output_done,
            audio_duration,
        };
        let direction = format!(
            "{}->{}",
            self.translator.source_lang(),
            self.translator.target_lang()
        );
        tracing::info!(
            source = %self.settings.kind,
            direction = %direction,
            raw = %transcript,
            translated = %final_text,
            audio_ms = audio_duration.as_millis() as u64,
            transcribe_ms = timing.transcription_latency().as_millis() as u64,
            translate_ms = timing.translation_latency().as_millis() as u64,
            total_ms = timing.total_latency().as_millis() as u64,
            "utterance translated"
        );
        self.latency.record(timing);
    }

    /// Transcribes a finalized utterance, honoring the strict language
    /// filter: a confidently foreign detection is silently skipped, an
    /// unconfident mismatch falls back to forcing the expected language
    /// rather than trusting the detector.
    fn transcribe_final(&self, samples: &[f32]) -> Result<Option<String>> {
        if self.settings.strict_language_filter {
            let detection = self
                .transcriber
                .transcribe_with_language(samples, &self.settings.language)?;

            if detection.language != self.settings.language {
                if detection.confidence >= self.settings.language_confidence {
                    debug!(
                        source = %self.settings.kind,
                        detected = %detection.language,
                        confidence = detection.confidence,
                        "skipping utterance in unexpected language"
                    );
                    return Ok(None);
                }

                let text = self.transcriber.transcribe(samples, &self.settings.language)?;
                return Ok(non_empty(text));
            }

            return Ok(non_empty(detection.text));
        }

        let text = self.transcriber.transcribe(samples, &self.settings.language)?;
        Ok(non_empty(text))
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::pipeline::sink::CollectorSink;
    use crate::pipeline::types::SourceKind;
    use crate::stt::MockTranscriber;
    use crate::translate::MockTranslator;

    fn speech_samples(secs: f32) -> Vec<f32> {
        let count = (secs * 16000.0) as usize;
        (0..count)
            .map(|i| if (i / 20) % 2 == 0 { 0.3 } else { -0.3 })
            .collect()
    }

    struct Harness {
        processor: SourceProcessor,
        sink: Arc<CollectorSink>,
        transcriber: MockTranscriber,
    }

    fn make_harness(transcriber: MockTranscriber, translator: MockTranslator) -> Harness {
        let mut config = Config::default();
        config.language.filter_game_language = false;
        let sink = Arc::new(CollectorSink::new());
        let processor = SourceProcessor::new(
            SourceSettings::game(&config),
            Arc::new(transcriber.clone()),
            Arc::new(translator),
            Arc::new(Glossary::gaming_english().unwrap()),
            sink.clone(),
        );
        Harness {
            processor,
            sink,
            transcriber,
        }
    }

    fn strict_harness(transcriber: MockTranscriber) -> Harness {
        let config = Config::default();
        assert!(config.language.filter_game_language);
        let sink = Arc::new(CollectorSink::new());
        let processor = SourceProcessor::new(
            SourceSettings::game(&config),
            Arc::new(transcriber.clone()),
            Arc::new(MockTranslator::new("ru", "en").with_response("translated text here")),
            Arc::new(Glossary::empty()),
            sink.clone(),
        );
        Harness {
            processor,
            sink,
            transcriber,
        }
    }

    #[test]
    fn test_utterance_flows_to_sink_with_glossary() {
        let transcriber = MockTranscriber::new("mock").with_response("Нашел аптечку и патроны");
        let translator = MockTranslator::new("ru", "en")
            .with_response("I found a pharmacy and fifty cartridges");
        let mut h = make_harness(transcriber, translator);

        h.processor.process_utterance(speech_samples(2.0));

        assert_eq!(
            h.sink.finals_for(SourceKind::Game),
            vec!["I found a medkit and fifty ammo"]
        );
        assert_eq!(h.processor.latency_stats().unwrap().count, 1);
    }

    #[test]
    fn test_hallucinated_transcript_dropped() {
        let transcriber = MockTranscriber::new("mock").with_response("Продолжение следует");
        let translator = MockTranslator::new("ru", "en").with_response("To be continued");
        let mut h = make_harness(transcriber, translator);

        h.processor.process_utterance(speech_samples(2.0));

        assert!(h.sink.finals().is_empty());
        assert_eq!(h.transcriber.call_count(), 1);
    }

    #[test]
    fn test_hallucinated_translation_dropped() {
        // Clean transcript, but the translator hallucinates boilerplate
        let transcriber = MockTranscriber::new("mock").with_response("Какая-то нормальная фраза");
        let translator =
            MockTranslator::new("ru", "en").with_response("Subtitles by the community");
        let mut h = make_harness(transcriber, translator);

        h.processor.process_utterance(speech_samples(2.0));
        assert!(h.sink.finals().is_empty());
    }

    #[test]
    fn test_repetitive_translation_dropped() {
        let transcriber = MockTranscriber::new("mock").with_response("Ого ого что это");
        let repetitive = "Whoa, ".repeat(50);
        let translator = MockTranslator::new("ru", "en").with_response(&repetitive);
        let mut h = make_harness(transcriber, translator);

        h.processor.process_utterance(speech_samples(2.0));
        assert!(h.sink.finals().is_empty());
    }

    #[test]
    fn test_empty_translation_dropped() {
        let transcriber = MockTranscriber::new("mock").with_response("Нормальная фраза тут");
        let translator = MockTranslator::new("ru", "en").with_response("   ");
        let mut h = make_harness(transcriber, translator);

        h.processor.process_utterance(speech_samples(2.0));
        assert!(h.sink.finals().is_empty());
    }

    #[test]
    fn test_transcriber_failure_is_swallowed() {
        let transcriber = MockTranscriber::new("mock").with_failure();
        let translator = MockTranslator::new("ru", "en");
        let mut h = make_harness(transcriber, translator);

        h.processor.process_utterance(speech_samples(2.0));
        assert!(h.sink.finals().is_empty());
        assert!(h.processor.latency_stats().is_none());
    }

    #[test]
    fn test_translator_failure_is_swallowed() {
        let transcriber = MockTranscriber::new("mock").with_response("Все хорошо у нас тут");
        let translator = MockTranslator::new("ru", "en").with_failure();
        let mut h = make_harness(transcriber, translator);

        h.processor.process_utterance(speech_samples(2.0));
        assert!(h.sink.finals().is_empty());
    }

    // ── Strict language filter ───────────────────────────────────────────

    #[test]
    fn test_strict_filter_skips_confident_mismatch() {
        let transcriber = MockTranscriber::new("mock")
            .with_response("something english")
            .with_language("en")
            .with_confidence(0.9);
        let mut h = strict_harness(transcriber);

        h.processor.process_utterance(speech_samples(2.0));

        assert!(h.sink.finals().is_empty());
        assert_eq!(
            h.transcriber.call_count(),
            1,
            "confident mismatch must not re-transcribe"
        );
    }

    #[test]
    fn test_strict_filter_retranscribes_unconfident_mismatch() {
        let transcriber = MockTranscriber::new("mock")
            .with_response("что-то по-русски здесь")
            .with_language("en")
            .with_confidence(0.3);
        let mut h = strict_harness(transcriber);

        h.processor.process_utterance(speech_samples(2.0));

        assert_eq!(
            h.transcriber.call_count(),
            2,
            "low confidence falls back to forced transcription"
        );
        assert_eq!(h.sink.finals().len(), 1);
    }

    #[test]
    fn test_strict_filter_passes_matching_language() {
        let transcriber = MockTranscriber::new("mock")
            .with_response("привет как дела у вас")
            .with_language("ru")
            .with_confidence(0.9);
        let mut h = strict_harness(transcriber);

        h.processor.process_utterance(speech_samples(2.0));

        assert_eq!(h.transcriber.call_count(), 1);
        assert_eq!(h.sink.finals().len(), 1);
    }

    // ── Previews ─────────────────────────────────────────────────────────

    fn wait_for<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        predicate()
    }

    #[test]
    fn test_preview_reaches_sink() {
        let transcriber = MockTranscriber::new("mock").with_response("партия говорит что-то");
        let translator = MockTranslator::new("ru", "en");
        let h = make_harness(transcriber, translator);

        h.processor.dispatch_preview(speech_samples(1.5));

        let sink = h.sink.clone();
        assert!(wait_for(
            || !sink.previews().is_empty(),
            Duration::from_secs(2)
        ));
        assert!(h.sink.finals().is_empty(), "previews never produce finals");
    }

    #[test]
    fn test_preview_slot_allows_one_in_flight() {
        let transcriber = MockTranscriber::new("mock")
            .with_response("медленная фраза тут")
            .with_delay(Duration::from_millis(150));
        let translator = MockTranslator::new("ru", "en");
        let h = make_harness(transcriber.clone(), translator);

        h.processor.dispatch_preview(speech_samples(1.5));
        // Second dispatch while the first is still sleeping: skipped
        h.processor.dispatch_preview(speech_samples(1.5));

        let counter = transcriber.call_counter();
        assert!(wait_for(
            || counter.load(std::sync::atomic::Ordering::SeqCst) >= 1,
            Duration::from_secs(2)
        ));
        thread::sleep(Duration::from_millis(250));
        assert_eq!(
            transcriber.call_count(),
            1,
            "only one preview may be in flight per source"
        );
    }

    #[test]
    fn test_preview_slot_released_after_completion() {
        let transcriber = MockTranscriber::new("mock").with_response("быстрая фраза тут");
        let translator = MockTranslator::new("ru", "en");
        let h = make_harness(transcriber.clone(), translator);

        h.processor.dispatch_preview(speech_samples(1.5));
        let busy = h.processor.preview_busy.clone();
        assert!(wait_for(
            || !busy.load(Ordering::SeqCst),
            Duration::from_secs(2)
        ));

        // Slot is free again: a new preview runs
        h.processor.dispatch_preview(speech_samples(1.5));
        let counter = transcriber.call_counter();
        assert!(wait_for(
            || counter.load(std::sync::atomic::Ordering::SeqCst) >= 2,
            Duration::from_secs(2)
        ));
    }

    #[test]
    fn test_preview_slot_released_after_failure() {
        let transcriber = MockTranscriber::new("mock").with_failure();
        let translator = MockTranslator::new("ru", "en");
        let h = make_harness(transcriber, translator);

        h.processor.dispatch_preview(speech_samples(1.5));
        let busy = h.processor.preview_busy.clone();
        assert!(
            wait_for(|| !busy.load(Ordering::SeqCst), Duration::from_secs(2)),
            "a failing preview must release the slot"
        );
        assert!(h.sink.previews().is_empty());
    }

    #[test]
    fn test_hallucinated_preview_suppressed() {
        let transcriber = MockTranscriber::new("mock").with_response("Thank you.");
        let translator = MockTranslator::new("ru", "en");
        let h = make_harness(transcriber.clone(), translator);

        h.processor.dispatch_preview(speech_samples(1.5));
        let busy = h.processor.preview_busy.clone();
        assert!(wait_for(
            || !busy.load(Ordering::SeqCst),
            Duration::from_secs(2)
        ));
        assert!(h.sink.previews().is_empty());
    }

    // ── Run loop ─────────────────────────────────────────────────────────

    #[test]
    fn test_run_processes_queued_chunks_and_exits_on_disconnect() {
        let transcriber = MockTranscriber::new("mock").with_response("есть контакт слева");
        let translator = MockTranslator::new("ru", "en").with_response("contact on the left");
        let h = make_harness(transcriber, translator);

        let (tx, rx) = crossbeam_channel::bounded(300);
        let mut sequence = 0u64;
        // ~2s of speech then enough silence to trigger the boundary
        for _ in 0..32 {
            tx.send(AudioChunk::new(speech_samples(0.064), sequence)).unwrap();
            sequence += 1;
        }
        for _ in 0..12 {
            tx.send(AudioChunk::new(vec![0.0; 1024], sequence)).unwrap();
            sequence += 1;
        }
        drop(tx);

        let running = Arc::new(AtomicBool::new(true));
        let sink = h.sink.clone();
        h.processor.run(rx, running, Duration::from_millis(50));

        assert_eq!(sink.finals_for(SourceKind::Game), vec!["contact on the left"]);
    }

    #[test]
    fn test_run_stops_when_running_clears() {
        let transcriber = MockTranscriber::new("mock");
        let translator = MockTranslator::new("ru", "en");
        let h = make_harness(transcriber, translator);

        let (_tx, rx) = crossbeam_channel::bounded::<AudioChunk>(10);
        let running = Arc::new(AtomicBool::new(true));
        let stop_flag = running.clone();

        let handle = thread::spawn(move || {
            h.processor.run(rx, running, Duration::from_millis(20));
        });

        thread::sleep(Duration::from_millis(60));
        stop_flag.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + Duration::from_secs(1);
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(handle.is_finished(), "loop must observe the running flag");
        let _ = handle.join();
    }
}
