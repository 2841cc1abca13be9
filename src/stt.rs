//! Speech-to-text interface.
//!
//! The actual model (Whisper or similar) lives in the host application;
//! this trait is the seam the pipelines call through.

use crate::error::{DuotalkError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Result of a transcription with language detection.
#[derive(Debug, Clone)]
pub struct Transcription {
    /// Transcribed text.
    pub text: String,
    /// Detected language as a 2-letter code ("en", "ru").
    pub language: String,
    /// Detection confidence (0.0 to 1.0).
    pub confidence: f32,
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real model vs mock).
/// Implementations are stateless per call and shared across both source
/// pipelines.
pub trait Transcriber: Send + Sync {
    /// Transcribe audio to text with a language hint.
    ///
    /// # Arguments
    /// * `audio` - float32 mono samples at 16kHz
    /// * `language` - expected language ("ru", "en"); forced on the model
    fn transcribe(&self, audio: &[f32], language: &str) -> Result<String>;

    /// Transcribe audio and also detect the spoken language.
    ///
    /// The hint informs the model but the language is not forced, so the
    /// caller can filter on what was actually detected.
    fn transcribe_with_language(&self, audio: &[f32], language: &str) -> Result<Transcription>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the transcriber is ready
    fn is_ready(&self) -> bool;
}

impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &[f32], language: &str) -> Result<String> {
        (**self).transcribe(audio, language)
    }

    fn transcribe_with_language(&self, audio: &[f32], language: &str) -> Result<Transcription> {
        (**self).transcribe_with_language(audio, language)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock transcriber for testing
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    model_name: String,
    response: String,
    detected_language: String,
    confidence: f32,
    should_fail: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            detected_language: "en".to_string(),
            confidence: 0.9,
            should_fail: false,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the detected language returned by language detection
    pub fn with_language(mut self, language: &str) -> Self {
        self.detected_language = language.to_string();
        self
    }

    /// Configure the detection confidence
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure a per-call delay to simulate inference latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of transcription calls made so far (either method).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared handle to the call counter, usable after the mock is moved
    /// into a pipeline.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn record_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.should_fail {
            Err(DuotalkError::Transcription {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _audio: &[f32], _language: &str) -> Result<String> {
        self.record_call()?;
        Ok(self.response.clone())
    }

    fn transcribe_with_language(&self, _audio: &[f32], _language: &str) -> Result<Transcription> {
        self.record_call()?;
        Ok(Transcription {
            text: self.response.clone(),
            language: self.detected_language.clone(),
            confidence: self.confidence,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}
