//! Machine-translation interface.
//!
//! Stateless-per-call text service; the real model lives in the host
//! application. Each source direction gets its own translator instance
//! (game: ru→en, mic: en→ru by default).

use crate::error::{DuotalkError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for text translation between a fixed language pair.
pub trait Translator: Send + Sync {
    /// Translate text from the source language to the target language.
    fn translate(&self, text: &str) -> Result<String>;

    /// Source language code, for logging.
    fn source_lang(&self) -> &str;

    /// Target language code, for logging.
    fn target_lang(&self) -> &str;
}

impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, text: &str) -> Result<String> {
        (**self).translate(text)
    }

    fn source_lang(&self) -> &str {
        (**self).source_lang()
    }

    fn target_lang(&self) -> &str {
        (**self).target_lang()
    }
}

/// Mock translator for testing
#[derive(Debug, Clone)]
pub struct MockTranslator {
    source_lang: String,
    target_lang: String,
    response: Option<String>,
    phrases: HashMap<String, String>,
    should_fail: bool,
}

impl MockTranslator {
    /// Create a mock for the given language pair. By default it echoes
    /// the input text back.
    pub fn new(source_lang: &str, target_lang: &str) -> Self {
        Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            response: None,
            phrases: HashMap::new(),
            should_fail: false,
        }
    }

    /// Always return this response regardless of input.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = Some(response.to_string());
        self
    }

    /// Add a phrase-table entry; matching input returns the mapped text.
    pub fn with_phrase(mut self, source: &str, target: &str) -> Self {
        self.phrases.insert(source.to_string(), target.to_string());
        self
    }

    /// Configure the mock to fail on translate.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Translator for MockTranslator {
    fn translate(&self, text: &str) -> Result<String> {
        if self.should_fail {
            return Err(DuotalkError::Translation {
                message: "mock translation failure".to_string(),
            });
        }

        if let Some(mapped) = self.phrases.get(text) {
            return Ok(mapped.clone());
        }

        Ok(self
            .response
            .clone()
            .unwrap_or_else(|| text.to_string()))
    }

    fn source_lang(&self) -> &str {
        &self.source_lang
    }

    fn target_lang(&self) -> &str {
        &self.target_lang
    }
}
