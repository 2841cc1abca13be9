//! Output sinks for translated text.
//!
//! The overlay UI lives in the host application; the pipelines only know
//! this trait. Final text is authoritative, preview text is provisional
//! and may be replaced at any time.

use crate::pipeline::types::SourceKind;
use std::sync::Mutex;

/// Pluggable output handler for translation results.
/// Pairs with AudioSource for input - this handles the text side.
pub trait TranslationSink: Send + Sync {
    /// Authoritative translation of a completed utterance.
    fn update_final(&self, source: SourceKind, text: &str);

    /// Provisional transcript of an in-progress utterance, shown dimmed.
    fn update_preview(&self, source: SourceKind, text: &str);

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Sink that records every update, for tests and result collection.
#[derive(Debug, Default)]
pub struct CollectorSink {
    finals: Mutex<Vec<(SourceKind, String)>>,
    previews: Mutex<Vec<(SourceKind, String)>>,
}

impl CollectorSink {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all final updates so far.
    pub fn finals(&self) -> Vec<(SourceKind, String)> {
        self.finals.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Snapshot of all preview updates so far.
    pub fn previews(&self) -> Vec<(SourceKind, String)> {
        self.previews.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Final updates for one source, in arrival order.
    pub fn finals_for(&self, source: SourceKind) -> Vec<String> {
        self.finals()
            .into_iter()
            .filter(|(kind, _)| *kind == source)
            .map(|(_, text)| text)
            .collect()
    }
}

impl TranslationSink for CollectorSink {
    fn update_final(&self, source: SourceKind, text: &str) {
        if let Ok(mut finals) = self.finals.lock() {
            finals.push((source, text.to_string()));
        }
    }

    fn update_preview(&self, source: SourceKind, text: &str) {
        if let Ok(mut previews) = self.previews.lock() {
            previews.push((source, text.to_string()));
        }
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Sink that emits structured log events instead of driving a UI.
/// Useful headless and as a default when no overlay is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TranslationSink for LogSink {
    fn update_final(&self, source: SourceKind, text: &str) {
        tracing::info!(source = %source, text = %text, "final");
    }

    fn update_preview(&self, source: SourceKind, text: &str) {
        tracing::debug!(source = %source, text = %text, "preview");
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
