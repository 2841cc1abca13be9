//! Dual-pipeline orchestrator: two independent source pipelines running
//! from startup until shutdown.
//!
//! Per source, two threads: a capture thread polling the audio source
//! into a bounded chunk queue, and a processing thread running the
//! segmentation loop. The only shared state between the two pipelines is
//! the running flag observed by every loop for coordinated shutdown.

use crate::error::{DuotalkError, Result};
use crate::glossary::Glossary;
use crate::pipeline::processor::SourceProcessor;
use crate::pipeline::sink::TranslationSink;
use crate::pipeline::types::{AudioChunk, SourceKind, SourceSettings};
use crate::stt::Transcriber;
use crate::translate::Translator;
use crate::{audio::AudioSource, defaults};
use crossbeam_channel::{Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of each source's chunk queue.
    pub chunk_queue_capacity: usize,
    /// Blocking timeout for the processing loop's queue poll.
    pub queue_poll: Duration,
    /// Interval between capture-source polls (live sources).
    pub capture_poll: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_queue_capacity: defaults::CHUNK_QUEUE_CAPACITY,
            queue_poll: defaults::QUEUE_POLL,
            capture_poll: defaults::CAPTURE_POLL,
        }
    }
}

/// Everything one direction needs: its audio source, language settings,
/// and service endpoints. The sink is shared between both directions.
pub struct SourceBundle {
    pub source: Box<dyn AudioSource>,
    pub settings: SourceSettings,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub glossary: Arc<Glossary>,
}

/// Handle to a running dual pipeline.
pub struct PipelineHandle {
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Stops both pipelines gracefully.
    ///
    /// Signals shutdown, then joins threads against a deadline. Threads
    /// still running afterwards are detached and die with the process.
    /// Shutdown latency is bounded by the queue poll interval.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + Duration::from_secs(2);
        let poll_interval = Duration::from_millis(50);

        loop {
            let mut remaining = Vec::new();
            for handle in self.threads.drain(..) {
                if handle.is_finished() {
                    if let Err(panic_info) = handle.join() {
                        let msg = panic_info
                            .downcast_ref::<&str>()
                            .copied()
                            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                            .unwrap_or("unknown panic");
                        error!(error = msg, "pipeline thread panicked");
                    }
                } else {
                    remaining.push(handle);
                }
            }
            self.threads = remaining;

            if self.threads.is_empty() {
                break;
            }

            if Instant::now() >= deadline {
                warn!(
                    threads = self.threads.len(),
                    "shutdown timeout, detaching remaining threads"
                );
                break;
            }

            thread::sleep(poll_interval);
        }
    }

    /// Returns true if the pipeline is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Orchestrates the two translation pipelines.
pub struct DualPipeline {
    config: PipelineConfig,
}

impl DualPipeline {
    /// Creates an orchestrator with default configuration.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Creates an orchestrator with custom configuration.
    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Starts both pipelines and returns a handle for shutdown.
    ///
    /// A source that fails to start is logged and skipped; the other
    /// pipeline still runs (a dead loopback must not silence the
    /// microphone direction). Errors only when neither source starts.
    pub fn start(
        &self,
        game: SourceBundle,
        mic: SourceBundle,
        sink: Arc<dyn TranslationSink>,
    ) -> Result<PipelineHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let mut threads = Vec::new();
        let mut started = 0;

        for bundle in [game, mic] {
            let kind = bundle.settings.kind;
            match self.spawn_source(bundle, sink.clone(), running.clone(), &mut threads) {
                Ok(()) => started += 1,
                Err(e) => {
                    error!(source = %kind, error = %e, "audio source failed to start; this direction is disabled");
                    error!(source = %kind, "check that the capture device exists and audio is playing");
                }
            }
        }

        if started == 0 {
            running.store(false, Ordering::SeqCst);
            return Err(DuotalkError::Other(
                "no audio source could be started".to_string(),
            ));
        }

        Ok(PipelineHandle { running, threads })
    }

    fn spawn_source(
        &self,
        mut bundle: SourceBundle,
        sink: Arc<dyn TranslationSink>,
        running: Arc<AtomicBool>,
        threads: &mut Vec<JoinHandle<()>>,
    ) -> Result<()> {
        bundle.source.start()?;

        let (chunk_tx, chunk_rx) = bounded::<AudioChunk>(self.config.chunk_queue_capacity);
        let kind = bundle.settings.kind;

        let capture_running = running.clone();
        let capture_poll = self.config.capture_poll;
        let source = bundle.source;
        threads.push(
            thread::Builder::new()
                .name(format!("duotalk-{kind}-capture"))
                .spawn(move || capture_loop(source, chunk_tx, capture_running, capture_poll, kind))?,
        );

        let processor = SourceProcessor::new(
            bundle.settings,
            bundle.transcriber,
            bundle.translator,
            bundle.glossary,
            sink,
        );
        let queue_poll = self.config.queue_poll;
        threads.push(
            thread::Builder::new()
                .name(format!("duotalk-{kind}-process"))
                .spawn(move || processor.run(chunk_rx, running, queue_poll))?,
        );

        Ok(())
    }
}

impl Default for DualPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls the audio source and feeds the bounded chunk queue.
///
/// When the queue is full the chunk is dropped: back-pressure must never
/// block the capture side. Repeated read errors give up on this source
/// without touching the other pipeline.
fn capture_loop(
    mut source: Box<dyn AudioSource>,
    chunk_tx: Sender<AudioChunk>,
    running: Arc<AtomicBool>,
    poll: Duration,
    kind: SourceKind,
) {
    const MAX_CONSECUTIVE_ERRORS: u32 = 10;

    let finite = source.is_finite();
    let mut sequence: u64 = 0;
    let mut consecutive_errors: u32 = 0;

    while running.load(Ordering::SeqCst) {
        let samples = match source.read_samples() {
            Ok(s) => {
                consecutive_errors = 0;
                s
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    error!(source = %kind, error = %e, "audio capture failed repeatedly, giving up on this source");
                    break;
                }
                thread::sleep(poll);
                continue;
            }
        };

        if samples.is_empty() {
            if finite {
                // File/replay source exhausted.
                break;
            }
            // Live source warming up: empty reads are normal at startup.
            thread::sleep(poll);
            continue;
        }

        let chunk = AudioChunk::new(samples, sequence);
        sequence += 1;

        if chunk_tx.try_send(chunk).is_err() {
            // Queue full (processing behind) or receiver gone.
            if !running.load(Ordering::SeqCst) {
                break;
            }
        }

        if !finite {
            thread::sleep(poll);
        }
    }

    // Receiver drains buffered chunks, then observes the disconnect.
    drop(chunk_tx);

    if let Err(e) = source.stop() {
        warn!(source = %kind, error = %e, "failed to stop audio capture");
    }
}
