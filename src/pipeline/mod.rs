//! Dual translation pipeline.
//!
//! One capture thread and one processing thread per audio source,
//! connected by a bounded crossbeam channel for backpressure. The two
//! directions share nothing but the sink and the running flag.

pub mod latency;
pub mod orchestrator;
pub mod processor;
pub mod sink;
pub mod types;

pub use latency::{LatencyStats, LatencyTracker, UtteranceTiming};
pub use orchestrator::{DualPipeline, PipelineConfig, PipelineHandle, SourceBundle};
pub use processor::SourceProcessor;
pub use sink::{CollectorSink, LogSink, TranslationSink};
pub use types::{AudioChunk, SourceKind, SourceSettings};
