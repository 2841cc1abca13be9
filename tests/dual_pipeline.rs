//! End-to-end tests: scripted audio sources through both pipelines to a
//! collector sink.

use duotalk::audio::{FramePhase, MockAudioSource};
use duotalk::config::Config;
use duotalk::glossary::Glossary;
use duotalk::pipeline::{DualPipeline, PipelineConfig, SourceBundle, SourceKind, SourceSettings};
use duotalk::stt::MockTranscriber;
use duotalk::translate::MockTranslator;
use duotalk::CollectorSink;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn speech_frame(amplitude: f32) -> Vec<f32> {
    // Square wave with a 40-sample period: ZCR inside the speech band
    (0..1024)
        .map(|i| if (i / 20) % 2 == 0 { amplitude } else { -amplitude })
        .collect()
}

fn silent_frame() -> Vec<f32> {
    vec![0.0; 1024]
}

fn fast_pipeline() -> DualPipeline {
    DualPipeline::with_config(PipelineConfig {
        queue_poll: Duration::from_millis(20),
        ..Default::default()
    })
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.language.filter_game_language = false;
    config
}

fn idle_mic_bundle(config: &Config) -> SourceBundle {
    SourceBundle {
        source: Box::new(MockAudioSource::new()),
        settings: SourceSettings::mic(config),
        transcriber: Arc::new(MockTranscriber::new("idle")),
        translator: Arc::new(MockTranslator::new("en", "ru")),
        glossary: Arc::new(Glossary::empty()),
    }
}

fn wait_for<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}

/// Pure silence in, zero service calls out: 25 chunks of 1024 zeros on the
/// game source must never reach the transcriber.
#[test]
fn silence_only_game_stream_never_calls_transcriber() {
    let config = test_config();
    let transcriber = MockTranscriber::new("mock").with_response("should never appear");
    let calls = transcriber.call_counter();

    let game = SourceBundle {
        source: Box::new(MockAudioSource::new().with_frame_sequence(vec![FramePhase {
            samples: silent_frame(),
            count: 25,
        }])),
        settings: SourceSettings::game(&config),
        transcriber: Arc::new(transcriber),
        translator: Arc::new(MockTranslator::new("ru", "en")),
        glossary: Arc::new(Glossary::empty()),
    };

    let sink = Arc::new(CollectorSink::new());
    let handle = fast_pipeline()
        .start(game, idle_mic_bundle(&config), sink.clone())
        .unwrap();

    // Let the finite stream drain and the processing loop flush
    std::thread::sleep(Duration::from_millis(300));
    handle.stop();

    assert_eq!(
        calls.load(std::sync::atomic::Ordering::SeqCst),
        0,
        "no speech in, no service call out"
    );
    assert!(sink.finals().is_empty());
    assert!(sink.previews().is_empty());
}

/// A spoken utterance followed by silence flows through transcription,
/// translation, and the glossary to the sink.
#[test]
fn game_utterance_is_translated_and_glossed() {
    let config = test_config();

    let game = SourceBundle {
        source: Box::new(MockAudioSource::new().with_frame_sequence(vec![
            FramePhase {
                samples: speech_frame(0.3),
                count: 32,
            },
            FramePhase {
                samples: silent_frame(),
                count: 12,
            },
        ])),
        settings: SourceSettings::game(&config),
        transcriber: Arc::new(
            MockTranscriber::new("mock").with_response("Нашел золотой автомат и аптечку"),
        ),
        translator: Arc::new(
            MockTranslator::new("ru", "en").with_response("Found a golden machine and a pharmacy"),
        ),
        glossary: Arc::new(Glossary::gaming_english().unwrap()),
    };

    let sink = Arc::new(CollectorSink::new());
    let handle = fast_pipeline()
        .start(game, idle_mic_bundle(&config), sink.clone())
        .unwrap();

    let sink_check = sink.clone();
    assert!(wait_for(
        || !sink_check.finals_for(SourceKind::Game).is_empty(),
        Duration::from_secs(3)
    ));
    handle.stop();

    assert_eq!(
        sink.finals_for(SourceKind::Game),
        vec!["Found a golden AR and a medkit"]
    );
}

/// Hallucinated transcripts are dropped silently: the overlay shows
/// nothing rather than subtitle credits.
#[test]
fn hallucinated_transcript_never_reaches_sink() {
    let config = test_config();

    let game = SourceBundle {
        source: Box::new(MockAudioSource::new().with_frame_sequence(vec![
            FramePhase {
                samples: speech_frame(0.3),
                count: 32,
            },
            FramePhase {
                samples: silent_frame(),
                count: 12,
            },
        ])),
        settings: SourceSettings::game(&config),
        transcriber: Arc::new(
            MockTranscriber::new("mock").with_response("Редактор субтитров Н.Закомолдина"),
        ),
        translator: Arc::new(MockTranslator::new("ru", "en").with_response("Subtitle editor")),
        glossary: Arc::new(Glossary::empty()),
    };

    let sink = Arc::new(CollectorSink::new());
    let handle = fast_pipeline()
        .start(game, idle_mic_bundle(&config), sink.clone())
        .unwrap();

    std::thread::sleep(Duration::from_millis(400));
    handle.stop();

    assert!(sink.finals().is_empty());
}

/// With the preview interval wide open and a slow transcriber, previews
/// appear while the utterance is still accumulating, and the final result
/// still arrives.
#[test]
fn previews_stream_while_buffer_grows() {
    let mut config = test_config();
    config.preview.interval_ms = 0;

    let transcriber = MockTranscriber::new("mock")
        .with_response("вижу противника")
        .with_delay(Duration::from_millis(30));

    let game = SourceBundle {
        source: Box::new(MockAudioSource::new().with_frame_sequence(vec![
            FramePhase {
                samples: speech_frame(0.3),
                count: 48,
            },
            FramePhase {
                samples: silent_frame(),
                count: 12,
            },
        ])),
        settings: SourceSettings::game(&config),
        transcriber: Arc::new(transcriber),
        translator: Arc::new(MockTranslator::new("ru", "en").with_response("I see an enemy")),
        glossary: Arc::new(Glossary::empty()),
    };

    let sink = Arc::new(CollectorSink::new());
    let handle = fast_pipeline()
        .start(game, idle_mic_bundle(&config), sink.clone())
        .unwrap();

    let sink_check = sink.clone();
    assert!(wait_for(
        || !sink_check.finals_for(SourceKind::Game).is_empty(),
        Duration::from_secs(5)
    ));
    let sink_check = sink.clone();
    wait_for(
        || !sink_check.previews().is_empty(),
        Duration::from_secs(2),
    );
    handle.stop();

    assert!(
        !sink.previews().is_empty(),
        "at least one preview should stream before the final"
    );
    assert!(
        sink.previews()
            .iter()
            .all(|(kind, text)| *kind == SourceKind::Game && text == "вижу противника")
    );
    assert_eq!(sink.finals_for(SourceKind::Game), vec!["I see an enemy"]);
}

/// Strict language filter: confidently English game audio is skipped when
/// the expected language is Russian.
#[test]
fn strict_language_filter_skips_foreign_speech() {
    let config = Config::default();
    assert!(config.language.filter_game_language);

    let game = SourceBundle {
        source: Box::new(MockAudioSource::new().with_frame_sequence(vec![
            FramePhase {
                samples: speech_frame(0.3),
                count: 32,
            },
            FramePhase {
                samples: silent_frame(),
                count: 12,
            },
        ])),
        settings: SourceSettings::game(&config),
        transcriber: Arc::new(
            MockTranscriber::new("mock")
                .with_response("english teammate chatter")
                .with_language("en")
                .with_confidence(0.95),
        ),
        translator: Arc::new(MockTranslator::new("ru", "en")),
        glossary: Arc::new(Glossary::empty()),
    };

    let sink = Arc::new(CollectorSink::new());
    let handle = fast_pipeline()
        .start(game, idle_mic_bundle(&config), sink.clone())
        .unwrap();

    std::thread::sleep(Duration::from_millis(400));
    handle.stop();

    assert!(sink.finals().is_empty());
}

/// Finals within one source arrive in chronological order.
#[test]
fn finals_preserve_order_within_a_source() {
    let config = test_config();

    // Two utterances separated by silence; the mock returns the same text
    // for both, so order is observed through the translator's phrase count.
    let game = SourceBundle {
        source: Box::new(MockAudioSource::new().with_frame_sequence(vec![
            FramePhase {
                samples: speech_frame(0.3),
                count: 32,
            },
            FramePhase {
                samples: silent_frame(),
                count: 12,
            },
            FramePhase {
                samples: speech_frame(0.2),
                count: 32,
            },
            FramePhase {
                samples: silent_frame(),
                count: 12,
            },
        ])),
        settings: SourceSettings::game(&config),
        transcriber: Arc::new(MockTranscriber::new("mock").with_response("очередная фраза тут")),
        translator: Arc::new(MockTranslator::new("ru", "en").with_response("another phrase here")),
        glossary: Arc::new(Glossary::empty()),
    };

    let sink = Arc::new(CollectorSink::new());
    let handle = fast_pipeline()
        .start(game, idle_mic_bundle(&config), sink.clone())
        .unwrap();

    let sink_check = sink.clone();
    assert!(wait_for(
        || sink_check.finals_for(SourceKind::Game).len() >= 2,
        Duration::from_secs(3)
    ));
    handle.stop();

    assert_eq!(
        sink.finals_for(SourceKind::Game),
        vec!["another phrase here", "another phrase here"]
    );
}
