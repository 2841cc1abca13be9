use crate::error::{DuotalkError, Result};

/// Trait for audio source devices.
///
/// Implementations deliver float32 mono samples at a fixed rate and are
/// polled by the orchestrator's capture thread. Real sources (WASAPI
/// loopback, microphone) live in the host application; this crate ships a
/// mock and a WAV replay source.
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    ///
    /// Must be safe to call even if `start` never succeeded.
    fn stop(&mut self) -> Result<()>;

    /// Read the next batch of samples. An empty vector means no audio is
    /// available right now (live source warming up) or the source is
    /// exhausted (finite source).
    fn read_samples(&mut self) -> Result<Vec<f32>>;

    /// Sample rate of the delivered audio in Hz.
    fn sample_rate(&self) -> u32;

    /// Whether this source ends on its own (file replay) rather than
    /// producing audio until stopped (live device).
    fn is_finite(&self) -> bool {
        false
    }
}

/// One phase of scripted mock output: `samples` repeated `count` times.
#[derive(Debug, Clone)]
pub struct FramePhase {
    pub samples: Vec<f32>,
    pub count: usize,
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    phases: Vec<FramePhase>,
    phase_index: usize,
    phase_remaining: usize,
    live: bool,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source with no scripted frames.
    pub fn new() -> Self {
        Self {
            is_started: false,
            phases: Vec::new(),
            phase_index: 0,
            phase_remaining: 0,
            live: false,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Script a sequence of frame phases played back in order.
    pub fn with_frame_sequence(mut self, phases: Vec<FramePhase>) -> Self {
        self.phase_remaining = phases.first().map(|p| p.count).unwrap_or(0);
        self.phases = phases;
        self.phase_index = 0;
        self
    }

    /// Treat the source as live: exhausting the script yields empty reads
    /// instead of ending the source.
    pub fn as_live_source(mut self) -> Self {
        self.live = true;
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on every read.
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started.
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(DuotalkError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<f32>> {
        if self.should_fail_read {
            return Err(DuotalkError::AudioCapture {
                message: self.error_message.clone(),
            });
        }

        while self.phase_index < self.phases.len() {
            if self.phase_remaining > 0 {
                self.phase_remaining -= 1;
                return Ok(self.phases[self.phase_index].samples.clone());
            }
            self.phase_index += 1;
            self.phase_remaining = self
                .phases
                .get(self.phase_index)
                .map(|p| p.count)
                .unwrap_or(0);
        }

        Ok(Vec::new())
    }

    fn sample_rate(&self) -> u32 {
        crate::defaults::SAMPLE_RATE
    }

    fn is_finite(&self) -> bool {
        !self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_plays_phases_in_order() {
        let mut source = MockAudioSource::new().with_frame_sequence(vec![
            FramePhase {
                samples: vec![0.5; 4],
                count: 2,
            },
            FramePhase {
                samples: vec![0.0; 4],
                count: 1,
            },
        ]);

        assert_eq!(source.read_samples().unwrap(), vec![0.5; 4]);
        assert_eq!(source.read_samples().unwrap(), vec![0.5; 4]);
        assert_eq!(source.read_samples().unwrap(), vec![0.0; 4]);
        assert!(source.read_samples().unwrap().is_empty());
    }

    #[test]
    fn test_mock_without_script_reads_empty() {
        let mut source = MockAudioSource::new();
        assert!(source.read_samples().unwrap().is_empty());
    }

    #[test]
    fn test_mock_finite_by_default_live_when_configured() {
        let source = MockAudioSource::new();
        assert!(source.is_finite());

        let source = MockAudioSource::new().as_live_source();
        assert!(!source.is_finite());
    }

    #[test]
    fn test_mock_start_stop_state() {
        let mut source = MockAudioSource::new();
        assert!(!source.is_started());
        source.start().unwrap();
        assert!(source.is_started());
        source.stop().unwrap();
        assert!(!source.is_started());
    }

    #[test]
    fn test_mock_start_failure() {
        let mut source = MockAudioSource::new()
            .with_start_failure()
            .with_error_message("no loopback device");

        let result = source.start();
        assert!(!source.is_started());
        match result {
            Err(DuotalkError::AudioCapture { message }) => {
                assert_eq!(message, "no loopback device");
            }
            _ => panic!("Expected AudioCapture error"),
        }

        // Stop must be safe even though start failed
        assert!(source.stop().is_ok());
    }

    #[test]
    fn test_mock_read_failure() {
        let mut source = MockAudioSource::new().with_read_failure();
        assert!(source.read_samples().is_err());
    }

    #[test]
    fn test_mock_empty_phase_is_skipped() {
        let mut source = MockAudioSource::new().with_frame_sequence(vec![
            FramePhase {
                samples: vec![0.1; 4],
                count: 0,
            },
            FramePhase {
                samples: vec![0.2; 4],
                count: 1,
            },
        ]);

        assert_eq!(source.read_samples().unwrap(), vec![0.2; 4]);
    }

    #[test]
    fn test_audio_source_trait_is_object_safe() {
        let mut source: Box<dyn AudioSource> =
            Box::new(MockAudioSource::new().with_frame_sequence(vec![FramePhase {
                samples: vec![0.3; 8],
                count: 1,
            }]));

        source.start().unwrap();
        assert_eq!(source.read_samples().unwrap().len(), 8);
        assert_eq!(source.sample_rate(), 16000);
        source.stop().unwrap();
    }
}
