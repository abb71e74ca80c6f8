//! End-of-utterance detection
//!
//! Energy-based: a chunk louder than the threshold counts as speech, and an
//! utterance ends once enough speech has been followed by a long enough pause.

use std::time::Duration;

/// Minimum voiced audio for an utterance to count
const MIN_SPEECH_SECS: f32 = 0.3;

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Speech started, accumulating until a pause
    Speaking,
    /// Speech followed by a pause; utterance ready to take
    Complete,
}

/// Detects a single spoken utterance in a stream of sample chunks
pub struct UtteranceDetector {
    energy_threshold: f32,
    pause_samples: usize,
    min_speech_samples: usize,
    max_samples: Option<usize>,
    sample_rate: u32,
    state: DetectorState,
    buffer: Vec<f32>,
    voiced_samples: usize,
    silence_counter: usize,
}

impl UtteranceDetector {
    /// Create a detector
    ///
    /// # Arguments
    ///
    /// * `energy_threshold` - RMS level above which a chunk is speech
    /// * `pause` - silence that ends an utterance
    /// * `sample_rate` - sample rate of the incoming chunks
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(energy_threshold: f32, pause: Duration, sample_rate: u32) -> Self {
        let rate = sample_rate as f32;
        Self {
            energy_threshold,
            pause_samples: (pause.as_secs_f32() * rate) as usize,
            min_speech_samples: (MIN_SPEECH_SECS * rate) as usize,
            max_samples: None,
            sample_rate,
            state: DetectorState::Idle,
            buffer: Vec::new(),
            voiced_samples: 0,
            silence_counter: 0,
        }
    }

    /// End the utterance once it reaches `max` even if no pause is heard
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn with_max_utterance(mut self, max: Duration) -> Self {
        self.max_samples = Some((max.as_secs_f32() * self.sample_rate as f32) as usize);
        self
    }

    /// Feed a chunk of samples
    ///
    /// Returns true once the utterance is complete
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_rms(samples);
        let is_speech = energy > self.energy_threshold;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.voiced_samples = samples.len();
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected");
                }
            }
            DetectorState::Speaking => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.voiced_samples += samples.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                let too_long = self
                    .max_samples
                    .is_some_and(|max| self.buffer.len() >= max);

                if self.silence_counter >= self.pause_samples || too_long {
                    if self.voiced_samples >= self.min_speech_samples {
                        tracing::debug!(samples = self.buffer.len(), cut_off = too_long, "utterance complete");
                        self.state = DetectorState::Complete;
                    } else {
                        // Too short to be speech; a click or a cough
                        tracing::trace!("discarding short noise burst");
                        self.reset();
                    }
                }
            }
            DetectorState::Complete => {}
        }

        self.state == DetectorState::Complete
    }

    /// Take the accumulated utterance and return to idle
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.buffer);
        self.reset();
        utterance
    }

    /// Accumulated samples so far
    #[must_use]
    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    /// Reset detector to idle state
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.buffer.clear();
        self.voiced_samples = 0;
        self.silence_counter = 0;
    }

    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }
}

/// Calculate RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
