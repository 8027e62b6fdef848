//! Energy-based utterance segmentation
//!
//! Audio is fed in small chunks. A segment starts on the first loud chunk
//! and ends after half a second of silence, or when the phrase limit is hit.

use super::SAMPLE_RATE;

/// RMS energy above which a chunk counts as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum amount of speech in a segment (0.3 seconds at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends a segment (0.5 seconds at 16kHz)
const SILENCE_SAMPLES: usize = 8000;

/// State of the speech detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Inside a segment
    Speaking,
}

/// Cuts a continuous sample stream into utterances
#[derive(Debug)]
pub struct SpeechDetector {
    state: DetectorState,
    buffer: Vec<f32>,
    speech_samples: usize,
    silence_samples: usize,
    max_samples: usize,
    threshold: f32,
}

impl SpeechDetector {
    /// Create a detector that caps segments at `phrase_limit_secs`
    #[must_use]
    pub fn new(phrase_limit_secs: f32) -> Self {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let max_samples = (phrase_limit_secs.max(0.5) * SAMPLE_RATE as f32) as usize;

        Self {
            state: DetectorState::Idle,
            buffer: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
            max_samples,
            threshold: ENERGY_THRESHOLD,
        }
    }

    /// Override the speech energy threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Feed a chunk of samples
    ///
    /// Returns the finished segment, including its trailing silence, once one
    /// completes.
    pub fn process(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let energy = rms_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.speech_samples = samples.len();
                    self.silence_samples = 0;
                    tracing::trace!(energy, "speech started");
                }
                None
            }
            DetectorState::Speaking => {
                self.buffer.extend_from_slice(samples);
                if is_speech {
                    self.speech_samples += samples.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }

                let enough_speech = self.speech_samples >= MIN_SPEECH_SAMPLES;
                if enough_speech
                    && (self.silence_samples > SILENCE_SAMPLES || self.buffer.len() >= self.max_samples)
                {
                    tracing::debug!(
                        samples = self.buffer.len(),
                        limited = self.buffer.len() >= self.max_samples,
                        "speech segment complete"
                    );
                    let segment = std::mem::take(&mut self.buffer);
                    self.reset();
                    return Some(segment);
                }

                // Blip too short to be speech, or runaway without a pause
                if self.silence_samples > SILENCE_SAMPLES * 2 || self.buffer.len() >= self.max_samples {
                    tracing::trace!("discarding segment");
                    self.reset();
                }
                None
            }
        }
    }

    /// Drop any partial segment
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.buffer.clear();
        self.speech_samples = 0;
        self.silence_samples = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }
}

/// RMS energy of a chunk
#[allow(clippy::cast_precision_loss)]
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
