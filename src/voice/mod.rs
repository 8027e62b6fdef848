//! Voice input and output
//!
//! The microphone is read continuously; an energy-based detector cuts the
//! stream into utterances, which are transcribed with Whisper. Replies are
//! synthesized with `OpenAI` TTS and played on the default output device.

mod capture;
mod playback;
mod stt;
mod tts;
mod vad;
mod wake_word;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3, tone};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use vad::{DetectorState, SpeechDetector};
pub use wake_word::WakeWord;
