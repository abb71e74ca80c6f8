//! Voice processing module
//!
//! Handles microphone capture, end-of-utterance detection, speech-to-text,
//! text-to-speech, and speaker playback.

mod capture;
mod playback;
mod stt;
mod tts;
mod vad;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3};
pub use stt::SpeechToText;
pub use tts::{TextToSpeech, chunk_text};
pub use vad::{DetectorState, UtteranceDetector, calculate_rms};
