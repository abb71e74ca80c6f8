//! Parley - terminal chat with a hosted language model, by text or voice
//!
//! This library provides the pieces behind the `parley` binary:
//! - Conversation session state (ordered turns and the last AI reply)
//! - An interaction controller mapping user actions to collaborator calls
//! - Collaborator clients: Gemini, Whisper/Deepgram STT, Google/OpenAI/ElevenLabs TTS
//! - Microphone capture and speaker playback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Terminal (repl)                      │
//! │   text  │  /ask  │  /speak  │  /end                 │
//! └────────────────────┬────────────────────────────────┘
//!                      │ Action
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Controller                          │
//! │   Session  │  timeouts  │  background playback      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Collaborators                        │
//! │   Microphone  │  Recognizer  │  LLM  │  TTS  │  Player │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod providers;
pub mod repl;
pub mod session;
pub mod setup;
pub mod voice;

pub use config::Config;
pub use controller::{Action, Controller, ControllerSettings, Notice, NoticeLevel, Outcome};
pub use error::{Error, ErrorKind, Result};
pub use providers::{
    Collaborators, GeminiClient, LanguageModel, Microphone, Player, Recognizer, Synthesizer,
};
pub use session::{Role, Session, Turn};
