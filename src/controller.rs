//! Interaction controller
//!
//! Maps the four user actions (chat, ask by voice, speak the last reply, end
//! the conversation) onto session transitions and collaborator calls. One
//! action is handled per call; every collaborator call is bounded by a
//! timeout, and playback runs in the background so the next action can
//! interrupt it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RecognitionFallback, TimeoutConfig};
use crate::providers::{Collaborators, Player, Synthesizer};
use crate::session::Session;
use crate::{Error, Result};

/// Transcript submitted in place of a failed recognition under
/// [`RecognitionFallback::Sentinel`]
pub const RECOGNITION_SENTINEL: &str = "None";

/// A user-facing action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Submit typed text
    Chat(String),
    /// Record and submit spoken input
    AskMe,
    /// Read the last AI reply aloud
    SpeakResponse,
    /// Clear the session
    EndConversation,
}

/// Severity of a notice shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message for the user produced while handling an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Result of handling one action
#[derive(Debug, Default)]
pub struct Outcome {
    /// Messages to show, in order
    pub notices: Vec<Notice>,
    /// The conversation log changed and should be re-rendered
    pub history_changed: bool,
}

impl Outcome {
    fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Highest severity among the notices, if any
    #[must_use]
    pub fn worst(&self) -> Option<NoticeLevel> {
        self.notices
            .iter()
            .map(|n| n.level)
            .max_by_key(|level| match level {
                NoticeLevel::Info => 0,
                NoticeLevel::Success => 1,
                NoticeLevel::Warning => 2,
                NoticeLevel::Error => 3,
            })
    }
}

/// Controller knobs taken from configuration
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Locale tag for speech recognition
    pub locale: String,
    /// Language tag for speech synthesis
    pub language: String,
    pub timeouts: TimeoutConfig,
    pub recognition_fallback: RecognitionFallback,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            locale: crate::config::DEFAULT_LOCALE.to_string(),
            language: crate::config::DEFAULT_LANGUAGE.to_string(),
            timeouts: TimeoutConfig::default(),
            recognition_fallback: RecognitionFallback::default(),
        }
    }
}

impl ControllerSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            locale: config.stt.locale.clone(),
            language: config.tts.language.clone(),
            timeouts: config.timeouts,
            recognition_fallback: config.recognition_fallback,
        }
    }
}

/// Background playback of the last reply
struct PlaybackTask {
    cancel: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

/// Owns the session and drives the collaborators
pub struct Controller {
    session: Session,
    collaborators: Collaborators,
    settings: ControllerSettings,
    playback: Option<PlaybackTask>,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl Controller {
    /// Create a controller with an empty session
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: ControllerSettings) -> Self {
        Self {
            session: Session::new(),
            collaborators,
            settings,
            playback: None,
            notices: None,
        }
    }

    /// Send every notice to `tx` as soon as it is produced
    ///
    /// Background playback failures are only reported through this channel.
    #[must_use]
    pub fn with_notice_channel(mut self, tx: mpsc::UnboundedSender<Notice>) -> Self {
        self.notices = Some(tx);
        self
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Handle one user action
    ///
    /// Never fails: every collaborator error becomes a notice and a log line.
    /// Any playback still running is interrupted first.
    pub async fn handle(&mut self, action: Action) -> Outcome {
        self.interrupt_playback();

        match action {
            Action::Chat(text) => self.chat(text).await,
            Action::AskMe => self.ask_me().await,
            Action::SpeakResponse => self.speak_response(),
            Action::EndConversation => self.end_conversation(),
        }
    }

    async fn chat(&mut self, text: String) -> Outcome {
        let mut outcome = Outcome::default();

        if text.is_empty() {
            self.notify(
                &mut outcome,
                Notice::warning("Please type a message before clicking 'Chat'."),
            );
            return outcome;
        }

        self.respond(text, &mut outcome).await;
        outcome
    }

    async fn ask_me(&mut self) -> Outcome {
        let mut outcome = Outcome::default();

        self.notify(&mut outcome, Notice::info("Listening..."));
        let microphone = Arc::clone(&self.collaborators.microphone);
        let limit = self.settings.timeouts.recording;
        let clip = match tokio::time::timeout(limit, microphone.record()).await {
            Ok(clip) => clip,
            Err(_) => {
                tracing::warn!(limit_secs = limit.as_secs_f32(), "stopped listening");
                self.notify(
                    &mut outcome,
                    Notice::warning(format!(
                        "Stopped listening after {}s.",
                        limit.as_secs_f32()
                    )),
                );
                Err(Error::Unintelligible)
            }
        };

        let transcript = match clip {
            Ok(clip) => {
                self.notify(&mut outcome, Notice::info("Recognizing..."));
                let recognizer = Arc::clone(&self.collaborators.recognizer);
                bounded(
                    self.settings.timeouts.recognition,
                    Stage::Recognition,
                    recognizer.transcribe(&clip, &self.settings.locale),
                )
                .await
            }
            Err(Error::Unintelligible) => Err(Error::Unintelligible),
            Err(e) => {
                tracing::error!(error = %e, "microphone capture failed");
                self.notify(
                    &mut outcome,
                    Notice::error(format!("Microphone unavailable: {e}")),
                );
                return outcome;
            }
        };

        match transcript {
            Ok(text) => {
                let text = text.to_lowercase();
                self.notify(&mut outcome, Notice::success(format!("User said: {text}")));
                self.respond(text, &mut outcome).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, fallback = ?self.settings.recognition_fallback, "speech recognition failed");
                self.notify(&mut outcome, recognition_notice(&e));

                match self.settings.recognition_fallback {
                    RecognitionFallback::Abort => {}
                    RecognitionFallback::Sentinel => {
                        self.respond(RECOGNITION_SENTINEL.to_string(), &mut outcome)
                            .await;
                    }
                }
            }
        }

        outcome
    }

    /// Typed-text path shared by chat and spoken input
    async fn respond(&mut self, text: String, outcome: &mut Outcome) {
        if let Err(e) = self.session.append_user_turn(text.as_str()) {
            let message = match e {
                Error::Validation(message) => message,
                other => other.to_string(),
            };
            self.notify(outcome, Notice::warning(message));
            return;
        }
        outcome.history_changed = true;

        let model = Arc::clone(&self.collaborators.model);
        self.notify(
            outcome,
            Notice::info(format!("Using model: {}", model.model_name())),
        );

        let reply = bounded(
            self.settings.timeouts.model,
            Stage::Model,
            model.generate(&text),
        )
        .await
        .and_then(|reply| {
            self.session.append_ai_turn(reply.as_str())?;
            Ok(reply)
        });

        match reply {
            Ok(reply) => {
                tracing::info!(model = model.model_name(), reply_len = reply.len(), "exchange complete");
            }
            Err(e) => {
                tracing::error!(model = model.model_name(), error = %e, "language model call failed");
                let message = match &e {
                    Error::ModelUnavailable(_) => format!(
                        "Model '{}' is not available or supported for your API key or region: {e}",
                        model.model_name()
                    ),
                    _ => format!(
                        "Problem connecting to or processing data with the language model: {e}"
                    ),
                };
                self.notify(outcome, Notice::error(message));
            }
        }
    }

    fn speak_response(&mut self) -> Outcome {
        let mut outcome = Outcome::default();

        let Some(reply) = self.session.last_ai_reply() else {
            self.notify(
                &mut outcome,
                Notice::warning("No AI response to speak yet. Ask me a question first!"),
            );
            return outcome;
        };

        self.notify(&mut outcome, Notice::info("Speaking the last AI response..."));

        let text = reply.to_string();
        let synthesizer = Arc::clone(&self.collaborators.synthesizer);
        let player = Arc::clone(&self.collaborators.player);
        let language = self.settings.language.clone();
        let limit = self.settings.timeouts.synthesis;
        let notices = self.notices.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let result = speak(synthesizer, player, &text, &language, limit, token).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "audio playback error");
                if let Some(tx) = notices {
                    let _ = tx.send(Notice::error(format!("Error playing audio: {e}")));
                }
            }
            result
        });

        self.playback = Some(PlaybackTask { cancel, handle });
        outcome
    }

    fn end_conversation(&mut self) -> Outcome {
        self.session.clear();
        tracing::info!("conversation cleared");

        let mut outcome = Outcome {
            history_changed: true,
            ..Outcome::default()
        };
        self.notify(
            &mut outcome,
            Notice::success("Conversation ended. History cleared."),
        );
        outcome
    }

    /// Record a notice and forward it to the live channel, if any
    fn notify(&self, outcome: &mut Outcome, notice: Notice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice.clone());
        }
        outcome.push(notice);
    }

    /// Cancel playback that is still running
    ///
    /// Returns true if something was interrupted
    pub fn interrupt_playback(&mut self) -> bool {
        let Some(task) = self.playback.take() else {
            return false;
        };

        if task.handle.is_finished() {
            return false;
        }

        task.cancel.cancel();
        tracing::debug!("playback interrupted");
        true
    }

    /// Whether a playback task is still running
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Wait for the current playback to end
    ///
    /// Returns `None` if nothing was playing
    pub async fn finish_playback(&mut self) -> Option<Result<()>> {
        let task = self.playback.take()?;
        Some(
            task.handle
                .await
                .unwrap_or_else(|e| Err(Error::Audio(format!("playback task failed: {e}")))),
        )
    }
}

/// Synthesize then play, stopping early if `cancel` fires
async fn speak(
    synthesizer: Arc<dyn Synthesizer>,
    player: Arc<dyn Player>,
    text: &str,
    language: &str,
    limit: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::debug!(chars = text.len(), language, "speaking");

    let clip = tokio::select! {
        clip = bounded(limit, Stage::Synthesis, synthesizer.synthesize(text, language)) => clip?,
        () = cancel.cancelled() => return Ok(()),
    };

    player.play(clip, cancel).await
}

/// Collaborator stage, for timeout errors
#[derive(Debug, Clone, Copy)]
enum Stage {
    Recognition,
    Model,
    Synthesis,
}

impl Stage {
    fn timeout(self, limit: Duration) -> Error {
        let message = format!("timed out after {}s", limit.as_secs_f32());
        match self {
            Self::Recognition => Error::Stt(message),
            Self::Model => Error::Llm(message),
            Self::Synthesis => Error::Tts(message),
        }
    }
}

/// Run `fut` with an upper bound on its duration
async fn bounded<T>(
    limit: Duration,
    stage: Stage,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        tracing::warn!(?stage, limit_secs = limit.as_secs_f32(), "collaborator call timed out");
        Err(stage.timeout(limit))
    })
}

fn recognition_notice(error: &Error) -> Notice {
    match error {
        Error::Unintelligible => Notice::warning("Sorry, I couldn't understand what you said."),
        Error::Stt(reason) => Notice::error(format!(
            "Could not request results from the speech recognition service; {reason}"
        )),
        other => Notice::error(format!("Please say again... ({other})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_notice() {
        let mut outcome = Outcome::default();
        assert_eq!(outcome.worst(), None);

        outcome.push(Notice::info("a"));
        outcome.push(Notice::error("b"));
        outcome.push(Notice::warning("c"));
        assert_eq!(outcome.worst(), Some(NoticeLevel::Error));
    }

    #[test]
    fn test_timeout_maps_to_stage_family() {
        use crate::ErrorKind;

        let limit = Duration::from_secs(1);
        assert_eq!(Stage::Recognition.timeout(limit).kind(), ErrorKind::Recognition);
        assert_eq!(Stage::Model.timeout(limit).kind(), ErrorKind::Model);
        assert_eq!(Stage::Synthesis.timeout(limit).kind(), ErrorKind::Playback);
    }

    #[test]
    fn test_recognition_notices() {
        assert_eq!(
            recognition_notice(&Error::Unintelligible).level,
            NoticeLevel::Warning
        );
        assert_eq!(
            recognition_notice(&Error::Stt("offline".into())).level,
            NoticeLevel::Error
        );
    }
}
