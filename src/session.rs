//! Conversation session state
//!
//! Holds the ordered turns of one conversation and the most recent AI reply.
//! Pure data: no IO, no collaborators.

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Typed or spoken by the person at the keyboard
    User,
    /// Generated by the language model
    Ai,
}

impl Role {
    /// Label used in the conversation log
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Ai => "AI",
        }
    }
}

/// One utterance in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    text: String,
    at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, text: String) -> Self {
        Self {
            role,
            text,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// When the turn was recorded
    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Single-user conversation history plus the replay pointer
///
/// `last_ai_reply` is `Some` exactly when an AI turn exists, and always holds
/// the text of the latest one.
#[derive(Debug, Clone, Default)]
pub struct Session {
    turns: Vec<Turn>,
    last_ai_reply: Option<String>,
}

impl Session {
    /// Create an empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `text` is empty or whitespace-only;
    /// the session is left untouched
    pub fn append_user_turn(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::Validation(
                "Please type a message or speak into the microphone.".to_string(),
            ));
        }

        self.turns.push(Turn::new(Role::User, text));
        Ok(())
    }

    /// Append an AI turn and make it the replay target
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `text` is empty or whitespace-only
    pub fn append_ai_turn(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::Validation("empty model reply".to_string()));
        }

        self.last_ai_reply = Some(text.clone());
        self.turns.push(Turn::new(Role::Ai, text));
        Ok(())
    }

    /// Drop all turns and the replay pointer
    pub fn clear(&mut self) {
        self.turns.clear();
        self.last_ai_reply = None;
    }

    /// Turns in conversation order, for display
    pub fn render(&self) -> impl Iterator<Item = &Turn> + '_ {
        self.turns.iter()
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Text of the latest AI turn, if any
    #[must_use]
    pub fn last_ai_reply(&self) -> Option<&str> {
        self.last_ai_reply.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
