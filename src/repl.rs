//! Terminal front end
//!
//! Reads one line at a time from stdin. Plain text is a chat message; slash
//! commands trigger the voice actions. Notices are printed as soon as the
//! controller emits them, and the conversation log is re-rendered whenever
//! it changes.

use std::fmt::Write as _;
use std::io::Write as _;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::Result;
use crate::controller::{Action, Controller, Notice, NoticeLevel};
use crate::session::Session;

const HELP: &str = "\
Type a message and press Enter to chat.

Commands:
  /ask     Speak a question into the microphone
  /speak   Read the last AI reply aloud
  /end     End the conversation and clear history
  /help    Show this help
  /quit    Exit";

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Ask,
    Speak,
    End,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    /// The controller action for this command, if it has one
    #[must_use]
    pub fn into_action(self) -> Option<Action> {
        match self {
            Self::Chat(text) => Some(Action::Chat(text)),
            Self::Ask => Some(Action::AskMe),
            Self::Speak => Some(Action::SpeakResponse),
            Self::End => Some(Action::EndConversation),
            Self::Help | Self::Quit | Self::Unknown(_) => None,
        }
    }
}

/// Parse one line of input
///
/// Anything not starting with `/` is chat text, passed through unchanged so
/// whitespace-only input still reaches validation.
#[must_use]
pub fn parse_command(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(command) = line.trim().strip_prefix('/') else {
        return Command::Chat(line.to_string());
    };

    match command.to_ascii_lowercase().as_str() {
        "ask" | "a" => Command::Ask,
        "speak" | "s" => Command::Speak,
        "end" | "clear" => Command::End,
        "help" | "h" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Render the conversation log, oldest turn first
#[must_use]
pub fn render_log(session: &Session) -> String {
    let mut out = String::from("\nConversation Log:\n");

    if session.is_empty() {
        out.push_str("  (empty)\n");
        return out;
    }

    for turn in session.render() {
        let at = turn.at().with_timezone(&Local).format("%H:%M:%S");
        let _ = writeln!(out, "[{at}] {}: {}", turn.role().label(), turn.text());
    }

    out
}

/// Format a notice for the terminal
#[must_use]
pub fn format_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Info => "..",
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "!!",
        NoticeLevel::Error => "error",
    };
    format!("[{tag}] {}", notice.message)
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Run the interactive loop until `/quit` or end of input
///
/// `notices` must be the receiving end of the channel attached to
/// `controller` via [`Controller::with_notice_channel`].
///
/// # Errors
///
/// Returns error if reading stdin fails
pub async fn run(
    mut controller: Controller,
    mut notices: mpsc::UnboundedReceiver<Notice>,
) -> Result<()> {
    println!("Parley - chat by text or voice. Type /help for commands.");
    print!("{}", render_log(controller.session()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some(notice) = notices.recv() => {
                println!("\n{}", format_notice(&notice));
                continue;
            }
        };

        let Some(line) = line else {
            println!();
            break;
        };

        let action = match parse_command(&line) {
            Command::Quit => break,
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::Unknown(name) => {
                println!("Unknown command: /{name} (try /help)");
                continue;
            }
            command => match command.into_action() {
                Some(action) => action,
                None => continue,
            },
        };

        tracing::debug!(?action, "handling action");

        let outcome = {
            let handling = controller.handle(action);
            tokio::pin!(handling);

            loop {
                tokio::select! {
                    outcome = &mut handling => break outcome,
                    Some(notice) = notices.recv() => println!("{}", format_notice(&notice)),
                }
            }
        };

        while let Ok(notice) = notices.try_recv() {
            println!("{}", format_notice(&notice));
        }

        if outcome.history_changed {
            print!("{}", render_log(controller.session()));
        }
    }

    if controller.interrupt_playback() {
        tracing::debug!("stopped playback on exit");
    }

    Ok(())
}
