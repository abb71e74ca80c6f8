//! Controller integration tests
//!
//! Drives every action against scripted collaborators; no network or audio
//! hardware needed.

use std::sync::atomic::Ordering;
use std::time::Duration;

use parley::config::RecognitionFallback;
use parley::controller::RECOGNITION_SENTINEL;
use parley::{Action, Controller, Error, NoticeLevel, Outcome, Role};
use tokio::sync::mpsc;

mod common;

use common::{
    Doubles, MockMicrophone, MockModel, MockPlayer, MockRecognizer, MockSynthesizer, eventually,
    test_settings,
};

fn controller(doubles: &Doubles) -> Controller {
    Controller::new(
        doubles.collaborators(),
        test_settings(RecognitionFallback::Abort),
    )
}

fn messages(outcome: &Outcome) -> Vec<&str> {
    outcome.notices.iter().map(|n| n.message.as_str()).collect()
}

#[tokio::test]
async fn test_chat_appends_user_and_ai_turns() {
    let doubles = Doubles::default();
    let mut controller = controller(&doubles);

    let outcome = controller.handle(Action::Chat("hello".into())).await;

    assert!(outcome.history_changed);
    assert_ne!(outcome.worst(), Some(NoticeLevel::Error));

    let turns = controller.session().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role(), Role::User);
    assert_eq!(turns[0].text(), "hello");
    assert_eq!(turns[1].role(), Role::Ai);
    assert_eq!(turns[1].text(), "echo: hello");
    assert_eq!(controller.session().last_ai_reply(), Some("echo: hello"));
}

#[tokio::test]
async fn test_history_renders_oldest_first() {
    let doubles = Doubles::default();
    let mut controller = controller(&doubles);

    controller.handle(Action::Chat("one".into())).await;
    controller.handle(Action::Chat("two".into())).await;

    let texts: Vec<&str> = controller.session().render().map(|t| t.text()).collect();
    assert_eq!(texts, vec!["one", "echo: one", "two", "echo: two"]);
    assert_eq!(controller.session().last_ai_reply(), Some("echo: two"));
}

#[tokio::test]
async fn test_empty_chat_warns_without_model_call() {
    let doubles = Doubles::default();
    let mut controller = controller(&doubles);

    let outcome = controller.handle(Action::Chat(String::new())).await;

    assert!(!outcome.history_changed);
    assert_eq!(
        messages(&outcome),
        vec!["Please type a message before clicking 'Chat'."]
    );
    assert_eq!(doubles.model.calls(), 0);
    assert!(controller.session().is_empty());
}

#[tokio::test]
async fn test_whitespace_chat_rejected_by_session() {
    let doubles = Doubles::default();
    let mut controller = controller(&doubles);

    let outcome = controller.handle(Action::Chat("   \t ".into())).await;

    assert_eq!(outcome.worst(), Some(NoticeLevel::Warning));
    assert_eq!(
        messages(&outcome),
        vec!["Please type a message or speak into the microphone."]
    );
    assert_eq!(doubles.model.calls(), 0);
    assert!(controller.session().is_empty());
}

#[tokio::test]
async fn test_unavailable_model_keeps_user_turn() {
    let doubles = Doubles {
        model: MockModel::failing(|| Error::ModelUnavailable("gone".into())),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);

    let outcome = controller.handle(Action::Chat("hi".into())).await;

    assert!(outcome.history_changed);
    assert_eq!(outcome.worst(), Some(NoticeLevel::Error));
    assert!(
        messages(&outcome)
            .iter()
            .any(|m| m.contains("'mock-model' is not available"))
    );

    let turns = controller.session().turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role(), Role::User);
    assert_eq!(controller.session().last_ai_reply(), None);
}

#[tokio::test]
async fn test_transport_failure_leaves_previous_reply() {
    let doubles = Doubles {
        model: MockModel::flaky(|| Error::Llm("connection reset".into())),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);
    controller.handle(Action::Chat("first".into())).await;

    let outcome = controller.handle(Action::Chat("second".into())).await;

    assert!(
        messages(&outcome)
            .iter()
            .any(|m| m.starts_with("Problem connecting"))
    );
    assert_eq!(controller.session().len(), 3);
    assert_eq!(controller.session().turns()[2].text(), "second");
    assert_eq!(controller.session().last_ai_reply(), Some("echo: first"));
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let doubles = Doubles {
        model: MockModel::slow(Duration::from_secs(5)),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        controller.handle(Action::Chat("hurry".into())),
    )
    .await
    .expect("controller should give up on the model");

    assert_eq!(outcome.worst(), Some(NoticeLevel::Error));
    assert!(messages(&outcome).iter().any(|m| m.contains("timed out")));
    assert_eq!(controller.session().len(), 1);
}

#[tokio::test]
async fn test_ask_me_follows_typed_path() {
    let doubles = Doubles {
        recognizer: MockRecognizer::hearing("What Is Rust"),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);

    let outcome = controller.handle(Action::AskMe).await;

    let msgs = messages(&outcome);
    assert_eq!(msgs[0], "Listening...");
    assert_eq!(msgs[1], "Recognizing...");
    assert_eq!(msgs[2], "User said: what is rust");

    assert_eq!(
        doubles.recognizer.locales.lock().unwrap().as_slice(),
        ["en-IN"]
    );
    assert_eq!(
        doubles.model.prompts.lock().unwrap().as_slice(),
        ["what is rust"]
    );
    assert_eq!(controller.session().turns()[0].text(), "what is rust");
    assert_eq!(
        controller.session().last_ai_reply(),
        Some("echo: what is rust")
    );
}

#[tokio::test]
async fn test_unintelligible_speech_aborts_by_default() {
    let doubles = Doubles {
        recognizer: MockRecognizer::failing(|| Error::Unintelligible),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);

    let outcome = controller.handle(Action::AskMe).await;

    assert!(!outcome.history_changed);
    assert!(
        messages(&outcome).contains(&"Sorry, I couldn't understand what you said.")
    );
    assert_eq!(doubles.model.calls(), 0);
    assert!(controller.session().is_empty());
}

#[tokio::test]
async fn test_recognizer_outage_is_reported() {
    let doubles = Doubles {
        recognizer: MockRecognizer::failing(|| Error::Stt("503 unavailable".into())),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);

    let outcome = controller.handle(Action::AskMe).await;

    assert_eq!(outcome.worst(), Some(NoticeLevel::Error));
    assert!(
        messages(&outcome)
            .iter()
            .any(|m| m.starts_with("Could not request results") && m.contains("503"))
    );
    assert!(controller.session().is_empty());
}

#[tokio::test]
async fn test_sentinel_fallback_submits_none() {
    let doubles = Doubles {
        recognizer: MockRecognizer::failing(|| Error::Unintelligible),
        ..Doubles::default()
    };
    let mut controller = Controller::new(
        doubles.collaborators(),
        test_settings(RecognitionFallback::Sentinel),
    );

    let outcome = controller.handle(Action::AskMe).await;

    assert!(outcome.history_changed);
    assert_eq!(
        doubles.model.prompts.lock().unwrap().as_slice(),
        [RECOGNITION_SENTINEL]
    );
    assert_eq!(controller.session().turns()[0].text(), "None");
    assert_eq!(controller.session().len(), 2);
}

#[tokio::test]
async fn test_microphone_failure_skips_recognizer() {
    let doubles = Doubles {
        microphone: MockMicrophone::failing(|| Error::Audio("no input device".into())),
        ..Doubles::default()
    };
    let mut controller = Controller::new(
        doubles.collaborators(),
        test_settings(RecognitionFallback::Sentinel),
    );

    let outcome = controller.handle(Action::AskMe).await;

    assert_eq!(outcome.worst(), Some(NoticeLevel::Error));
    assert_eq!(doubles.recognizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(doubles.model.calls(), 0);
    assert!(controller.session().is_empty());
}

#[tokio::test]
async fn test_silence_from_microphone_counts_as_unintelligible() {
    let doubles = Doubles {
        microphone: MockMicrophone::failing(|| Error::Unintelligible),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);

    let outcome = controller.handle(Action::AskMe).await;

    assert_eq!(outcome.worst(), Some(NoticeLevel::Warning));
    assert_eq!(doubles.recognizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_endless_recording_stops_listening() {
    let doubles = Doubles {
        microphone: MockMicrophone::stalled(),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);

    let outcome = tokio::time::timeout(Duration::from_secs(2), controller.handle(Action::AskMe))
        .await
        .expect("controller should stop listening");

    let msgs = messages(&outcome);
    assert_eq!(
        msgs,
        vec![
            "Listening...",
            "Stopped listening after 0.3s.",
            "Sorry, I couldn't understand what you said.",
        ]
    );
    assert!(!msgs.iter().any(|m| m.starts_with("Microphone unavailable")));
    assert_eq!(outcome.worst(), Some(NoticeLevel::Warning));
    assert!(doubles.microphone.released.load(Ordering::SeqCst));
    assert_eq!(doubles.recognizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(doubles.model.calls(), 0);
    assert!(controller.session().is_empty());
}

#[tokio::test]
async fn test_speak_without_reply_warns() {
    let doubles = Doubles::default();
    let mut controller = controller(&doubles);

    let outcome = controller.handle(Action::SpeakResponse).await;

    assert_eq!(
        messages(&outcome),
        vec!["No AI response to speak yet. Ask me a question first!"]
    );
    assert_eq!(doubles.synthesizer.calls(), 0);
    assert!(controller.finish_playback().await.is_none());
}

#[tokio::test]
async fn test_speak_plays_last_reply() {
    let doubles = Doubles::default();
    let mut controller = controller(&doubles);
    controller.handle(Action::Chat("hello".into())).await;

    let outcome = controller.handle(Action::SpeakResponse).await;
    assert_eq!(messages(&outcome), vec!["Speaking the last AI response..."]);
    assert!(!outcome.history_changed);

    let result = controller.finish_playback().await.expect("playback was started");
    assert!(result.is_ok());

    assert_eq!(
        doubles.synthesizer.requests.lock().unwrap().as_slice(),
        [("echo: hello".to_string(), "en".to_string())]
    );
    assert_eq!(doubles.player.calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.session().len(), 2);
}

#[tokio::test]
async fn test_playback_failure_reported_on_channel() {
    let doubles = Doubles {
        synthesizer: MockSynthesizer::failing(|| Error::Tts("quota exceeded".into())),
        ..Doubles::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut controller = controller(&doubles).with_notice_channel(tx);
    controller.handle(Action::Chat("hello".into())).await;

    controller.handle(Action::SpeakResponse).await;
    let result = controller.finish_playback().await.expect("playback was started");
    assert!(matches!(result, Err(Error::Tts(_))));
    assert_eq!(doubles.player.calls.load(Ordering::SeqCst), 0);

    let mut last = None;
    while let Ok(notice) = rx.try_recv() {
        last = Some(notice);
    }
    let last = last.expect("notices were sent");
    assert_eq!(last.level, NoticeLevel::Error);
    assert!(last.message.starts_with("Error playing audio"));
}

#[tokio::test]
async fn test_notices_stream_in_order() {
    let doubles = Doubles::default();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut controller = controller(&doubles).with_notice_channel(tx);

    let outcome = controller.handle(Action::AskMe).await;

    let mut streamed = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        streamed.push(notice);
    }
    assert_eq!(streamed, outcome.notices);
}

#[tokio::test]
async fn test_end_conversation_clears_history() {
    let doubles = Doubles::default();
    let mut controller = controller(&doubles);
    controller.handle(Action::Chat("hello".into())).await;

    let outcome = controller.handle(Action::EndConversation).await;

    assert!(outcome.history_changed);
    assert_eq!(
        messages(&outcome),
        vec!["Conversation ended. History cleared."]
    );
    assert!(controller.session().is_empty());
    assert_eq!(controller.session().last_ai_reply(), None);

    let outcome = controller.handle(Action::SpeakResponse).await;
    assert_eq!(outcome.worst(), Some(NoticeLevel::Warning));
    assert_eq!(doubles.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_end_on_empty_session_is_harmless() {
    let doubles = Doubles::default();
    let mut controller = controller(&doubles);

    controller.handle(Action::EndConversation).await;
    controller.handle(Action::EndConversation).await;

    assert!(controller.session().is_empty());
}

#[tokio::test]
async fn test_new_action_interrupts_playback() {
    let doubles = Doubles {
        player: MockPlayer::holding(),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);
    controller.handle(Action::Chat("hello".into())).await;

    controller.handle(Action::SpeakResponse).await;
    let player = doubles.player.clone();
    assert!(eventually(|| player.calls.load(Ordering::SeqCst) == 1).await);
    assert!(controller.is_playing());

    controller.handle(Action::EndConversation).await;

    assert!(eventually(|| player.cancelled.load(Ordering::SeqCst)).await);
    assert!(controller.session().is_empty());
}

#[tokio::test]
async fn test_interrupt_then_finish() {
    let doubles = Doubles {
        player: MockPlayer::holding(),
        ..Doubles::default()
    };
    let mut controller = controller(&doubles);
    controller.handle(Action::Chat("hello".into())).await;
    controller.handle(Action::SpeakResponse).await;

    let player = doubles.player.clone();
    assert!(eventually(|| player.calls.load(Ordering::SeqCst) == 1).await);

    assert!(controller.interrupt_playback());
    assert!(!controller.interrupt_playback());
    assert!(eventually(|| player.cancelled.load(Ordering::SeqCst)).await);
}
