//! Shared test utilities
//!
//! Scripted collaborators that count their calls and record their inputs.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use parley::config::{RecognitionFallback, TimeoutConfig};
use parley::{
    Collaborators, ControllerSettings, Error, LanguageModel, Microphone, Player, Recognizer,
    Result, Synthesizer,
};

/// Builds the error a failing double returns
pub type Failure = fn() -> Error;

pub struct MockMicrophone {
    pub calls: AtomicUsize,
    /// Set once a stalled recording is abandoned by its caller
    pub released: AtomicBool,
    failure: Option<Failure>,
    /// Never finish recording
    stall: bool,
}

impl MockMicrophone {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            failure: None,
            stall: false,
        })
    }

    pub fn failing(failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            failure: Some(failure),
            stall: false,
        })
    }

    /// Keeps "hearing" speech until the caller gives up
    pub fn stalled() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            failure: None,
            stall: true,
        })
    }
}

struct Release<'a>(&'a AtomicBool);

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Microphone for MockMicrophone {
    async fn record(&self) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            let _release = Release(&self.released);
            std::future::pending::<()>().await;
        }
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(b"RIFF fake wav".to_vec()),
        }
    }
}

pub struct MockRecognizer {
    pub calls: AtomicUsize,
    pub locales: Mutex<Vec<String>>,
    reply: std::result::Result<String, Failure>,
}

impl MockRecognizer {
    pub fn hearing(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            locales: Mutex::new(Vec::new()),
            reply: Ok(transcript.to_string()),
        })
    }

    pub fn failing(failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            locales: Mutex::new(Vec::new()),
            reply: Err(failure),
        })
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn transcribe(&self, _wav: &[u8], locale: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.locales.lock().unwrap().push(locale.to_string());
        self.reply.clone().map_err(|failure| failure())
    }
}

pub struct MockModel {
    pub prompts: Mutex<Vec<String>>,
    reply: std::result::Result<String, Failure>,
    delay: Duration,
    /// Fail every call after the first
    fail_after_first: Option<Failure>,
}

impl MockModel {
    /// Replies with "echo: <prompt>"
    pub fn echo() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: Ok(String::new()),
            delay: Duration::ZERO,
            fail_after_first: None,
        })
    }

    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            fail_after_first: None,
        })
    }

    pub fn failing(failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: Err(failure),
            delay: Duration::ZERO,
            fail_after_first: None,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: Ok("late".to_string()),
            delay,
            fail_after_first: None,
        })
    }

    /// Echoes once, then fails
    pub fn flaky(failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: Ok(String::new()),
            delay: Duration::ZERO,
            fail_after_first: Some(failure),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let calls = {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            prompts.len()
        };
        if let Some(failure) = self.fail_after_first
            && calls > 1
        {
            return Err(failure());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Ok(reply) if reply.is_empty() => Ok(format!("echo: {prompt}")),
            Ok(reply) => Ok(reply.clone()),
            Err(failure) => Err(failure()),
        }
    }
}

pub struct MockSynthesizer {
    /// (text, language) pairs
    pub requests: Mutex<Vec<(String, String)>>,
    failure: Option<Failure>,
}

impl MockSynthesizer {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            failure: None,
        })
    }

    pub fn failing(failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            failure: Some(failure),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string()));
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(b"ID3 fake mp3".to_vec()),
        }
    }
}

pub struct MockPlayer {
    pub calls: AtomicUsize,
    pub cancelled: AtomicBool,
    /// Play until cancelled instead of returning at once
    hold: bool,
}

impl MockPlayer {
    pub fn instant() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            hold: false,
        })
    }

    pub fn holding() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            hold: true,
        })
    }
}

#[async_trait]
impl Player for MockPlayer {
    async fn play(&self, _clip: Vec<u8>, cancel: CancellationToken) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hold {
            cancel.cancelled().await;
            self.cancelled.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Handles to every double behind a [`Collaborators`] bundle
pub struct Doubles {
    pub microphone: Arc<MockMicrophone>,
    pub recognizer: Arc<MockRecognizer>,
    pub model: Arc<MockModel>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub player: Arc<MockPlayer>,
}

impl Default for Doubles {
    fn default() -> Self {
        Self {
            microphone: MockMicrophone::ok(),
            recognizer: MockRecognizer::hearing("what is rust"),
            model: MockModel::echo(),
            synthesizer: MockSynthesizer::ok(),
            player: MockPlayer::instant(),
        }
    }
}

impl Doubles {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            microphone: self.microphone.clone(),
            recognizer: self.recognizer.clone(),
            model: self.model.clone(),
            synthesizer: self.synthesizer.clone(),
            player: self.player.clone(),
        }
    }
}

/// Settings with short timeouts so failure paths finish quickly
pub fn test_settings(fallback: RecognitionFallback) -> ControllerSettings {
    ControllerSettings {
        locale: "en-IN".to_string(),
        language: "en".to_string(),
        timeouts: TimeoutConfig {
            recording: Duration::from_millis(300),
            recognition: Duration::from_secs(2),
            model: Duration::from_millis(200),
            synthesis: Duration::from_secs(2),
        },
        recognition_fallback: fallback,
    }
}

/// Poll `condition` every 10ms for up to two seconds
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
