//! Interactive first-run setup wizard (`parley setup`)

use std::path::{Path, PathBuf};

use dialoguer::{Confirm, Input, Select};

use crate::config::file::{
    ApiKeysFileConfig, AudioFileConfig, LlmFileConfig, ParleyConfigFile, SttFileConfig,
    TtsFileConfig, load_config_file, save_config_file,
};
use crate::config::{
    DEFAULT_LANGUAGE, DEFAULT_LLM_MODEL, DEFAULT_LOCALE, RecognitionFallback, SttProvider,
    TtsProvider,
};

/// Run the interactive setup wizard
///
/// Writes to `path`, or the standard config location when `None`.
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup(path: Option<&Path>) -> anyhow::Result<()> {
    println!("Parley Setup\n");

    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => crate::config::file::config_file_path()
            .unwrap_or_else(|| PathBuf::from("parley.toml")),
    };

    let existing = load_config_file(Some(&config_path));
    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. Gemini key and model
    let gemini = ask_key(
        "Gemini API key",
        "GEMINI_API_KEY",
        existing.api_keys.gemini.as_deref(),
    )?;

    let model: String = Input::new()
        .with_prompt("Gemini model")
        .default(
            existing
                .llm
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        )
        .interact_text()?;

    let mut api_keys = ApiKeysFileConfig {
        gemini,
        ..existing.api_keys
    };

    // 2. Voice (optional)
    let enable_voice = Confirm::new()
        .with_prompt("Enable voice (microphone and speaker)?")
        .default(existing.audio.enabled.unwrap_or(true))
        .interact()?;

    let (stt, tts, recognition_fallback) = if enable_voice {
        let stt = setup_stt(&existing.stt, &mut api_keys)?;
        let tts = setup_tts(&existing.tts, &mut api_keys)?;

        let fallbacks = [
            "Warn and do nothing",
            "Send \"None\" to the model (legacy)",
        ];
        let default_fallback = usize::from(matches!(
            existing.recognition_fallback,
            Some(RecognitionFallback::Sentinel)
        ));
        let fallback_idx = Select::new()
            .with_prompt("When speech is not understood")
            .items(&fallbacks)
            .default(default_fallback)
            .interact()?;
        let fallback = if fallback_idx == 1 {
            RecognitionFallback::Sentinel
        } else {
            RecognitionFallback::Abort
        };

        (stt, tts, Some(fallback))
    } else {
        (
            existing.stt,
            existing.tts,
            existing.recognition_fallback,
        )
    };

    // 3. Write
    let config_file = ParleyConfigFile {
        recognition_fallback,
        llm: LlmFileConfig {
            model: Some(model),
            base_url: existing.llm.base_url,
        },
        stt,
        tts,
        audio: AudioFileConfig {
            enabled: Some(enable_voice),
            ..existing.audio
        },
        timeouts: existing.timeouts,
        logging: existing.logging,
        api_keys,
    };

    save_config_file(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());

    if enable_voice {
        println!("Try `parley test-mic` and `parley test-tts` to check your audio devices.");
    }
    println!("\nSetup complete! Run `parley` to start chatting.");

    Ok(())
}

fn setup_stt(
    existing: &SttFileConfig,
    api_keys: &mut ApiKeysFileConfig,
) -> anyhow::Result<SttFileConfig> {
    let providers = ["Whisper (OpenAI)", "Deepgram"];
    let default_provider = usize::from(matches!(existing.provider, Some(SttProvider::Deepgram)));

    let idx = Select::new()
        .with_prompt("Speech recognition provider")
        .items(&providers)
        .default(default_provider)
        .interact()?;

    let provider = if idx == 1 {
        api_keys.deepgram = ask_key(
            "Deepgram API key",
            "DEEPGRAM_API_KEY",
            api_keys.deepgram.as_deref(),
        )?;
        SttProvider::Deepgram
    } else {
        api_keys.openai = ask_key(
            "OpenAI API key",
            "OPENAI_API_KEY",
            api_keys.openai.as_deref(),
        )?;
        SttProvider::Whisper
    };

    let locale: String = Input::new()
        .with_prompt("Speech locale")
        .default(
            existing
                .locale
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        )
        .interact_text()?;

    let model = if existing.provider == Some(provider) {
        existing.model.clone()
    } else {
        None
    };

    Ok(SttFileConfig {
        provider: Some(provider),
        model,
        locale: Some(locale),
        base_url: existing.base_url.clone(),
    })
}

fn setup_tts(
    existing: &TtsFileConfig,
    api_keys: &mut ApiKeysFileConfig,
) -> anyhow::Result<TtsFileConfig> {
    let providers = ["Google (no key)", "OpenAI", "ElevenLabs"];
    let default_provider = match existing.provider {
        Some(TtsProvider::OpenAi) => 1,
        Some(TtsProvider::ElevenLabs) => 2,
        _ => 0,
    };

    let idx = Select::new()
        .with_prompt("Speech synthesis provider")
        .items(&providers)
        .default(default_provider)
        .interact()?;

    let provider = match idx {
        1 => {
            if api_keys.openai.is_none() {
                api_keys.openai = ask_key("OpenAI API key", "OPENAI_API_KEY", None)?;
            }
            TtsProvider::OpenAi
        }
        2 => {
            api_keys.elevenlabs = ask_key(
                "ElevenLabs API key",
                "ELEVENLABS_API_KEY",
                api_keys.elevenlabs.as_deref(),
            )?;
            TtsProvider::ElevenLabs
        }
        _ => TtsProvider::Google,
    };

    let same_provider = existing.provider == Some(provider);
    let voice = if provider == TtsProvider::Google {
        None
    } else {
        let default_voice = existing
            .voice
            .clone()
            .filter(|_| same_provider)
            .unwrap_or_else(|| provider.default_voice().to_string());
        let voice: String = Input::new()
            .with_prompt("Voice")
            .default(default_voice)
            .interact_text()?;
        Some(voice)
    };

    let language: String = Input::new()
        .with_prompt("Speech language")
        .default(
            existing
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        )
        .interact_text()?;

    Ok(TtsFileConfig {
        provider: Some(provider),
        model: existing.model.clone().filter(|_| same_provider),
        voice,
        speed: existing.speed,
        language: Some(language),
        base_url: existing.base_url.clone(),
    })
}

/// Prompt for an API key, keeping `current` when the input is left blank
fn ask_key(label: &str, env_hint: &str, current: Option<&str>) -> anyhow::Result<Option<String>> {
    let prompt = current.map_or_else(
        || format!("{label} ({env_hint}, leave blank to use the environment)"),
        |k| format!("{label} (current: {}, leave blank to keep)", mask_key(k)),
    );

    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    let input = input.trim();
    Ok(if input.is_empty() {
        current.map(str::to_string)
    } else {
        Some(input.to_string())
    })
}

/// Show only the ends of a key
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("AIzaSyExample1234"), "AIza...1234");
        assert_eq!(mask_key("short"), "****");
    }
}
