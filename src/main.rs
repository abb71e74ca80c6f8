use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use parley::config::default_log_file;
use parley::controller::{Action, Controller, ControllerSettings, NoticeLevel};
use parley::providers::{self, Collaborators, Player, Synthesizer};
use parley::repl::{self, format_notice, render_log};
use parley::voice::{AudioCapture, AudioPlayback, PLAYBACK_SAMPLE_RATE};
use parley::{Config, logging};

/// Parley - chat with a hosted language model by text or voice
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable microphone and speaker (text chat only)
    #[arg(long, env = "PARLEY_DISABLE_VOICE", global = true)]
    disable_voice: bool,

    /// Config file to use instead of the standard location
    #[arg(long, env = "PARLEY_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Send one typed message and print the conversation
    Ask {
        /// Message text
        text: String,
        /// Read the reply aloud
        #[arg(short, long)]
        speak: bool,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Tail the log file
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
        /// Follow log output
        #[arg(short, long)]
        follow: bool,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, file_error) = Config::load(cli.config.as_deref());
    let log_file = config
        .as_ref()
        .map_or_else(|_| default_log_file(), |c| c.log_file.clone());

    if let Err(e) = logging::init(cli.verbose, &log_file) {
        logging::init_console(cli.verbose);
        tracing::warn!(error = %e, path = %log_file.display(), "file logging unavailable");
    }

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "ignoring config file, using defaults");
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: parley::Result<Config>) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { text, speak } => ask(config?, &text, speak && !cli.disable_voice).await,
            Command::TestMic { duration } => test_mic(&config?, duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&config?, &text).await,
            Command::Logs { lines, follow } => {
                let path = config.map_or_else(|_| default_log_file(), |c| c.log_file);
                cmd_logs(&path, lines, follow)
            }
            Command::Setup => parley::setup::run_setup(cli.config.as_deref()),
        };
    }

    let config = config?;
    tracing::info!(
        model = %config.llm.model,
        disable_voice = cli.disable_voice,
        "starting parley"
    );
    tracing::debug!(?config, "loaded configuration");

    let collaborators = Collaborators::from_config(&config, !cli.disable_voice)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = Controller::new(collaborators, ControllerSettings::from_config(&config))
        .with_notice_channel(tx);

    repl::run(controller, rx).await?;
    Ok(())
}

/// One typed exchange, optionally read aloud
async fn ask(config: Config, text: &str, speak: bool) -> anyhow::Result<()> {
    let collaborators = Collaborators::from_config(&config, speak)?;
    let mut controller =
        Controller::new(collaborators, ControllerSettings::from_config(&config));

    let outcome = controller.handle(Action::Chat(text.to_string())).await;
    for notice in &outcome.notices {
        if notice.level != NoticeLevel::Info {
            eprintln!("{}", format_notice(notice));
        }
    }

    if outcome.worst() == Some(NoticeLevel::Error) || controller.session().last_ai_reply().is_none()
    {
        anyhow::bail!("no reply from {}", config.llm.model);
    }

    print!("{}", render_log(controller.session()));

    if speak {
        controller.handle(Action::SpeakResponse).await;
        if let Some(result) = controller.finish_playback().await {
            result?;
        }
    }

    Ok(())
}

/// Test microphone input
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let capture = AudioCapture::new(config.audio.clone())?;
    println!("Sample rate: {} Hz", capture.sample_rate());
    println!(
        "Speech threshold (RMS): {:.4}",
        config.audio.energy_threshold
    );
    println!("---");

    let threshold = config.audio.energy_threshold;
    tokio::task::spawn_blocking(move || {
        let mut second = 0;
        capture.monitor(Duration::from_secs(duration), |rms, peak| {
            second += 1;

            // Visual meter
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let meter_len = (rms * 100.0).min(50.0) as usize;
            let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);
            let speech = if rms > threshold { " speech" } else { "" };

            println!("[{second:2}s] RMS: {rms:.4} | Peak: {peak:.4} | [{meter}]{speech}");
        })
    })
    .await??;

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let frequency = 440.0_f32;
    let num_samples = PLAYBACK_SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!(
        "Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...",
        samples.len()
    );
    playback.play_samples(samples).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test the configured synthesizer and speaker
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");
    println!(
        "Provider: {:?} | Language: {}",
        config.tts.provider, config.tts.language
    );

    println!("Synthesizing speech...");
    let mp3_data = providers::synthesizer(config)
        .synthesize(text, &config.tts.language)
        .await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    // Check MP3 header
    if let [a, b, c, d, ..] = mp3_data[..] {
        println!("First 4 bytes: {a:02x} {b:02x} {c:02x} {d:02x}");
    }

    println!("Playing audio...");
    providers::player()
        .play(mp3_data, CancellationToken::new())
        .await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Tail the log file
fn cmd_logs(log_path: &std::path::Path, lines: usize, follow: bool) -> anyhow::Result<()> {
    if !log_path.exists() {
        anyhow::bail!("log file not found: {}", log_path.display());
    }

    let mut args = vec![format!("-n{lines}"), log_path.display().to_string()];
    if follow {
        args.insert(0, "-f".to_string());
    }

    let status = std::process::Command::new("tail").args(&args).status()?;

    if !status.success() {
        anyhow::bail!("tail exited with {status}");
    }

    Ok(())
}
