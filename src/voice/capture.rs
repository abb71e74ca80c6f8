//! Audio capture from microphone

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tokio_util::sync::CancellationToken;

use super::vad::{DetectorState, UtteranceDetector, calculate_rms};
use crate::config::AudioConfig;
use crate::providers::Microphone;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// How often the capture buffer is drained into the detector
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captures utterances from the default input device
#[derive(Clone)]
pub struct AudioCapture {
    config: StreamConfig,
    settings: AudioConfig,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new(settings: AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self { config, settings })
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Record one utterance, blocking the calling thread
    ///
    /// Listens until speech is followed by the configured pause, or until the
    /// utterance reaches its maximum length. Returns `Error::Unintelligible`
    /// if no speech starts within the listen timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the input stream fails, nothing was said, or `cancel`
    /// fires first
    pub fn record_blocking(&self, cancel: &CancellationToken) -> Result<Vec<f32>> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stream = self.open_stream(Arc::clone(&buffer))?;

        let mut detector = UtteranceDetector::new(
            self.settings.energy_threshold,
            self.settings.pause,
            SAMPLE_RATE,
        )
        .with_max_utterance(self.settings.max_utterance);
        tracing::info!("listening");

        let result = listen(&mut detector, self.settings.listen_timeout, cancel, || {
            std::thread::sleep(POLL_INTERVAL);
            take(&buffer)
        });

        drop(stream);
        tracing::debug!("audio capture stopped");
        result
    }

    /// Report RMS and peak levels once per second for `duration`
    ///
    /// # Errors
    ///
    /// Returns error if the input stream fails
    pub fn monitor(&self, duration: Duration, mut on_level: impl FnMut(f32, f32)) -> Result<()> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stream = self.open_stream(Arc::clone(&buffer))?;

        let start = Instant::now();
        while start.elapsed() < duration {
            std::thread::sleep(Duration::from_secs(1));
            let samples = take(&buffer);
            let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
            on_level(calculate_rms(&samples), peak);
        }

        drop(stream);
        Ok(())
    }

    fn open_stream(&self, buffer: Arc<Mutex<Vec<f32>>>) -> Result<Stream> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        tracing::debug!("audio capture started");
        Ok(stream)
    }
}

/// Feed chunks to `detector` until it completes, nothing is said within
/// `listen_timeout`, or `cancel` fires
fn listen(
    detector: &mut UtteranceDetector,
    listen_timeout: Duration,
    cancel: &CancellationToken,
    mut next_chunk: impl FnMut() -> Vec<f32>,
) -> Result<Vec<f32>> {
    let start = Instant::now();

    loop {
        if cancel.is_cancelled() {
            tracing::debug!("recording cancelled");
            return Err(Error::Audio("recording cancelled".to_string()));
        }

        let chunk = next_chunk();
        if detector.process(&chunk) {
            return Ok(detector.take_utterance());
        }

        if detector.state() == DetectorState::Idle && start.elapsed() > listen_timeout {
            tracing::debug!("no speech before listen timeout");
            return Err(Error::Unintelligible);
        }
    }
}

fn take(buffer: &Mutex<Vec<f32>>) -> Vec<f32> {
    buffer
        .lock()
        .map(|mut buf| std::mem::take(&mut *buf))
        .unwrap_or_default()
}

#[async_trait]
impl Microphone for AudioCapture {
    async fn record(&self) -> Result<Vec<u8>> {
        let capture = self.clone();
        let cancel = CancellationToken::new();
        // Stops the capture thread if this future is dropped, e.g. on timeout
        let _stop = cancel.clone().drop_guard();

        let samples = tokio::task::spawn_blocking(move || capture.record_blocking(&cancel))
            .await
            .map_err(|e| Error::Audio(format!("capture task failed: {e}")))??;

        tracing::debug!(samples = samples.len(), "utterance recorded");
        samples_to_wav(&samples, SAMPLE_RATE)
    }
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
