//! Offline speech recognition using the [`vosk`] crate and [`cpal`] for
//! audio input.
//!
//! Each recording session runs on its own capture thread: cpal streams
//! microphone samples, they are down-mixed to mono `i16` and fed to a Vosk
//! recogniser, and Vosk's endpointing decides where an utterance ends.
//! Results are reported as [`RecognitionEvent`]s stamped with the session.
//!
//! The environment variables `MIC_INDEX` and `MIC_NAME_KEYWORD` select the
//! microphone: `MIC_INDEX` picks a device by its position among the input
//! devices, otherwise the first device whose name contains
//! `MIC_NAME_KEYWORD` (case insensitive) is used, otherwise the default
//! input device.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use vosk::{DecodingState, Model, Recognizer};

use crate::error::VoiceError;
use crate::platform::{
    EventSender, RecognitionConfig, RecognitionEvent, SessionId, SpeechRecognizer, VoiceEvent,
};

/// Single-shot sessions give up when nothing is said for this long.
const NO_SPEECH_TIMEOUT: Duration = Duration::from_secs(8);
const CHUNK_TIMEOUT: Duration = Duration::from_millis(100);

struct Capture {
    stop: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
}

pub struct VoskRecognizer {
    model: Arc<Model>,
    device: cpal::Device,
    events: EventSender,
    capture: Option<Capture>,
}

impl VoskRecognizer {
    /// Load the Vosk model from `model_path` and select a microphone.
    pub fn new(model_path: &str, events: EventSender) -> Result<Self> {
        let model = Model::new(model_path)
            .with_context(|| format!("Failed to load Vosk model from '{}'.", model_path))?;
        let device = select_device()?;
        if let Ok(name) = device.name() {
            log::info!("Using microphone: {}", name);
        }
        Ok(Self {
            model: Arc::new(model),
            device,
            events,
            capture: None,
        })
    }

    fn end_capture(&mut self, abort: bool) {
        if let Some(capture) = self.capture.take() {
            capture.abort.store(abort, Ordering::SeqCst);
            capture.stop.store(true, Ordering::SeqCst);
        }
    }
}

fn select_device() -> Result<cpal::Device> {
    let host = cpal::default_host();
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .context("Failed to enumerate input audio devices")?
        .collect();

    let by_index = env::var("MIC_INDEX")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .and_then(|idx| devices.get(idx).cloned());
    let by_name = || {
        let keyword = env::var("MIC_NAME_KEYWORD").ok()?.to_lowercase();
        devices
            .iter()
            .find(|dev| {
                dev.name()
                    .map(|name| name.to_lowercase().contains(&keyword))
                    .unwrap_or(false)
            })
            .cloned()
    };

    by_index
        .or_else(by_name)
        .or_else(|| host.default_input_device())
        .ok_or_else(|| anyhow!("No input audio device found"))
}

impl SpeechRecognizer for VoskRecognizer {
    fn start(&mut self, session: SessionId, config: &RecognitionConfig) -> Result<(), VoiceError> {
        self.end_capture(true);
        let capture = Capture {
            stop: Arc::new(AtomicBool::new(false)),
            abort: Arc::new(AtomicBool::new(false)),
        };
        let worker = CaptureWorker {
            model: Arc::clone(&self.model),
            device: self.device.clone(),
            events: self.events.clone(),
            session,
            config: config.clone(),
            stop: Arc::clone(&capture.stop),
            abort: Arc::clone(&capture.abort),
        };
        thread::Builder::new()
            .name(format!("kiia-capture-{}", session.0))
            .spawn(move || worker.run())
            .map_err(|e| {
                log::error!("Failed to spawn capture thread: {e}");
                VoiceError::AudioCapture
            })?;
        self.capture = Some(capture);
        Ok(())
    }

    fn stop(&mut self) {
        self.end_capture(false);
    }

    fn abort(&mut self) {
        self.end_capture(true);
    }
}

struct CaptureWorker {
    model: Arc<Model>,
    device: cpal::Device,
    events: EventSender,
    session: SessionId,
    config: RecognitionConfig,
    stop: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
}

impl CaptureWorker {
    fn emit(&self, event: RecognitionEvent) {
        let event = VoiceEvent::Recognition {
            session: self.session,
            event,
        };
        if self.events.send(event).is_err() {
            log::debug!("Voice event receiver dropped");
        }
    }

    fn run(self) {
        match self.capture() {
            Ok(()) => {
                if !self.abort.load(Ordering::SeqCst) {
                    self.emit(RecognitionEvent::Ended);
                }
            }
            Err(e) => {
                log::error!("Audio capture failed: {e:#}");
                self.emit(RecognitionEvent::Error("audio-capture".to_string()));
            }
        }
    }

    fn capture(&self) -> Result<()> {
        let supported = self
            .device
            .default_input_config()
            .context("Failed to get default input configuration")?;
        let sample_rate = supported.sample_rate().0 as f32;
        let channels = supported.channels() as usize;
        let mut recogniser =
            Recognizer::new(&self.model, sample_rate).context("Failed to create Vosk recogniser")?;
        recogniser.set_words(false);
        recogniser.set_max_alternatives(0);

        let (tx, rx) = mpsc::channel::<Vec<i16>>();
        let config: cpal::StreamConfig = supported.config();
        let stream = match supported.sample_format() {
            SampleFormat::I16 => build_stream::<i16>(&self.device, &config, channels, tx, |s| s),
            SampleFormat::U16 => {
                build_stream::<u16>(&self.device, &config, channels, tx, |s| (s as i32 - 32768) as i16)
            }
            SampleFormat::F32 => build_stream::<f32>(&self.device, &config, channels, tx, |s| {
                (s * 32768.0).clamp(-32768.0, 32767.0) as i16
            }),
            other => return Err(anyhow!("Unsupported sample format: {:?}", other)),
        }?;
        stream.play().context("Failed to start audio input stream")?;
        self.emit(RecognitionEvent::Started);

        let started = Instant::now();
        let mut heard_anything = false;
        let mut last_partial = String::new();
        while !self.stop.load(Ordering::SeqCst) {
            let chunk = match rx.recv_timeout(CHUNK_TIMEOUT) {
                Ok(chunk) => chunk,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            };
            let state = recogniser
                .accept_waveform(&chunk)
                .map_err(|e| anyhow!("Vosk rejected audio: {e:?}"))?;
            match state {
                DecodingState::Finalized => {
                    let text = recogniser
                        .result()
                        .single()
                        .map(|r| r.text.trim().to_string())
                        .unwrap_or_default();
                    last_partial.clear();
                    if !text.is_empty() {
                        heard_anything = true;
                        log::debug!("Recognised: {}", text);
                        self.emit(RecognitionEvent::Result {
                            transcript: text,
                            is_final: true,
                        });
                        if !self.config.continuous {
                            return Ok(());
                        }
                    }
                }
                DecodingState::Running => {
                    if self.config.interim_results {
                        let partial = recogniser.partial_result().partial.trim().to_string();
                        if !partial.is_empty() && partial != last_partial {
                            heard_anything = true;
                            last_partial = partial.clone();
                            self.emit(RecognitionEvent::Result {
                                transcript: partial,
                                is_final: false,
                            });
                        }
                    }
                }
                DecodingState::Failed => log::warn!("Vosk failed to decode an audio chunk"),
            }
            if !self.config.continuous && !heard_anything && started.elapsed() > NO_SPEECH_TIMEOUT {
                self.emit(RecognitionEvent::Error("no-speech".to_string()));
                self.abort.store(true, Ordering::SeqCst);
                return Ok(());
            }
        }

        drop(stream);
        if self.abort.load(Ordering::SeqCst) {
            return Ok(());
        }
        let tail = recogniser
            .final_result()
            .single()
            .map(|r| r.text.trim().to_string())
            .unwrap_or_default();
        if !tail.is_empty() {
            self.emit(RecognitionEvent::Result {
                transcript: tail,
                is_final: true,
            });
        }
        Ok(())
    }
}

/// Build an input stream that sends mono `i16` chunks. Channels are
/// interleaved, so the first sample of each frame is kept.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    tx: mpsc::Sender<Vec<i16>>,
    convert: fn(T) -> i16,
) -> Result<cpal::Stream>
where
    T: SizedSample + Send + 'static,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _| {
            let mono: Vec<i16> = data.chunks(channels).map(|frame| convert(frame[0])).collect();
            // receiver gone means the session ended
            let _ = tx.send(mono);
        },
        |err| log::error!("An error occurred on the input audio stream: {}", err),
        None,
    )?;
    Ok(stream)
}
