//! Speech synthesizer backends.
//!
//! [`ConsoleSynthesizer`] prints replies to the terminal and is always
//! available. With the `native-tts` feature, [`TtsEngine`] speaks through the
//! operating system via the [`tts`](https://crates.io/crates/tts) crate
//! (Speech Dispatcher on Linux, SAPI on Windows, AVFoundation on macOS).
//! Both report `Started`/`Ended` on the shared event channel.

use crate::error::VoiceError;
use crate::platform::{
    EventSender, SpeechSynthesizer, SynthesisEvent, Utterance, UtteranceId, VoiceEvent, VoiceInfo,
};

fn send(events: &EventSender, utterance: UtteranceId, event: SynthesisEvent) {
    if events.send(VoiceEvent::Synthesis { utterance, event }).is_err() {
        log::debug!("Voice event receiver dropped");
    }
}

/// Writes each utterance to stdout and finishes it immediately.
pub struct ConsoleSynthesizer {
    events: EventSender,
}

impl ConsoleSynthesizer {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), VoiceError> {
        send(&self.events, utterance.id, SynthesisEvent::Started);
        println!("🔊 {}", utterance.text);
        send(&self.events, utterance.id, SynthesisEvent::Ended);
        Ok(())
    }

    fn cancel(&mut self) {}
}

#[cfg(feature = "native-tts")]
pub use native::TtsEngine;

#[cfg(feature = "native-tts")]
mod native {
    use std::time::{Duration, Instant};

    use anyhow::{Context, Result};
    use tts::Tts;

    use super::send;
    use crate::error::VoiceError;
    use crate::platform::{
        EventSender, SpeechSynthesizer, SynthesisEvent, Utterance, UtteranceId, VoiceInfo,
    };

    const POLL_INTERVAL: Duration = Duration::from_millis(100);
    /// How long a backend may take to report that speech began.
    const START_GRACE: Duration = Duration::from_secs(2);

    pub struct TtsEngine {
        tts: Tts,
        events: EventSender,
    }

    impl TtsEngine {
        /// Initialise the system speech backend. Fails if the host has none.
        pub fn new(events: EventSender) -> Result<Self> {
            let tts = Tts::default().context("failed to initialise text‑to‑speech engine")?;
            Ok(Self { tts, events })
        }

        fn apply_settings(&mut self, utterance: &Utterance) {
            let features = self.tts.supported_features();
            if features.rate {
                let rate = (self.tts.normal_rate() * utterance.rate)
                    .clamp(self.tts.min_rate(), self.tts.max_rate());
                if let Err(e) = self.tts.set_rate(rate) {
                    log::debug!("Could not set speech rate: {e:?}");
                }
            }
            if features.pitch {
                let pitch = (self.tts.normal_pitch() * utterance.pitch)
                    .clamp(self.tts.min_pitch(), self.tts.max_pitch());
                if let Err(e) = self.tts.set_pitch(pitch) {
                    log::debug!("Could not set speech pitch: {e:?}");
                }
            }
            if features.volume {
                let volume = (self.tts.normal_volume() * utterance.volume)
                    .clamp(self.tts.min_volume(), self.tts.max_volume());
                if let Err(e) = self.tts.set_volume(volume) {
                    log::debug!("Could not set speech volume: {e:?}");
                }
            }
            if let (true, Some(wanted)) = (features.voice, &utterance.voice) {
                let voice = self
                    .tts
                    .voices()
                    .ok()
                    .and_then(|voices| voices.into_iter().find(|v| v.name() == wanted.name));
                match voice {
                    Some(voice) => {
                        if let Err(e) = self.tts.set_voice(&voice) {
                            log::warn!("Failed to set voice '{}': {e:?}", wanted.name);
                        }
                    }
                    None => log::warn!("Voice '{}' is no longer available", wanted.name),
                }
            }
        }

        /// Report `Ended` once the backend stops speaking. Cancelled
        /// utterances report too; the controller ignores them.
        fn watch_completion(&self, utterance: UtteranceId) {
            let events = self.events.clone();
            if !self.tts.supported_features().is_speaking {
                send(&events, utterance, SynthesisEvent::Ended);
                return;
            }
            let tts = self.tts.clone();
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                send(&events, utterance, SynthesisEvent::Ended);
                return;
            };
            handle.spawn(async move {
                let started = Instant::now();
                let mut heard = false;
                loop {
                    tokio::time::sleep(POLL_INTERVAL).await;
                    match tts.is_speaking() {
                        Ok(true) => heard = true,
                        Ok(false) if heard || started.elapsed() > START_GRACE => break,
                        Ok(false) => {}
                        Err(e) => {
                            send(&events, utterance, SynthesisEvent::Error(format!("{e:?}")));
                            return;
                        }
                    }
                }
                send(&events, utterance, SynthesisEvent::Ended);
            });
        }
    }

    impl SpeechSynthesizer for TtsEngine {
        fn voices(&self) -> Vec<VoiceInfo> {
            let current = self.tts.voice().ok().flatten().map(|v| v.id());
            match self.tts.voices() {
                Ok(voices) => voices
                    .into_iter()
                    .map(|v| VoiceInfo {
                        is_default: current.as_deref() == Some(v.id().as_str()),
                        name: v.name(),
                        language: v.language().to_string(),
                    })
                    .collect(),
                Err(e) => {
                    log::warn!("Failed to enumerate voices: {e:?}");
                    Vec::new()
                }
            }
        }

        fn speak(&mut self, utterance: &Utterance) -> Result<(), VoiceError> {
            self.apply_settings(utterance);
            self.tts
                .speak(utterance.text.as_str(), true)
                .map_err(|e| VoiceError::Synthesis(format!("TTS speak failed: {e:?}")))?;
            send(&self.events, utterance.id, SynthesisEvent::Started);
            self.watch_completion(utterance.id);
            Ok(())
        }

        fn cancel(&mut self) {
            if let Err(e) = self.tts.stop() {
                log::warn!("Failed to stop TTS: {e:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::event_channel;

    #[test]
    fn console_reports_start_and_end() {
        let (tx, mut rx) = event_channel();
        let mut synth = ConsoleSynthesizer::new(tx);
        let utterance = Utterance {
            id: UtteranceId(7),
            text: "Hola".into(),
            language: "es-ES".into(),
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
        };
        synth.speak(&utterance).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceEvent::Synthesis {
                utterance: UtteranceId(7),
                event: SynthesisEvent::Started
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceEvent::Synthesis {
                utterance: UtteranceId(7),
                event: SynthesisEvent::Ended
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
