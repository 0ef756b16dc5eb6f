//! Voice I/O controller: the Idle / Listening / Speaking state machine.
//!
//! The controller is the only component that touches the microphone and the
//! speaker. Listening and speaking are two variants of one [`VoiceState`],
//! so they can never be active together: entering Speaking aborts any
//! capture in progress and throws away its partial transcript.
//!
//! Platform callbacks arrive through [`VoiceController::handle_event`]. Each
//! carries the recording session or utterance it belongs to; callbacks for a
//! session or utterance that is no longer current are dropped.

use std::fmt;

use crate::error::{Capability, VoiceError};
use crate::platform::{
    Capabilities, CapabilityProvider, PlatformClass, RecognitionConfig, RecognitionEvent,
    SessionId, SpeechRecognizer, SpeechSynthesizer, SynthesisEvent, Utterance, UtteranceId,
    VoiceEvent, VoicePreference,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Idle,
    Listening,
    Speaking,
}

impl VoiceState {
    /// Status word published for the avatar view.
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceState::Idle => "idle",
            VoiceState::Listening => "listening",
            VoiceState::Speaking => "speaking",
        }
    }
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattened view of the controller for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoiceSessionState {
    pub is_listening: bool,
    pub is_speaking: bool,
    pub can_record: bool,
    pub pending_transcript: String,
}

/// Synthesis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSettings {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub preference: VoicePreference,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            language: "es-ES".to_string(),
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
            preference: VoicePreference::default(),
        }
    }
}

/// What a platform event means for the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// A finished recording, ready to become a user turn.
    Transcript(String),
    /// Something to show the user. The controller is already back to idle.
    Error(VoiceError),
    SpeechFinished(UtteranceId),
}

pub struct VoiceController {
    capabilities: Capabilities,
    recognition: RecognitionConfig,
    settings: SpeechSettings,
    recognizer: Box<dyn SpeechRecognizer>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    state: VoiceState,
    session: Option<SessionId>,
    /// The user asked the current session to stop; waiting for its last
    /// result or `Ended`.
    stopping: bool,
    utterance: Option<UtteranceId>,
    next_id: u64,
    final_transcript: String,
    interim_transcript: String,
}

impl VoiceController {
    /// Capabilities are read once here and never re-queried.
    pub fn new(
        provider: &dyn CapabilityProvider,
        recognizer: Box<dyn SpeechRecognizer>,
        synthesizer: Box<dyn SpeechSynthesizer>,
        settings: SpeechSettings,
    ) -> Self {
        let capabilities = provider.capabilities();
        let recognition =
            RecognitionConfig::for_platform(capabilities.platform_class, &settings.language);
        log::info!(
            "Voice controller ready: recognition={} synthesis={} platform={:?}",
            capabilities.recognition_available,
            capabilities.synthesis_available,
            capabilities.platform_class
        );
        Self {
            capabilities,
            recognition,
            settings,
            recognizer,
            synthesizer,
            state: VoiceState::Idle,
            session: None,
            stopping: false,
            utterance: None,
            next_id: 0,
            final_transcript: String::new(),
            interim_transcript: String::new(),
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn can_record(&self) -> bool {
        self.state != VoiceState::Speaking
    }

    /// Still listening, but only for the platform's closing result.
    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Finalized text plus the live interim segment.
    pub fn pending_transcript(&self) -> String {
        match (
            self.final_transcript.is_empty(),
            self.interim_transcript.is_empty(),
        ) {
            (_, true) => self.final_transcript.clone(),
            (true, false) => self.interim_transcript.clone(),
            (false, false) => format!("{} {}", self.final_transcript, self.interim_transcript),
        }
    }

    pub fn snapshot(&self) -> VoiceSessionState {
        VoiceSessionState {
            is_listening: self.state == VoiceState::Listening,
            is_speaking: self.state == VoiceState::Speaking,
            can_record: self.can_record(),
            pending_transcript: self.pending_transcript(),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn clear_transcript(&mut self) {
        self.final_transcript.clear();
        self.interim_transcript.clear();
    }

    /// Ends the current recording session and returns its transcript, if
    /// it has any text.
    fn finish_listening(&mut self) -> Option<String> {
        let transcript = self.pending_transcript().trim().to_string();
        self.clear_transcript();
        self.session = None;
        self.stopping = false;
        self.state = VoiceState::Idle;
        (!transcript.is_empty()).then_some(transcript)
    }

    /// User pressed the microphone button.
    pub fn start_recording(&mut self) -> Result<(), VoiceError> {
        if !self.capabilities.recognition_available {
            return Err(VoiceError::CapabilityUnavailable(Capability::Recognition));
        }
        match self.state {
            VoiceState::Speaking => {
                log::debug!("Recording refused while speaking");
                return Err(VoiceError::RecordingBlocked);
            }
            VoiceState::Listening => return Ok(()),
            VoiceState::Idle => {}
        }

        let session = SessionId(self.next_id());
        self.clear_transcript();
        self.recognizer.start(session, &self.recognition)?;
        self.session = Some(session);
        self.stopping = false;
        self.state = VoiceState::Listening;
        log::info!("Listening (session {})", session.0);
        Ok(())
    }

    /// User pressed stop. The session stays current until the platform
    /// delivers its closing result or `Ended`; the transcript then arrives
    /// as a [`VoiceOutcome::Transcript`] from [`handle_event`](Self::handle_event).
    pub fn stop_recording(&mut self) {
        if self.state != VoiceState::Listening || self.stopping {
            return;
        }
        self.stopping = true;
        self.recognizer.stop();
        log::info!("Recording stopped by user");
    }

    fn cancel_listening(&mut self) {
        if self.state == VoiceState::Listening {
            log::debug!(
                "Discarding partial transcript: {:?}",
                self.pending_transcript()
            );
            self.recognizer.abort();
            self.clear_transcript();
            self.session = None;
            self.stopping = false;
            self.state = VoiceState::Idle;
        }
    }

    /// Voice `text`. Aborts any capture in progress and interrupts any
    /// utterance still playing; the interrupted utterance's late callbacks
    /// are ignored.
    pub fn speak(&mut self, text: &str) -> Result<UtteranceId, VoiceError> {
        if !self.capabilities.synthesis_available {
            return Err(VoiceError::CapabilityUnavailable(Capability::Synthesis));
        }
        self.cancel_listening();
        if let Some(previous) = self.utterance.take() {
            log::debug!("Interrupting utterance {}", previous.0);
            self.synthesizer.cancel();
        }

        let voices = self.synthesizer.voices();
        let utterance = Utterance {
            id: UtteranceId(self.next_id()),
            text: text.to_string(),
            language: self.settings.language.clone(),
            rate: self.settings.rate,
            pitch: self.settings.pitch,
            volume: self.settings.volume,
            voice: self
                .settings
                .preference
                .select(&voices, &self.settings.language),
        };

        self.state = VoiceState::Speaking;
        self.utterance = Some(utterance.id);
        if let Err(e) = self.synthesizer.speak(&utterance) {
            log::warn!("Speech synthesis failed: {e}");
            self.utterance = None;
            self.state = VoiceState::Idle;
            return Err(e);
        }
        Ok(utterance.id)
    }

    /// Silence the current utterance.
    pub fn stop_speaking(&mut self) {
        if self.state == VoiceState::Speaking {
            self.synthesizer.cancel();
            self.utterance = None;
            self.state = VoiceState::Idle;
        }
    }

    pub fn handle_event(&mut self, event: VoiceEvent) -> Option<VoiceOutcome> {
        match event {
            VoiceEvent::Recognition { session, event } => {
                if self.session != Some(session) {
                    log::debug!("Ignoring stale recognition event for session {}", session.0);
                    return None;
                }
                self.on_recognition(event)
            }
            VoiceEvent::Synthesis { utterance, event } => {
                if self.utterance != Some(utterance) {
                    log::debug!("Ignoring stale synthesis event for utterance {}", utterance.0);
                    return None;
                }
                self.on_synthesis(utterance, event)
            }
        }
    }

    fn on_recognition(&mut self, event: RecognitionEvent) -> Option<VoiceOutcome> {
        match event {
            RecognitionEvent::Started => {
                log::debug!("Recognition started");
                None
            }
            RecognitionEvent::Result {
                transcript,
                is_final,
            } => {
                log::debug!("Recognition result (final={is_final}): {transcript}");
                match self.capabilities.platform_class {
                    PlatformClass::Mobile => {
                        if !is_final {
                            return None;
                        }
                        self.interim_transcript.clear();
                        self.final_transcript = transcript;
                        // Single-shot: the first final result closes the
                        // session so the trailing `Ended` is stale.
                        self.finish_listening().map(VoiceOutcome::Transcript)
                    }
                    PlatformClass::Desktop => {
                        if is_final {
                            let text = transcript.trim();
                            if !text.is_empty() {
                                if !self.final_transcript.is_empty() {
                                    self.final_transcript.push(' ');
                                }
                                self.final_transcript.push_str(text);
                            }
                            self.interim_transcript.clear();
                        } else {
                            self.interim_transcript = transcript.trim().to_string();
                        }
                        None
                    }
                }
            }
            RecognitionEvent::Error(code) => {
                self.clear_transcript();
                self.session = None;
                self.stopping = false;
                self.state = VoiceState::Idle;
                match recognition_error(&code) {
                    Some(err) => {
                        log::warn!("Speech recognition error: {code}");
                        Some(VoiceOutcome::Error(err))
                    }
                    None => None,
                }
            }
            RecognitionEvent::Ended => {
                log::debug!("Recognition ended");
                self.finish_listening().map(VoiceOutcome::Transcript)
            }
        }
    }

    fn on_synthesis(&mut self, id: UtteranceId, event: SynthesisEvent) -> Option<VoiceOutcome> {
        match event {
            SynthesisEvent::Started => None,
            SynthesisEvent::Ended => {
                self.utterance = None;
                self.state = VoiceState::Idle;
                Some(VoiceOutcome::SpeechFinished(id))
            }
            SynthesisEvent::Error(message) => {
                log::warn!("Speech synthesis error: {message}");
                self.utterance = None;
                self.state = VoiceState::Idle;
                Some(VoiceOutcome::Error(VoiceError::Synthesis(message)))
            }
        }
    }
}

/// Map a platform recognition error code. `aborted` is the echo of our own
/// cancellation and maps to nothing.
pub fn recognition_error(code: &str) -> Option<VoiceError> {
    match code {
        "aborted" => None,
        "not-allowed" | "service-not-allowed" => Some(VoiceError::PermissionDenied),
        "no-speech" => Some(VoiceError::NoSpeech),
        "audio-capture" => Some(VoiceError::AudioCapture),
        "network" => Some(VoiceError::Network),
        other => Some(VoiceError::Recognition(other.to_string())),
    }
}
