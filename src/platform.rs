//! Platform speech capabilities as seen by the voice controller.
//!
//! Backends (browser bridge, operating system TTS, Vosk, test fakes)
//! implement [`SpeechRecognizer`] and [`SpeechSynthesizer`] and report
//! their callbacks as [`VoiceEvent`]s on an [`EventSender`]. Events carry the
//! recognition session or utterance they belong to so the controller can
//! drop callbacks from work it already cancelled.

use tokio::sync::mpsc;

use crate::error::{Capability, VoiceError};

/// Coarse platform category selecting the recognition policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformClass {
    Mobile,
    #[default]
    Desktop,
}

impl PlatformClass {
    pub fn parse(s: &str) -> Option<PlatformClass> {
        match s.trim().to_lowercase().as_str() {
            "mobile" | "movil" | "móvil" => Some(PlatformClass::Mobile),
            "desktop" | "escritorio" => Some(PlatformClass::Desktop),
            _ => None,
        }
    }
}

/// What the platform can do, queried once at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub recognition_available: bool,
    pub synthesis_available: bool,
    pub platform_class: PlatformClass,
}

pub trait CapabilityProvider {
    fn capabilities(&self) -> Capabilities;
}

/// Fixed capabilities, e.g. from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StaticCapabilities(pub Capabilities);

impl CapabilityProvider for StaticCapabilities {
    fn capabilities(&self) -> Capabilities {
        self.0
    }
}

/// Recognition parameters handed to the platform on every start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u32,
}

impl RecognitionConfig {
    /// Mobile platforms report duplicate partial results in continuous
    /// mode, so they get single-shot, final-only recognition. Desktop
    /// listens continuously and streams interim results.
    pub fn for_platform(class: PlatformClass, language: &str) -> Self {
        let desktop = class == PlatformClass::Desktop;
        Self {
            language: language.to_string(),
            continuous: desktop,
            interim_results: desktop,
            max_alternatives: 1,
        }
    }
}

/// Identifies one recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// Identifies one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started,
    Result { transcript: String, is_final: bool },
    /// Platform error code, e.g. `not-allowed` or `no-speech`.
    Error(String),
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Started,
    Ended,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Recognition {
        session: SessionId,
        event: RecognitionEvent,
    },
    Synthesis {
        utterance: UtteranceId,
        event: SynthesisEvent,
    },
}

pub type EventSender = mpsc::UnboundedSender<VoiceEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<VoiceEvent>;

/// Channel carrying platform callbacks to the controller.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Microphone capture.
pub trait SpeechRecognizer: Send {
    /// Begin capturing. Events for this capture must carry `session`.
    fn start(&mut self, session: SessionId, config: &RecognitionConfig) -> Result<(), VoiceError>;

    /// Stop capturing. The backend must still deliver what it already heard
    /// as a final result, followed by `Ended`.
    fn stop(&mut self);

    /// Stop capturing and drop any pending result.
    fn abort(&mut self);
}

/// Stand-in when no recognition backend is available.
#[derive(Debug, Default)]
pub struct NoRecognizer;

impl SpeechRecognizer for NoRecognizer {
    fn start(&mut self, _session: SessionId, _config: &RecognitionConfig) -> Result<(), VoiceError> {
        Err(VoiceError::CapabilityUnavailable(Capability::Recognition))
    }

    fn stop(&mut self) {}

    fn abort(&mut self) {}
}

/// A voice offered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    /// BCP 47 tag, e.g. `es-ES`.
    pub language: String,
    pub is_default: bool,
}

/// Everything needed to speak one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// `None` leaves the choice to the platform.
    pub voice: Option<VoiceInfo>,
}

/// Audio output.
pub trait SpeechSynthesizer: Send {
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Start speaking. Events for this utterance must carry `utterance.id`.
    fn speak(&mut self, utterance: &Utterance) -> Result<(), VoiceError>;

    /// Stop the current utterance and clear anything queued.
    fn cancel(&mut self);
}

/// Ranked voice preference: the named voices in order, then any voice in
/// the exact target language, then any voice sharing its primary subtag,
/// then the platform default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoicePreference {
    pub preferred_names: Vec<String>,
}

impl VoicePreference {
    pub fn new(preferred_names: Vec<String>) -> Self {
        Self { preferred_names }
    }

    pub fn select(&self, available: &[VoiceInfo], language: &str) -> Option<VoiceInfo> {
        let by_name = self.preferred_names.iter().find_map(|name| {
            let wanted = name.to_lowercase();
            available
                .iter()
                .find(|v| v.name.to_lowercase().contains(&wanted))
        });
        if let Some(voice) = by_name {
            return Some(voice.clone());
        }

        if let Some(voice) = available
            .iter()
            .find(|v| v.language.eq_ignore_ascii_case(language))
        {
            return Some(voice.clone());
        }

        let primary = primary_subtag(language);
        if let Some(voice) = available
            .iter()
            .find(|v| primary_subtag(&v.language).eq_ignore_ascii_case(primary))
        {
            return Some(voice.clone());
        }

        available.iter().find(|v| v.is_default).cloned()
    }
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(|c: char| c == '-' || c == '_')
        .next()
        .unwrap_or(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, language: &str, is_default: bool) -> VoiceInfo {
        VoiceInfo {
            name: name.to_string(),
            language: language.to_string(),
            is_default,
        }
    }

    fn catalogue() -> Vec<VoiceInfo> {
        vec![
            voice("Samantha", "en-US", true),
            voice("Paulina", "es-MX", false),
            voice("Monica", "es-ES", false),
            voice("Google español", "es_ES", false),
        ]
    }

    #[test]
    fn recognition_policy_by_platform() {
        let mobile = RecognitionConfig::for_platform(PlatformClass::Mobile, "es-ES");
        assert!(!mobile.continuous);
        assert!(!mobile.interim_results);

        let desktop = RecognitionConfig::for_platform(PlatformClass::Desktop, "es-ES");
        assert!(desktop.continuous);
        assert!(desktop.interim_results);
        assert_eq!(desktop.language, "es-ES");
    }

    #[test]
    fn preferred_name_wins() {
        let pref = VoicePreference::new(vec!["nonexistent".into(), "google".into()]);
        let chosen = pref.select(&catalogue(), "es-ES").map(|v| v.name);
        assert_eq!(chosen.as_deref(), Some("Google español"));
    }

    #[test]
    fn exact_language_before_locale_family() {
        let pref = VoicePreference::default();
        let chosen = pref.select(&catalogue(), "es-ES").map(|v| v.name);
        assert_eq!(chosen.as_deref(), Some("Monica"));
    }

    #[test]
    fn locale_family_fallback() {
        let pref = VoicePreference::default();
        let chosen = pref.select(&catalogue(), "es-AR").map(|v| v.name);
        assert_eq!(chosen.as_deref(), Some("Paulina"));
    }

    #[test]
    fn platform_default_last() {
        let pref = VoicePreference::default();
        let chosen = pref.select(&catalogue(), "fr-FR").map(|v| v.name);
        assert_eq!(chosen.as_deref(), Some("Samantha"));
        assert_eq!(pref.select(&[], "es-ES"), None);
    }

    #[test]
    fn platform_class_parse() {
        assert_eq!(PlatformClass::parse("Mobile"), Some(PlatformClass::Mobile));
        assert_eq!(PlatformClass::parse("desktop"), Some(PlatformClass::Desktop));
        assert_eq!(PlatformClass::parse("tablet"), None);
    }
}
