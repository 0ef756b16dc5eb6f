//! Error types crossing the voice, prompt and conversation seams.
//!
//! None of these are fatal to a session: the conversation surfaces them to
//! the user and returns the voice controller to idle with the log intact.

use std::fmt;
use std::time::Duration;

/// A platform speech capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Recognition,
    Synthesis,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Recognition => write!(f, "speech recognition"),
            Capability::Synthesis => write!(f, "speech synthesis"),
        }
    }
}

/// How an error is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Feature missing or refused; reported and visibly disabled.
    CapabilityUnavailable,
    /// Microphone access refused; dismissible inline message.
    PermissionDenied,
    /// Silence timeout; transient message.
    NoInputDetected,
    /// Prompt service failure; replaced by an apology turn.
    ExternalService,
    /// Any other recoverable platform hiccup.
    Transient,
}

/// Errors raised by the voice controller and its platform backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("{0} is not available on this platform")]
    CapabilityUnavailable(Capability),

    /// Recording was requested while a reply is being spoken.
    #[error("cannot start recording while speaking")]
    RecordingBlocked,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no speech detected")]
    NoSpeech,

    #[error("microphone could not be captured")]
    AudioCapture,

    #[error("network error during recognition")]
    Network,

    #[error("recognition error: {0}")]
    Recognition(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),
}

impl VoiceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VoiceError::CapabilityUnavailable(_) | VoiceError::RecordingBlocked => {
                ErrorCategory::CapabilityUnavailable
            }
            VoiceError::PermissionDenied => ErrorCategory::PermissionDenied,
            VoiceError::NoSpeech => ErrorCategory::NoInputDetected,
            VoiceError::AudioCapture
            | VoiceError::Network
            | VoiceError::Recognition(_)
            | VoiceError::Synthesis(_) => ErrorCategory::Transient,
        }
    }

    /// Localized message shown in the chat's inline error banner.
    pub fn user_message(&self) -> String {
        match self {
            VoiceError::CapabilityUnavailable(Capability::Recognition) => {
                "Reconocimiento de voz no disponible en este dispositivo.".to_string()
            }
            VoiceError::CapabilityUnavailable(Capability::Synthesis) => {
                "La lectura en voz alta no está disponible en este dispositivo.".to_string()
            }
            VoiceError::RecordingBlocked => {
                "Espera a que KIIA termine de hablar para grabar.".to_string()
            }
            VoiceError::PermissionDenied => {
                "Permiso denegado para el micrófono. Por favor, permite el acceso al micrófono."
                    .to_string()
            }
            VoiceError::NoSpeech => {
                "No se detectó voz. Por favor, habla más cerca del micrófono.".to_string()
            }
            VoiceError::AudioCapture => "No se puede acceder al micrófono. Verifica que tu micrófono esté conectado y funcionando.".to_string(),
            VoiceError::Network => "Error de red. Verifica tu conexión a internet.".to_string(),
            VoiceError::Recognition(code) => format!("Error en el reconocimiento de voz: {code}"),
            VoiceError::Synthesis(_) => {
                "No se pudo reproducir la respuesta en voz alta.".to_string()
            }
        }
    }
}

/// Failures of the external prompt service.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("prompt service unreachable: {0}")]
    Unreachable(String),

    #[error("prompt service timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed prompt output: {0}")]
    MalformedOutput(String),
}

impl PromptError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::ExternalService
    }
}

/// Rejections of a user turn submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("message is empty")]
    EmptyInput,

    /// A previous submission is still waiting for its reply.
    #[error("a reply is still pending")]
    TurnInFlight,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_error_taxonomy() {
        assert_eq!(
            VoiceError::CapabilityUnavailable(Capability::Recognition).category(),
            ErrorCategory::CapabilityUnavailable
        );
        assert_eq!(VoiceError::PermissionDenied.category(), ErrorCategory::PermissionDenied);
        assert_eq!(VoiceError::NoSpeech.category(), ErrorCategory::NoInputDetected);
        assert_eq!(VoiceError::Network.category(), ErrorCategory::Transient);
        assert_eq!(
            PromptError::Timeout(Duration::from_secs(15)).category(),
            ErrorCategory::ExternalService
        );
    }

    #[test]
    fn recognition_message_carries_code() {
        let msg = VoiceError::Recognition("bad-grammar".into()).user_message();
        assert!(msg.ends_with("bad-grammar"));
    }
}
