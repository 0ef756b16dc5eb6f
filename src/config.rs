//! Runtime configuration read from environment variables.
//!
//! Every setting has a default; a value that cannot be parsed is logged and
//! replaced by the default so a typo never prevents start-up.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::emotion::Mood;
use crate::platform::{PlatformClass, VoicePreference};
use crate::voice::SpeechSettings;

/// Where user turns get their replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    #[default]
    Canned,
    Ollama,
}

impl FromStr for ReplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "canned" | "local" => Ok(ReplyMode::Canned),
            "ollama" | "llm" => Ok(ReplyMode::Ollama),
            other => Err(format!("unknown reply mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub language: String,
    pub reply_mode: ReplyMode,
    pub model_name: String,
    pub ollama_host: String,
    pub ollama_port: u16,
    pub request_timeout: Duration,
    pub user_name: Option<String>,
    pub include_faith_affirmations: bool,
    pub crisis_mode: bool,
    pub initial_mood: Option<Mood>,
    pub platform: PlatformClass,
    pub voice_names: Vec<String>,
    pub speech_rate: f32,
    pub thinking_delay: Duration,
    pub vosk_model_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "es-ES".to_string(),
            reply_mode: ReplyMode::Canned,
            model_name: "qwen3:1.7b".to_string(),
            ollama_host: "http://localhost".to_string(),
            ollama_port: 11434,
            request_timeout: Duration::from_secs(15),
            user_name: None,
            include_faith_affirmations: false,
            crisis_mode: false,
            initial_mood: None,
            platform: PlatformClass::Desktop,
            voice_names: Vec::new(),
            speech_rate: 0.9,
            thinking_delay: Duration::from_millis(1000),
            vosk_model_path: None,
        }
    }
}

impl Config {
    /// Read the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            language: get("KIIA_LANGUAGE").unwrap_or(defaults.language),
            reply_mode: parsed(&get, "KIIA_REPLY_MODE", defaults.reply_mode),
            model_name: get("MODEL_NAME").unwrap_or(defaults.model_name),
            ollama_host: get("OLLAMA_HOST").unwrap_or(defaults.ollama_host),
            ollama_port: parsed(&get, "OLLAMA_PORT", defaults.ollama_port),
            request_timeout: Duration::from_secs(parsed(
                &get,
                "KIIA_REQUEST_TIMEOUT",
                defaults.request_timeout.as_secs(),
            )),
            user_name: get("KIIA_USER_NAME"),
            include_faith_affirmations: flag(
                &get,
                "KIIA_FAITH_AFFIRMATIONS",
                defaults.include_faith_affirmations,
            ),
            crisis_mode: flag(&get, "KIIA_CRISIS_MODE", defaults.crisis_mode),
            initial_mood: get("KIIA_INITIAL_MOOD").and_then(|v| match Mood::parse(&v) {
                Ok(mood) => Some(mood),
                Err(e) => {
                    log::warn!("Ignoring KIIA_INITIAL_MOOD: {e}");
                    None
                }
            }),
            platform: get("KIIA_PLATFORM")
                .and_then(|v| {
                    let class = PlatformClass::parse(&v);
                    if class.is_none() {
                        log::warn!("Invalid KIIA_PLATFORM '{v}', using desktop");
                    }
                    class
                })
                .unwrap_or(defaults.platform),
            voice_names: get("VOICE_NAME")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            speech_rate: parsed(&get, "KIIA_SPEECH_RATE", defaults.speech_rate),
            thinking_delay: Duration::from_millis(parsed(
                &get,
                "KIIA_THINKING_DELAY_MS",
                defaults.thinking_delay.as_millis() as u64,
            )),
            vosk_model_path: get("VOSK_MODEL_PATH"),
        }
    }

    pub fn speech_settings(&self) -> SpeechSettings {
        SpeechSettings {
            language: self.language.clone(),
            rate: self.speech_rate,
            preference: VoicePreference::new(self.voice_names.clone()),
            ..SpeechSettings::default()
        }
    }
}

fn parsed<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Invalid value '{raw}' for {key}, using default");
            default
        }),
        None => default,
    }
}

fn flag<G>(get: &G, key: &str, default: bool) -> bool
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "si" | "sí") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no") => false,
        Some(v) => {
            log::warn!("Invalid value '{v}' for {key}, using default");
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        assert_eq!(config(&[]), Config::default());
    }

    #[test]
    fn reads_values() {
        let c = config(&[
            ("KIIA_REPLY_MODE", "Ollama"),
            ("OLLAMA_PORT", "11500"),
            ("KIIA_CRISIS_MODE", "true"),
            ("KIIA_INITIAL_MOOD", "Triste"),
            ("KIIA_PLATFORM", "mobile"),
            ("VOICE_NAME", "Monica, Google español ,"),
            ("KIIA_THINKING_DELAY_MS", "0"),
            ("KIIA_USER_NAME", "  Ana "),
        ]);
        assert_eq!(c.reply_mode, ReplyMode::Ollama);
        assert_eq!(c.ollama_port, 11500);
        assert!(c.crisis_mode);
        assert_eq!(c.initial_mood, Some(Mood::Triste));
        assert_eq!(c.platform, PlatformClass::Mobile);
        assert_eq!(c.voice_names, vec!["Monica", "Google español"]);
        assert_eq!(c.thinking_delay, Duration::ZERO);
        assert_eq!(c.user_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn invalid_values_fall_back() {
        let c = config(&[
            ("KIIA_REPLY_MODE", "gpt"),
            ("OLLAMA_PORT", "not-a-port"),
            ("KIIA_SPEECH_RATE", "fast"),
            ("KIIA_FAITH_AFFIRMATIONS", "maybe"),
            ("KIIA_INITIAL_MOOD", "eufórico"),
            ("KIIA_PLATFORM", "tablet"),
            ("MODEL_NAME", "   "),
        ]);
        let d = Config::default();
        assert_eq!(c.reply_mode, d.reply_mode);
        assert_eq!(c.ollama_port, d.ollama_port);
        assert_eq!(c.speech_rate, d.speech_rate);
        assert!(!c.include_faith_affirmations);
        assert_eq!(c.initial_mood, None);
        assert_eq!(c.platform, PlatformClass::Desktop);
        assert_eq!(c.model_name, d.model_name);
    }

    #[test]
    fn speech_settings_carry_language_rate_and_voices() {
        let c = config(&[
            ("KIIA_LANGUAGE", "es-MX"),
            ("KIIA_SPEECH_RATE", "1.2"),
            ("VOICE_NAME", "Paulina"),
        ]);
        let s = c.speech_settings();
        assert_eq!(s.language, "es-MX");
        assert_eq!(s.rate, 1.2);
        assert_eq!(s.pitch, 1.0);
        assert_eq!(s.preference.preferred_names, vec!["Paulina"]);
    }
}
