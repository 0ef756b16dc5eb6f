//! Keyword emotion classifier and the daily check-in moods.
//!
//! [`classify`] scans Spanish free text against ordered pattern groups. The
//! first group that matches wins, so a message that is both happy and sad
//! resolves to happy. Patterns are case-insensitive and accept accented and
//! unaccented spellings.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Coarse emotion tag derived from text or carried from a mood check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTag {
    Happy,
    Sad,
    Angry,
    Anxious,
    Neutral,
}

impl EmotionTag {
    pub const ALL: [EmotionTag; 5] = [
        EmotionTag::Happy,
        EmotionTag::Sad,
        EmotionTag::Angry,
        EmotionTag::Anxious,
        EmotionTag::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionTag::Happy => "happy",
            EmotionTag::Sad => "sad",
            EmotionTag::Angry => "angry",
            EmotionTag::Anxious => "anxious",
            EmotionTag::Neutral => "neutral",
        }
    }
}

impl fmt::Display for EmotionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the tag names (`"anxious"`) as well as check-in mood keys and
/// display names (`"ansioso"`, `"Ansioso"`).
impl FromStr for EmotionTag {
    type Err = UnknownMood;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if let Some(tag) = EmotionTag::ALL.iter().find(|t| t.as_str() == lower) {
            return Ok(*tag);
        }
        Mood::parse(&lower).map(|m| m.emotion())
    }
}

/// (tag, pattern) in evaluation order.
static EMOTION_PATTERNS: Lazy<Vec<(EmotionTag, Regex)>> = Lazy::new(|| {
    [
        (
            EmotionTag::Happy,
            r"feliz|content[ao]|alegr(?:e|a|[ií]a)|genial|bien|excelente|fant[aá]stic[ao]|maravillos[ao]|incre[ií]ble",
        ),
        (
            EmotionTag::Sad,
            r"triste|deprimid[ao]|llor[ao]|mal|desanimad[ao]|desesperad[ao]|solo|sola|vac[ií]o",
        ),
        (
            EmotionTag::Angry,
            r"enojad[ao]|molest[ao]|furios[ao]|rabia|ira|fastidiad[ao]|odio",
        ),
        (
            EmotionTag::Anxious,
            r"ansios[ao]|estresad[ao]|preocupad[ao]|nervios[ao]|mied[ao]|temor|p[aá]nico|incertidumbre",
        ),
    ]
    .into_iter()
    .filter_map(|(tag, pattern)| match Regex::new(&format!("(?i){pattern}")) {
        Ok(re) => Some((tag, re)),
        Err(e) => {
            log::error!("Invalid emotion pattern for {tag}: {e}");
            None
        }
    })
    .collect()
});

/// Detect the predominant emotion in `text`. Total: empty or unmatched
/// input is [`EmotionTag::Neutral`].
pub fn classify(text: &str) -> EmotionTag {
    EMOTION_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(tag, _)| *tag)
        .unwrap_or(EmotionTag::Neutral)
}

/// A mood that could not be recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mood '{0}'")]
pub struct UnknownMood(pub String);

/// The six moods offered by the daily check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Feliz,
    Tranquilo,
    Neutral,
    Triste,
    Ansioso,
    Enojado,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Feliz,
        Mood::Tranquilo,
        Mood::Neutral,
        Mood::Triste,
        Mood::Ansioso,
        Mood::Enojado,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Mood::Feliz => "feliz",
            Mood::Tranquilo => "tranquilo",
            Mood::Neutral => "neutral",
            Mood::Triste => "triste",
            Mood::Ansioso => "ansioso",
            Mood::Enojado => "enojado",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mood::Feliz => "Feliz",
            Mood::Tranquilo => "Tranquilo",
            Mood::Neutral => "Neutral",
            Mood::Triste => "Triste",
            Mood::Ansioso => "Ansioso",
            Mood::Enojado => "Enojado",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mood::Feliz => "Me siento alegre y positivo.",
            Mood::Tranquilo => "Me siento calmado y en paz.",
            Mood::Neutral => "No me siento particularmente bien ni mal.",
            Mood::Triste => "Me siento decaído o triste.",
            Mood::Ansioso => "Me siento inquieto o ansioso.",
            Mood::Enojado => "Me siento irritado o enojado.",
        }
    }

    /// Case-insensitive lookup by key or display name.
    pub fn parse(s: &str) -> Result<Mood, UnknownMood> {
        let lower = s.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|m| m.key() == lower)
            .ok_or_else(|| UnknownMood(s.trim().to_string()))
    }

    /// Tranquilo has no tag of its own and maps to neutral.
    pub fn emotion(&self) -> EmotionTag {
        match self {
            Mood::Feliz => EmotionTag::Happy,
            Mood::Tranquilo | Mood::Neutral => EmotionTag::Neutral,
            Mood::Triste => EmotionTag::Sad,
            Mood::Ansioso => EmotionTag::Anxious,
            Mood::Enojado => EmotionTag::Angry,
        }
    }

    /// The daily check-in sentence sent to the action-plan flow.
    pub fn check_in_text(&self) -> String {
        format!("Hoy me siento: {}.", self.display_name())
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sad_sentence_is_sad() {
        assert_eq!(classify("Hola, me siento muy triste hoy"), EmotionTag::Sad);
    }

    #[test]
    fn happy_wins_over_sad() {
        assert_eq!(classify("estoy feliz pero también triste"), EmotionTag::Happy);
    }

    #[test]
    fn empty_and_unmatched_are_neutral() {
        assert_eq!(classify(""), EmotionTag::Neutral);
        assert_eq!(classify("   "), EmotionTag::Neutral);
        assert_eq!(classify("hoy fui al mercado"), EmotionTag::Neutral);
    }

    #[test]
    fn matching_ignores_case_and_accents() {
        assert_eq!(classify("ESTOY FURIOSO"), EmotionTag::Angry);
        assert_eq!(classify("siento PÁNICO"), EmotionTag::Anxious);
        assert_eq!(classify("siento panico"), EmotionTag::Anxious);
        assert_eq!(classify("fue increible"), EmotionTag::Happy);
        assert_eq!(classify("fue INCREÍBLE"), EmotionTag::Happy);
        assert_eq!(classify("me siento vacío"), EmotionTag::Sad);
        assert_eq!(classify("me alegra verte"), EmotionTag::Happy);
        assert_eq!(classify("qué ALEGRÍA"), EmotionTag::Happy);
    }

    #[test]
    fn anxious_needs_earlier_groups_to_miss() {
        assert_eq!(classify("estoy muy preocupada"), EmotionTag::Anxious);
        assert_eq!(classify("preocupada pero bien"), EmotionTag::Happy);
    }

    #[test]
    fn mood_parse_and_mapping() {
        assert_eq!(Mood::parse("Ansioso"), Ok(Mood::Ansioso));
        assert_eq!(Mood::parse(" enojado "), Ok(Mood::Enojado));
        assert!(Mood::parse("eufórico").is_err());
        assert_eq!(Mood::Tranquilo.emotion(), EmotionTag::Neutral);
        assert_eq!(Mood::Triste.check_in_text(), "Hoy me siento: Triste.");
    }

    #[test]
    fn emotion_tag_from_str_accepts_both_vocabularies() {
        assert_eq!("ansioso".parse::<EmotionTag>(), Ok(EmotionTag::Anxious));
        assert_eq!("Anxious".parse::<EmotionTag>(), Ok(EmotionTag::Anxious));
        assert_eq!("feliz".parse::<EmotionTag>(), Ok(EmotionTag::Happy));
        assert!("meh".parse::<EmotionTag>().is_err());
    }
}
