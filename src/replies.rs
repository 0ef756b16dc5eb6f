//! Canned replies used when no prompt service is configured.
//!
//! Replies are picked from fixed tables by ordered substring rules, so the
//! same input always produces the same reply. Emotion-specific rules are only
//! consulted when the session carries a mood from the check-in.

use crate::emotion::EmotionTag;

/// Substituted for the reply whenever the prompt service fails.
pub const APOLOGY_REPLY: &str = "Lo siento, parece que tengo problemas para conectarme. Por favor, inténtalo de nuevo más tarde.";

/// Returned when no rule matches.
pub const FALLBACK_REPLY: &str = "Gracias por compartir eso conmigo. Es importante que tengas un espacio seguro para expresarte. ¿Hay algo más específico en lo que pueda ayudarte hoy?";

/// Opening turn for sessions started from the crisis referral.
pub const CRISIS_GREETING: &str = "Hola, KIIA está aquí para ayudarte. Entiendo que puedes estar pasando por un momento difícil. Por favor, cuéntame qué sucede, estoy aquí para escucharte y apoyarte.";

pub const GREETING_REPLY: &str = "¡Hola! Soy KIIA, tu compañera de apoyo emocional. Estoy aquí para escucharte y ayudarte. ¿Cómo te sientes hoy?";

pub const SADNESS_REPLY: &str = "Entiendo que te sientes así. Es completamente normal tener días difíciles. ¿Te gustaría contarme más sobre lo que te está pasando? Estoy aquí para escucharte sin juzgarte.";

/// A reply selected when any keyword is a substring of the lowercased input.
struct ReplyRule {
    keywords: &'static [&'static str],
    reply: &'static str,
}

impl ReplyRule {
    fn matches(&self, lower: &str) -> bool {
        self.keywords.iter().any(|k| lower.contains(k))
    }
}

const GREETING_RULE: ReplyRule = ReplyRule {
    keywords: &["hola", "buenos días", "buenas"],
    reply: GREETING_REPLY,
};

/// Content rules in precedence order, after the greeting.
const GENERAL_RULES: &[ReplyRule] = &[
    ReplyRule {
        keywords: &["triste", "deprimido", "mal"],
        reply: SADNESS_REPLY,
    },
    ReplyRule {
        keywords: &["estrés", "ansiedad", "nervioso"],
        reply: "El estrés y la ansiedad pueden ser muy abrumadores. Te sugiero que respires profundamente por unos momentos. ¿Qué te está causando esta sensación? Juntos podemos encontrar formas de manejarlo.",
    },
    ReplyRule {
        keywords: &["gracias", "grax"],
        reply: "¡De nada! Estoy aquí para ti siempre que lo necesites. Recuerda que no estás solo en esto.",
    },
    ReplyRule {
        keywords: &["ayuda", "ayúdame"],
        reply: "Por supuesto, estoy aquí para ayudarte. ¿En qué puedo asistirte hoy? Puedes contarme cualquier cosa que tengas en mente.",
    },
    ReplyRule {
        keywords: &["feliz", "contento", "bien"],
        reply: "¡Me alegra mucho saber que te sientes bien! Es importante celebrar esos momentos positivos. ¿Qué te está haciendo sentir así?",
    },
    ReplyRule {
        keywords: &["amor", "relación", "pareja"],
        reply: "Las relaciones pueden ser complejas y hermosas al mismo tiempo. ¿Te gustaría hablar más sobre esto? Estoy aquí para escucharte.",
    },
    ReplyRule {
        keywords: &["trabajo", "empleo", "carrera"],
        reply: "El trabajo puede ser una fuente importante de satisfacción y también de estrés. ¿Cómo te sientes con tu situación laboral actual?",
    },
];

const HAPPY_RULES: &[ReplyRule] = &[
    ReplyRule {
        keywords: &["logr", "celebr"],
        reply: "¡Eso merece celebrarse! Cada logro, por pequeño que sea, habla de tu esfuerzo. ¿Cómo te gustaría celebrarlo?",
    },
    ReplyRule {
        keywords: &["compart"],
        reply: "Compartir la alegría la multiplica. Cuéntame todo, me encanta escucharte así.",
    },
];

const SAD_RULES: &[ReplyRule] = &[
    ReplyRule {
        keywords: &["solo", "sola", "nadie"],
        reply: "Sentirse en soledad duele mucho. Quiero que sepas que ahora mismo no estás sin compañía: estoy aquí contigo. ¿Hay alguien de confianza a quien podrías escribirle hoy?",
    },
    ReplyRule {
        keywords: &["llor"],
        reply: "Llorar también es una forma de cuidarte y soltar lo que pesa. Tómate el tiempo que necesites, aquí sigo.",
    },
];

const ANGRY_RULES: &[ReplyRule] = &[
    ReplyRule {
        keywords: &["grit", "explot"],
        reply: "Cuando el enojo sube tanto, ayuda hacer una pausa. Prueba apretar los puños con fuerza cinco segundos y luego soltarlos despacio. ¿Qué pasó justo antes?",
    },
    ReplyRule {
        keywords: &["injust"],
        reply: "Es comprensible enojarse ante algo que se siente injusto. Tu molestia es válida. ¿Qué te gustaría que hubiera sido diferente?",
    },
];

const ANXIOUS_RULES: &[ReplyRule] = &[
    ReplyRule {
        keywords: &["respir", "ahog"],
        reply: "Vamos a respirar juntos: inhala contando hasta cuatro, sostén dos segundos y exhala lentamente contando hasta seis. Repítelo tres veces y dime cómo te sientes.",
    },
    ReplyRule {
        keywords: &["dormir", "insomnio"],
        reply: "La ansiedad suele quitarnos el sueño. Intenta dejar las pantallas un rato y escribir en un papel lo que te preocupa, para que tu mente no tenga que sostenerlo toda la noche.",
    },
    ReplyRule {
        keywords: &["examen", "entrevista"],
        reply: "Es normal sentir nervios ante algo importante. Dividamos la preparación en pasos pequeños. ¿Qué es lo primero que podrías repasar hoy?",
    },
];

fn emotion_rules(emotion: EmotionTag) -> &'static [ReplyRule] {
    match emotion {
        EmotionTag::Happy => HAPPY_RULES,
        EmotionTag::Sad => SAD_RULES,
        EmotionTag::Angry => ANGRY_RULES,
        EmotionTag::Anxious => ANXIOUS_RULES,
        EmotionTag::Neutral => &[],
    }
}

/// Pick the canned reply for `user_text`.
///
/// A greeting that also carries content ("Hola, me siento triste") answers
/// the content rather than the greeting.
pub fn generate_reply(user_text: &str, initial_emotion: Option<EmotionTag>) -> &'static str {
    let lower = user_text.to_lowercase();

    if let Some(emotion) = initial_emotion {
        if let Some(rule) = emotion_rules(emotion).iter().find(|r| r.matches(&lower)) {
            return rule.reply;
        }
    }

    if let Some(rule) = GENERAL_RULES.iter().find(|r| r.matches(&lower)) {
        return rule.reply;
    }
    if GREETING_RULE.matches(&lower) {
        return GREETING_RULE.reply;
    }
    FALLBACK_REPLY
}

/// Opening assistant turn for a session started from a mood check-in.
pub fn opening_greeting(emotion: EmotionTag) -> &'static str {
    match emotion {
        EmotionTag::Happy => "¡Qué alegría que hoy te sientas bien! Soy KIIA. Me encantaría saber qué ha hecho especial tu día.",
        EmotionTag::Sad => "Hola, soy KIIA. Veo que hoy te sientes triste. Estoy aquí contigo, sin prisa y sin juicios. ¿Quieres contarme qué pasó?",
        EmotionTag::Angry => "Hola, soy KIIA. Noto que algo te ha molestado. Está bien sentir enojo. ¿Qué te hizo sentir así?",
        EmotionTag::Anxious => "Hola, soy KIIA. Siento que hoy estás con ansiedad. Respiremos juntos un momento: inhala contando hasta cuatro y exhala contando hasta seis. ¿Qué te está preocupando?",
        EmotionTag::Neutral => "Hola, soy KIIA. Gracias por pasar por aquí. ¿Cómo ha ido tu día hasta ahora?",
    }
}
