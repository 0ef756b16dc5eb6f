//! End-to-end conversation scenarios through the public API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kiia::conversation::{Conversation, ReplySource, Sender, SessionConfig};
use kiia::emotion::{classify, EmotionTag};
use kiia::error::{PromptError, VoiceError};
use kiia::platform::{
    Capabilities, PlatformClass, RecognitionConfig, RecognitionEvent, SessionId,
    SpeechRecognizer, SpeechSynthesizer, StaticCapabilities, Utterance, VoiceEvent, VoiceInfo,
};
use kiia::prompt::{
    ActionPlanReply, ActionPlanRequest, ProjectPlanRequest, PromptService, SupportReply,
    SupportRequest,
};
use kiia::replies::{generate_reply, opening_greeting, APOLOGY_REPLY, SADNESS_REPLY};
use kiia::voice::{SpeechSettings, VoiceController};

#[derive(Clone, Default)]
struct Mic {
    sessions: Arc<Mutex<Vec<(SessionId, RecognitionConfig)>>>,
}

impl SpeechRecognizer for Mic {
    fn start(&mut self, session: SessionId, config: &RecognitionConfig) -> Result<(), VoiceError> {
        self.sessions.lock().unwrap().push((session, config.clone()));
        Ok(())
    }

    fn stop(&mut self) {}

    fn abort(&mut self) {}
}

#[derive(Clone, Default)]
struct Speaker {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl SpeechSynthesizer for Speaker {
    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), VoiceError> {
        self.spoken.lock().unwrap().push(utterance.text.clone());
        Ok(())
    }

    fn cancel(&mut self) {}
}

struct DownService;

#[async_trait]
impl PromptService for DownService {
    async fn provide_support(&self, _request: SupportRequest) -> Result<SupportReply, PromptError> {
        Err(PromptError::Timeout(Duration::from_secs(15)))
    }

    async fn personalized_action_plan(
        &self,
        _request: ActionPlanRequest,
    ) -> Result<ActionPlanReply, PromptError> {
        Err(PromptError::Unreachable("connection refused".into()))
    }

    async fn project_action_plan(
        &self,
        _request: ProjectPlanRequest,
    ) -> Result<ActionPlanReply, PromptError> {
        Err(PromptError::Unreachable("connection refused".into()))
    }
}

fn session(
    config: SessionConfig,
    source: ReplySource,
    platform_class: PlatformClass,
) -> (Conversation, Mic, Speaker) {
    let mic = Mic::default();
    let speaker = Speaker::default();
    let capabilities = StaticCapabilities(Capabilities {
        recognition_available: true,
        synthesis_available: true,
        platform_class,
    });
    let voice = VoiceController::new(
        &capabilities,
        Box::new(mic.clone()),
        Box::new(speaker.clone()),
        SpeechSettings::default(),
    );
    (Conversation::start(config, source, voice), mic, speaker)
}

fn canned() -> ReplySource {
    ReplySource::Canned {
        thinking_delay: Duration::ZERO,
    }
}

#[test]
fn sad_greeting_gets_sadness_acknowledgment() {
    let text = "Hola, me siento muy triste hoy";
    assert_eq!(classify(text), EmotionTag::Sad);
    assert_eq!(generate_reply(text, None), SADNESS_REPLY);
}

#[tokio::test]
async fn anxious_check_in_opens_with_voiced_greeting() {
    let config = SessionConfig {
        initial_emotion: Some("ansioso".parse().unwrap()),
        auto_speak: true,
        ..Default::default()
    };
    let (conversation, _, speaker) = session(config, canned(), PlatformClass::Desktop);

    let messages = conversation.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, Sender::Assistant);
    assert_eq!(messages[0].text, opening_greeting(EmotionTag::Anxious));
    assert_eq!(*speaker.spoken.lock().unwrap(), vec![messages[0].text.clone()]);
}

#[tokio::test]
async fn recording_is_refused_while_speaking() {
    let config = SessionConfig {
        auto_speak: true,
        ..Default::default()
    };
    let (mut conversation, mic, _) = session(config, canned(), PlatformClass::Desktop);
    conversation.submit_user_turn("gracias").await.unwrap();
    assert!(conversation.voice_state().is_speaking);

    assert_eq!(conversation.start_recording(), Err(VoiceError::RecordingBlocked));
    let state = conversation.voice_state();
    assert!(state.is_speaking);
    assert!(!state.is_listening);
    assert!(!state.can_record);
    assert!(mic.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_service_yields_one_apology_turn() {
    let config = SessionConfig {
        auto_speak: true,
        ..Default::default()
    };
    let (mut conversation, _, speaker) =
        session(config, ReplySource::Service(Arc::new(DownService)), PlatformClass::Desktop);

    let reply = conversation
        .submit_user_turn("necesito ayuda con mi proyecto")
        .await
        .unwrap();
    assert_eq!(reply.text, APOLOGY_REPLY);

    let messages = conversation.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[0].text, "necesito ayuda con mi proyecto");
    assert_eq!(
        messages.iter().filter(|m| m.sender == Sender::Assistant).count(),
        1
    );
    assert_eq!(*speaker.spoken.lock().unwrap(), vec![APOLOGY_REPLY.to_string()]);
}

#[tokio::test]
async fn mobile_final_result_becomes_one_user_turn() {
    let (mut conversation, mic, _) =
        session(SessionConfig::default(), canned(), PlatformClass::Mobile);
    conversation.start_recording().unwrap();

    let (id, config) = mic.sessions.lock().unwrap()[0].clone();
    assert!(!config.continuous);
    assert!(!config.interim_results);

    for event in [
        RecognitionEvent::Started,
        RecognitionEvent::Result {
            transcript: "me siento sola".into(),
            is_final: true,
        },
        RecognitionEvent::Ended,
    ] {
        conversation
            .handle_voice_event(VoiceEvent::Recognition { session: id, event })
            .await
            .unwrap();
    }

    let users: Vec<_> = conversation
        .messages()
        .iter()
        .filter(|m| m.sender == Sender::User)
        .collect();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].text, "me siento sola");
    assert_eq!(conversation.assistant_turn_count(), 1);
}
