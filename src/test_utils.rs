//! Recording fakes for the platform traits.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{PromptError, VoiceError};
use crate::platform::{
    Capabilities, PlatformClass, RecognitionConfig, SessionId, SpeechRecognizer,
    SpeechSynthesizer, StaticCapabilities, Utterance, VoiceInfo,
};
use crate::prompt::{
    ActionPlanReply, ActionPlanRequest, ProjectPlanRequest, PromptService, SupportReply,
    SupportRequest,
};

#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerCall {
    Start(SessionId, RecognitionConfig),
    Stop,
    Abort,
}

#[derive(Clone, Default)]
pub struct FakeRecognizer {
    pub calls: Arc<Mutex<Vec<RecognizerCall>>>,
    pub fail_with: Option<VoiceError>,
}

impl FakeRecognizer {
    pub fn calls(&self) -> Vec<RecognizerCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn start(&mut self, session: SessionId, config: &RecognitionConfig) -> Result<(), VoiceError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.calls
            .lock()
            .unwrap()
            .push(RecognizerCall::Start(session, config.clone()));
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.lock().unwrap().push(RecognizerCall::Stop);
    }

    fn abort(&mut self) {
        self.calls.lock().unwrap().push(RecognizerCall::Abort);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthesizerCall {
    Speak(Utterance),
    Cancel,
}

#[derive(Clone, Default)]
pub struct FakeSynthesizer {
    pub calls: Arc<Mutex<Vec<SynthesizerCall>>>,
    pub voices: Vec<VoiceInfo>,
    pub fail_with: Option<VoiceError>,
}

impl FakeSynthesizer {
    pub fn calls(&self) -> Vec<SynthesizerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                SynthesizerCall::Speak(u) => Some(u),
                SynthesizerCall::Cancel => None,
            })
            .collect()
    }
}

impl SpeechSynthesizer for FakeSynthesizer {
    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), VoiceError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.calls
            .lock()
            .unwrap()
            .push(SynthesizerCall::Speak(utterance.clone()));
        Ok(())
    }

    fn cancel(&mut self) {
        self.calls.lock().unwrap().push(SynthesizerCall::Cancel);
    }
}

pub fn capabilities(platform_class: PlatformClass) -> StaticCapabilities {
    StaticCapabilities(Capabilities {
        recognition_available: true,
        synthesis_available: true,
        platform_class,
    })
}

/// Prompt service answering every flow with a fixed outcome.
pub struct ScriptedPrompt {
    pub reply: Option<String>,
    pub requests: Arc<Mutex<Vec<SupportRequest>>>,
}

impl ScriptedPrompt {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            requests: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Arc::default(),
        }
    }

    fn outcome(&self) -> Result<String, PromptError> {
        self.reply
            .clone()
            .ok_or_else(|| PromptError::Unreachable("connection refused".into()))
    }
}

#[async_trait]
impl PromptService for ScriptedPrompt {
    async fn provide_support(&self, request: SupportRequest) -> Result<SupportReply, PromptError> {
        self.requests.lock().unwrap().push(request);
        self.outcome().map(|reply_text| SupportReply { reply_text })
    }

    async fn personalized_action_plan(
        &self,
        _request: ActionPlanRequest,
    ) -> Result<ActionPlanReply, PromptError> {
        self.outcome().map(|action_plan| ActionPlanReply { action_plan })
    }

    async fn project_action_plan(
        &self,
        _request: ProjectPlanRequest,
    ) -> Result<ActionPlanReply, PromptError> {
        self.outcome().map(|action_plan| ActionPlanReply { action_plan })
    }
}
