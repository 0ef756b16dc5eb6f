//! Conversation turn manager.
//!
//! Owns the message log and the voice controller. A user turn is always
//! appended before its reply is computed, and the reply is always appended
//! before it is voiced. Only one turn may wait for its reply at a time; a
//! second submission in that window is rejected with
//! [`TurnError::TurnInFlight`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use uuid::Uuid;

use crate::emotion::{classify, EmotionTag};
use crate::error::{Capability, TurnError, VoiceError};
use crate::platform::{UtteranceId, VoiceEvent};
use crate::prompt::{PromptService, SupportFlags, SupportRequest};
use crate::replies::{generate_reply, opening_greeting, APOLOGY_REPLY, CRISIS_GREETING};
use crate::voice::{VoiceController, VoiceOutcome, VoiceSessionState, VoiceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    /// On user messages: the reply KIIA gave, for the replay button.
    pub associated_reply: Option<String>,
}

impl Message {
    fn new(sender: Sender, text: &str) -> Self {
        let prefix = match sender {
            Sender::User => "user",
            Sender::Assistant => "kiia",
        };
        Self {
            id: format!("{prefix}-{}", Uuid::new_v4()),
            text: text.to_string(),
            sender,
            timestamp: Utc::now(),
            associated_reply: None,
        }
    }
}

/// Where replies come from.
pub enum ReplySource {
    /// Local rule table, shown after a short simulated thinking pause.
    Canned { thinking_delay: Duration },
    Service(Arc<dyn PromptService>),
}

/// Fixed for the lifetime of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Mood carried over from the check-in.
    pub initial_emotion: Option<EmotionTag>,
    /// Set by the crisis referral.
    pub crisis_mode: bool,
    pub include_faith_affirmations: bool,
    pub user_name: Option<String>,
    /// Voice every reply as soon as it is appended.
    pub auto_speak: bool,
}

/// Holds the conversation's turn lock; dropping it releases the lock.
#[derive(Debug)]
struct TurnLock(Arc<AtomicBool>);

impl Drop for TurnLock {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A user turn waiting for its reply. The turn lock is held until this is
/// passed to [`Conversation::complete_turn`] or dropped.
#[derive(Debug)]
pub struct PendingTurn {
    user_message_id: String,
    text: String,
    _lock: TurnLock,
}

impl PendingTurn {
    pub fn text(&self) -> &str {
        &self.text
    }
}

pub struct Conversation {
    messages: Vec<Message>,
    config: SessionConfig,
    reply_source: ReplySource,
    voice: VoiceController,
    turn_in_flight: Arc<AtomicBool>,
    voice_error: Option<VoiceError>,
    reported_unavailable: Vec<Capability>,
}

impl Conversation {
    /// Start a session. With a check-in mood the matching opening greeting
    /// is appended and voiced; in crisis mode without a mood the crisis
    /// greeting is.
    pub fn start(config: SessionConfig, reply_source: ReplySource, voice: VoiceController) -> Self {
        let opening = match (config.initial_emotion, config.crisis_mode) {
            (Some(emotion), _) => Some(opening_greeting(emotion)),
            (None, true) => Some(CRISIS_GREETING),
            (None, false) => None,
        };
        let mut conversation = Self {
            messages: Vec::new(),
            config,
            reply_source,
            voice,
            turn_in_flight: Arc::new(AtomicBool::new(false)),
            voice_error: None,
            reported_unavailable: Vec::new(),
        };
        if let Some(text) = opening {
            log::info!("Opening turn: {}", text);
            conversation.messages.push(Message::new(Sender::Assistant, text));
            conversation.say(text);
        }
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn crisis_mode(&self) -> bool {
        self.config.crisis_mode
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.turn_in_flight.load(Ordering::Acquire)
    }

    /// Emotion of the latest non-empty message.
    pub fn emotion(&self) -> EmotionTag {
        self.messages
            .iter()
            .rev()
            .find(|m| !m.text.trim().is_empty())
            .map(|m| classify(&m.text))
            .unwrap_or(EmotionTag::Neutral)
    }

    pub fn assistant_turn_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sender == Sender::Assistant)
            .count()
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Assistant)
    }

    pub fn voice_state(&self) -> VoiceSessionState {
        self.voice.snapshot()
    }

    pub fn voice_mode(&self) -> VoiceState {
        self.voice.state()
    }

    /// The error currently shown in the inline banner.
    pub fn voice_error(&self) -> Option<&VoiceError> {
        self.voice_error.as_ref()
    }

    pub fn dismiss_voice_error(&mut self) {
        self.voice_error = None;
    }

    fn surface(&mut self, err: VoiceError) {
        match &err {
            VoiceError::CapabilityUnavailable(cap) => {
                if self.reported_unavailable.contains(cap) {
                    return;
                }
                self.reported_unavailable.push(*cap);
            }
            // A reply that could not be read aloud is still in the log.
            VoiceError::Synthesis(_) => return,
            _ => {}
        }
        self.voice_error = Some(err);
    }

    fn say(&mut self, text: &str) -> Option<UtteranceId> {
        match self.voice.speak(text) {
            Ok(id) => Some(id),
            Err(e) => {
                self.surface(e);
                None
            }
        }
    }

    /// Append the user message and take the turn lock.
    pub fn begin_user_turn(&mut self, text: &str) -> Result<PendingTurn, TurnError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyInput);
        }
        if self.turn_in_flight.swap(true, Ordering::AcqRel) {
            log::warn!("Rejecting user turn while a reply is pending");
            return Err(TurnError::TurnInFlight);
        }
        let lock = TurnLock(Arc::clone(&self.turn_in_flight));
        let message = Message::new(Sender::User, text);
        log::info!("User turn: {}", text);
        let pending = PendingTurn {
            user_message_id: message.id.clone(),
            text: message.text.clone(),
            _lock: lock,
        };
        self.messages.push(message);
        Ok(pending)
    }

    /// Produce the reply for `pending`. Service failures become the apology.
    pub async fn compute_reply(&self, pending: &PendingTurn) -> String {
        match &self.reply_source {
            ReplySource::Canned { thinking_delay } => {
                if !thinking_delay.is_zero() {
                    sleep(*thinking_delay).await;
                }
                generate_reply(&pending.text, self.config.initial_emotion).to_string()
            }
            ReplySource::Service(service) => {
                let request = SupportRequest {
                    user_text: pending.text.clone(),
                    flags: SupportFlags {
                        crisis_mode: self.config.crisis_mode,
                        include_faith_affirmations: self.config.include_faith_affirmations,
                        user_name: self.config.user_name.clone(),
                    },
                };
                match service.provide_support(request).await {
                    Ok(reply) => reply.reply_text,
                    Err(e) => {
                        log::error!("Prompt service failed: {e}");
                        APOLOGY_REPLY.to_string()
                    }
                }
            }
        }
    }

    /// Append the reply, release the turn lock and voice the reply.
    pub fn complete_turn(&mut self, pending: PendingTurn, reply: String) -> Message {
        let PendingTurn {
            user_message_id,
            _lock: lock,
            ..
        } = pending;
        if let Some(user) = self.messages.iter_mut().find(|m| m.id == user_message_id) {
            user.associated_reply = Some(reply.clone());
        }
        let message = Message::new(Sender::Assistant, &reply);
        log::info!("Assistant response: {}", reply);
        self.messages.push(message.clone());
        drop(lock);
        if self.config.auto_speak {
            self.say(&reply);
        }
        message
    }

    /// Submit a typed or transcribed message and return the reply turn.
    pub async fn submit_user_turn(&mut self, text: &str) -> Result<Message, TurnError> {
        let pending = self.begin_user_turn(text)?;
        let reply = self.compute_reply(&pending).await;
        Ok(self.complete_turn(pending, reply))
    }

    pub fn start_recording(&mut self) -> Result<(), VoiceError> {
        match self.voice.start_recording() {
            Ok(()) => {
                self.voice_error = None;
                Ok(())
            }
            Err(e) => {
                self.surface(e.clone());
                Err(e)
            }
        }
    }

    /// Stop recording. What was heard is submitted once the recognizer's
    /// closing events reach [`handle_voice_event`](Self::handle_voice_event).
    pub fn stop_recording(&mut self) {
        self.voice.stop_recording();
    }

    pub fn stop_speaking(&mut self) {
        self.voice.stop_speaking();
    }

    /// Feed a platform callback through the controller. A finished
    /// transcript becomes a user turn; errors land in the banner.
    pub async fn handle_voice_event(
        &mut self,
        event: VoiceEvent,
    ) -> Result<Option<Message>, TurnError> {
        match self.voice.handle_event(event) {
            Some(VoiceOutcome::Transcript(text)) => {
                log::debug!("Heard: {}", text);
                self.submit_user_turn(&text).await.map(Some)
            }
            Some(VoiceOutcome::Error(e)) => {
                self.surface(e);
                Ok(None)
            }
            Some(VoiceOutcome::SpeechFinished(_)) | None => Ok(None),
        }
    }

    /// Read the most recent assistant message aloud again.
    pub fn replay_last_reply(&mut self) -> Option<UtteranceId> {
        let text = self.last_assistant_message()?.text.clone();
        self.say(&text)
    }

    /// Read aloud the reply given to the user message `message_id`.
    pub fn replay_reply_for(&mut self, message_id: &str) -> Option<UtteranceId> {
        let text = self
            .messages
            .iter()
            .find(|m| m.id == message_id)?
            .associated_reply
            .clone()?;
        self.say(&text)
    }
}
