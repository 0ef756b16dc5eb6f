//! KIIA: a voice-enabled emotional-support companion.
//!
//! The [`conversation::Conversation`] owns the message log and drives the
//! [`voice::VoiceController`], which keeps listening and speaking mutually
//! exclusive. Replies come from the canned rule tables in [`replies`] or from
//! a [`prompt::PromptService`] such as the Ollama-backed [`agent::Agent`].

pub mod action_plan;
pub mod agent;
pub mod config;
pub mod conversation;
pub mod emotion;
pub mod error;
pub mod platform;
pub mod prompt;
pub mod replies;
#[cfg(feature = "vosk")]
pub mod speech;
pub mod status;
pub mod tts_engine;
pub mod voice;

#[cfg(test)]
mod test_utils;
