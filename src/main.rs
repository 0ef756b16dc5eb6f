//! Terminal front end for KIIA.
//!
//! Typed lines become user turns and every reply is voiced through the
//! configured synthesizer. Commands:
//!
//!  * `/mic`: start recording, or stop and send what was heard.
//!  * `/stop`: silence the current reply.
//!  * `/repeat`: read the last reply aloud again.
//!  * `/plan [mood]`: personalized action plan for a check-in mood.
//!  * `/project <description>`: step-by-step plan for a project.
//!  * `/quit`: exit.
//!
//! Configuration comes from environment variables (see `config.rs`); a
//! `.env` file is loaded first if present.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

use kiia::action_plan::{self, ActionPlan, PlanElementKind, PLAN_ERROR_MESSAGE};
use kiia::agent::Agent;
use kiia::config::{Config, ReplyMode};
use kiia::conversation::{Conversation, ReplySource, Sender, SessionConfig};
use kiia::emotion::Mood;
use kiia::platform::{
    event_channel, Capabilities, EventSender, NoRecognizer, SpeechRecognizer, SpeechSynthesizer,
    StaticCapabilities,
};
use kiia::prompt::PromptService;
use kiia::status::StatusFiles;
use kiia::tts_engine::ConsoleSynthesizer;
use kiia::voice::VoiceController;

#[cfg(feature = "native-tts")]
fn build_synthesizer(events: EventSender) -> Box<dyn SpeechSynthesizer> {
    match kiia::tts_engine::TtsEngine::new(events.clone()) {
        Ok(engine) => Box::new(engine),
        Err(e) => {
            log::warn!("{e:#}. Falling back to console output.");
            Box::new(ConsoleSynthesizer::new(events))
        }
    }
}

#[cfg(not(feature = "native-tts"))]
fn build_synthesizer(events: EventSender) -> Box<dyn SpeechSynthesizer> {
    Box::new(ConsoleSynthesizer::new(events))
}

#[cfg(feature = "vosk")]
fn build_recognizer(config: &Config, events: EventSender) -> Option<Box<dyn SpeechRecognizer>> {
    let Some(model_path) = config.vosk_model_path.as_deref() else {
        log::info!("VOSK_MODEL_PATH not set, voice input disabled");
        return None;
    };
    match kiia::speech::VoskRecognizer::new(model_path, events) {
        Ok(recognizer) => Some(Box::new(recognizer)),
        Err(e) => {
            log::warn!("Speech recognition unavailable: {e:#}");
            None
        }
    }
}

#[cfg(not(feature = "vosk"))]
fn build_recognizer(_config: &Config, _events: EventSender) -> Option<Box<dyn SpeechRecognizer>> {
    None
}

enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "Comandos: /mic  /stop  /repeat  /plan [ánimo]  /project <descripción>  /quit";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from `.env` if present.
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    log::debug!("Configuration: {:?}", config);

    let (events, mut event_rx) = event_channel();
    let recognizer = build_recognizer(&config, events.clone());
    let capabilities = StaticCapabilities(Capabilities {
        recognition_available: recognizer.is_some(),
        synthesis_available: true,
        platform_class: config.platform,
    });
    let recognizer = recognizer.unwrap_or_else(|| Box::new(NoRecognizer));
    let voice = VoiceController::new(
        &capabilities,
        recognizer,
        build_synthesizer(events),
        config.speech_settings(),
    );

    let service: Option<Arc<dyn PromptService>> = match config.reply_mode {
        ReplyMode::Ollama => {
            log::info!(
                "Using Ollama model '{}' at {}:{}",
                config.model_name,
                config.ollama_host,
                config.ollama_port
            );
            Some(Arc::new(Agent::new(
                &config.ollama_host,
                config.ollama_port,
                &config.model_name,
                config.request_timeout,
            )))
        }
        ReplyMode::Canned => None,
    };
    let reply_source = match &service {
        Some(service) => ReplySource::Service(Arc::clone(service)),
        None => ReplySource::Canned {
            thinking_delay: config.thinking_delay,
        },
    };

    let status = match StatusFiles::new() {
        Ok(status) => {
            if let Err(e) = status.set_pid() {
                log::warn!("{e:#}");
            }
            Some(status)
        }
        Err(e) => {
            log::warn!("Status files disabled: {e:#}");
            None
        }
    };

    let session = SessionConfig {
        initial_emotion: config.initial_mood.map(|m| m.emotion()),
        crisis_mode: config.crisis_mode,
        include_faith_affirmations: config.include_faith_affirmations,
        user_name: config.user_name.clone(),
        auto_speak: true,
    };
    let mut conversation = Conversation::start(session, reply_source, voice);
    log::info!("KIIA initialised.");
    println!("{HELP}");

    let mut shown = show_new_messages(&conversation, 0, status.as_ref());
    publish_state(&conversation, status.as_ref());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                if let Flow::Quit =
                    handle_line(&mut conversation, service.as_deref(), &config, line.trim()).await
                {
                    break;
                }
            }
            Some(event) = event_rx.recv() => {
                if let Err(e) = conversation.handle_voice_event(event).await {
                    println!("{e}");
                }
            }
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    log::error!("Failed to listen for Ctrl-C: {e}");
                }
                log::info!("Received Ctrl-C, shutting down");
                break;
            }
        }

        shown = show_new_messages(&conversation, shown, status.as_ref());
        if let Some(err) = conversation.voice_error() {
            println!("⚠ {}", err.user_message());
            conversation.dismiss_voice_error();
        }
        publish_state(&conversation, status.as_ref());
    }

    conversation.stop_speaking();
    publish_state(&conversation, status.as_ref());
    Ok(())
}

async fn handle_line(
    conversation: &mut Conversation,
    service: Option<&dyn PromptService>,
    config: &Config,
    line: &str,
) -> Flow {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };
    match command {
        "" => {}
        "/quit" | "/salir" => return Flow::Quit,
        "/help" | "/ayuda" => println!("{HELP}"),
        "/mic" => {
            if conversation.voice_state().is_listening {
                conversation.stop_recording();
            } else if conversation.start_recording().is_ok() {
                println!("🎙 Escuchando... escribe /mic para enviar.");
            }
        }
        "/stop" => conversation.stop_speaking(),
        "/repeat" => {
            if conversation.replay_last_reply().is_none() && conversation.voice_error().is_none() {
                println!("Aún no hay respuestas para repetir.");
            }
        }
        "/plan" => {
            let Some(service) = service else {
                println!("Los planes de acción necesitan KIIA_REPLY_MODE=ollama.");
                return Flow::Continue;
            };
            let mood = if arg.is_empty() {
                config.initial_mood
            } else {
                match Mood::parse(arg) {
                    Ok(mood) => Some(mood),
                    Err(e) => {
                        println!("{e}");
                        return Flow::Continue;
                    }
                }
            };
            let Some(mood) = mood else {
                let moods: Vec<&str> = Mood::ALL.iter().map(|m| m.key()).collect();
                println!("¿Cómo te sientes hoy? /plan <{}>", moods.join("|"));
                return Flow::Continue;
            };
            println!("{}", mood.check_in_text());
            let plan =
                action_plan::personalized_plan(service, mood, config.include_faith_affirmations)
                    .await;
            show_plan(plan);
        }
        "/project" => {
            let Some(service) = service else {
                println!("Los planes de proyecto necesitan KIIA_REPLY_MODE=ollama.");
                return Flow::Continue;
            };
            if arg.is_empty() {
                println!("Describe tu proyecto: /project <descripción>");
                return Flow::Continue;
            }
            show_plan(action_plan::project_plan(service, arg).await);
        }
        _ => {
            if let Err(e) = conversation.submit_user_turn(line).await {
                println!("{e}");
            }
        }
    }
    Flow::Continue
}

fn show_plan(plan: Result<ActionPlan, kiia::error::PromptError>) {
    match plan {
        Ok(plan) => {
            for element in plan.elements() {
                match element.kind {
                    PlanElementKind::Action => println!("  [ ] {}", element.text),
                    PlanElementKind::Text => println!("  {}", element.text),
                }
            }
            println!("  ({} acciones)", plan.action_count());
        }
        Err(e) => {
            log::error!("Action plan failed: {e}");
            println!("{PLAN_ERROR_MESSAGE}");
        }
    }
}

/// Print messages appended since `shown` and mirror them to the status files.
fn show_new_messages(conversation: &Conversation, shown: usize, status: Option<&StatusFiles>) -> usize {
    let messages = conversation.messages();
    for message in &messages[shown.min(messages.len())..] {
        let written = match message.sender {
            Sender::User => {
                println!("Tú › {}", message.text);
                status.map(|s| s.write_heard(&message.text))
            }
            Sender::Assistant => {
                println!("KIIA › {}", message.text);
                status.map(|s| s.write_spoken(&message.text))
            }
        };
        if let Some(Err(e)) = written {
            log::warn!("{e:#}");
        }
    }
    messages.len()
}

fn publish_state(conversation: &Conversation, status: Option<&StatusFiles>) {
    if let Some(status) = status {
        if let Err(e) = status.write_state(conversation.voice_mode()) {
            log::warn!("{e:#}");
        }
    }
}
