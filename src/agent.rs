//! Prompt service backed by a local LLM via Ollama.
//!
//! This module wraps the [`ollama-rs`](https://crates.io/crates/ollama-rs)
//! client. Every flow renders a prompt that asks the model for a single JSON
//! object; the answer is cleaned of `<think>` blocks and Markdown fences, the
//! object is located by brace balancing and then deserialized into the
//! flow's reply type. Anything that does not survive that pipeline is a
//! [`PromptError::MalformedOutput`].

use std::time::Duration;

use async_trait::async_trait;
use ollama_rs::{generation::completion::request::GenerationRequest, Ollama};
use serde::de::DeserializeOwned;
use tokio::time::timeout;

use crate::error::PromptError;
use crate::prompt::{
    ActionPlanReply, ActionPlanRequest, ProjectPlanRequest, PromptService, SupportReply,
    SupportRequest,
};

const SUPPORT_PROMPT: &str = "You are KIIA, a friendly, supportive, and highly skilled AI companion providing emotional support and practical guidance. Your primary task is to detect the language of the user's input and respond in that same language.\n\
Your goal is to help the user feel understood, supported, and empowered.\n\
1. Empathy first: always begin by acknowledging the user's feelings with genuine empathy and validation.\n\
2. Problem assessment: understand whether the user is expressing emotional distress, a practical problem, or both.\n\
3. Guidance: when the user presents a practical problem (money, unemployment, lack of motivation, feeling stuck, relationships), offer a clear, step-by-step action plan with concrete, manageable steps, framed positively. Label the plan (e.g. \"Plan de Acción Sugerido:\") and use a numbered or bulleted list.";

const JSON_INSTRUCTION: &str = "Respond with **only** a JSON object of the form {\"%KEY%\": \"...\"}.\n\
Do not include any other text, tags or explanations around the JSON (no `<think>` tags).";

/// Prompt service talking to an Ollama server.
pub struct Agent {
    client: Ollama,
    model: String,
    timeout: Duration,
}

impl Agent {
    /// Construct an agent for `model` served at `host:port`. Requests
    /// taking longer than `request_timeout` fail with
    /// [`PromptError::Timeout`].
    pub fn new(host: &str, port: u16, model: &str, request_timeout: Duration) -> Self {
        Self {
            client: Ollama::new(host.to_string(), port),
            model: model.to_string(),
            timeout: request_timeout,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String, PromptError> {
        log::debug!("LLM prompt: {}", prompt);
        let request = GenerationRequest::new(self.model.clone(), prompt);
        let response = match timeout(self.timeout, self.client.generate(request)).await {
            Ok(res) => res.map_err(|e| PromptError::Unreachable(e.to_string()))?,
            Err(_) => return Err(PromptError::Timeout(self.timeout)),
        };
        log::debug!("Raw LLM response: {}", response.response);
        Ok(response.response)
    }
}

fn json_instruction(key: &str) -> String {
    JSON_INSTRUCTION.replace("%KEY%", key)
}

fn support_prompt(request: &SupportRequest) -> String {
    let mut prompt = String::from(SUPPORT_PROMPT);
    prompt.push('\n');
    if request.flags.crisis_mode {
        prompt.push_str("The user is in crisis mode: focus on immediate safety, de-escalation, and directing them to crisis resources before suggesting long-term plans.\n");
    }
    if request.flags.include_faith_affirmations {
        prompt.push_str("Incorporate spiritual or faith-based affirmations where they are helpful.\n");
    }
    let name = request.flags.user_name.as_deref().unwrap_or("User");
    prompt.push_str(&format!("User's name: {name}.\n"));
    prompt.push_str(&json_instruction("replyText"));
    format!("{}\n\nUser: {}\nAssistant:", prompt, request.user_text)
}

fn personalized_plan_prompt(request: &ActionPlanRequest) -> String {
    let mut prompt = format!(
        "Your primary task is to detect the language of the user's daily check-in and respond in that same language.\n\
Based on my daily check-in: {}, please provide a personalized action plan in the detected language.\n\
The plan should consist of micro-actions, messages, or exercises (1-3 minutes each).\n\
Format any actionable items as a list using markdown syntax (e.g., using '-', '*', or numbered lists like '1.').\n",
        request.daily_check_in
    );
    if request.include_faith_affirmations {
        prompt.push_str("Incorporate spiritual or faith-based affirmations into the action plan, also in the detected language.\n");
    }
    prompt.push_str(&json_instruction("actionPlan"));
    prompt
}

fn project_plan_prompt(request: &ProjectPlanRequest) -> String {
    format!(
        "You are KIIA, an expert project planning assistant. Your primary task is to detect the language of the user's project description and respond in that same language.\n\
Based on the user's project description:\n\"{}\"\n\
Generate a clear, motivating, and actionable step-by-step plan to help the user achieve their goal. Break down larger goals into smaller, manageable tasks. Encourage the user and emphasize that taking action is key to progress.\n{}",
        request.project_description,
        json_instruction("actionPlan")
    )
}

/// Remove a `<think>...</think>` block and Markdown code fences/backticks.
fn clean_answer(raw: &str) -> String {
    let mut answer = raw.trim().to_string();

    if let (Some(start), Some(end)) = (answer.find("<think>"), answer.find("</think>")) {
        if start < end {
            let think_text = answer[start + "<think>".len()..end].trim();
            log::debug!("Captured think block: {}", think_text);
            answer = answer[end + "</think>".len()..].trim_start().to_string();
        }
    }

    // Unlike plain spoken answers, the JSON usually sits *inside* the fence,
    // so only the fence lines are dropped.
    if answer.contains("```") {
        answer = answer
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n");
    }
    answer.trim().to_string()
}

/// Locate the JSON object containing `"key"` by walking back to the opening
/// brace and forward until braces balance. Braces inside string literals
/// are skipped.
fn extract_json_object<'a>(answer: &'a str, key: &str) -> Option<&'a str> {
    let key_pos = answer.find(&format!("\"{key}\""))?;
    let start_idx = answer[..key_pos].rfind('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in answer[start_idx..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&answer[start_idx..=start_idx + i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_output<T: DeserializeOwned>(raw: &str, key: &str) -> Result<T, PromptError> {
    let answer = clean_answer(raw);
    let json = extract_json_object(&answer, key)
        .ok_or_else(|| PromptError::MalformedOutput(format!("no JSON object with \"{key}\"")))?;
    log::debug!("Found JSON slice: {}", json);
    serde_json::from_str(json).map_err(|e| PromptError::MalformedOutput(e.to_string()))
}

fn require_text(text: &str, field: &str) -> Result<(), PromptError> {
    if text.trim().is_empty() {
        return Err(PromptError::MalformedOutput(format!("empty {field}")));
    }
    Ok(())
}

#[async_trait]
impl PromptService for Agent {
    async fn provide_support(&self, request: SupportRequest) -> Result<SupportReply, PromptError> {
        let raw = self.complete(support_prompt(&request)).await?;
        let reply: SupportReply = parse_output(&raw, "replyText")?;
        require_text(&reply.reply_text, "replyText")?;
        Ok(reply)
    }

    async fn personalized_action_plan(
        &self,
        request: ActionPlanRequest,
    ) -> Result<ActionPlanReply, PromptError> {
        let raw = self.complete(personalized_plan_prompt(&request)).await?;
        let reply: ActionPlanReply = parse_output(&raw, "actionPlan")?;
        require_text(&reply.action_plan, "actionPlan")?;
        Ok(reply)
    }

    async fn project_action_plan(
        &self,
        request: ProjectPlanRequest,
    ) -> Result<ActionPlanReply, PromptError> {
        let raw = self.complete(project_plan_prompt(&request)).await?;
        let reply: ActionPlanReply = parse_output(&raw, "actionPlan")?;
        require_text(&reply.action_plan, "actionPlan")?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::SupportFlags;

    #[test]
    fn parses_plain_json() {
        let reply: SupportReply = parse_output(r#"{"replyText": "Te escucho."}"#, "replyText")
            .expect("valid output");
        assert_eq!(reply.reply_text, "Te escucho.");
    }

    #[test]
    fn strips_think_block_and_fences() {
        let raw = "<think>the user is sad {maybe}</think>\n```json\n{\"replyText\": \"Estoy aquí.\"}\n```";
        let reply: SupportReply = parse_output(raw, "replyText").expect("valid output");
        assert_eq!(reply.reply_text, "Estoy aquí.");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_extraction() {
        let raw = r#"Sure! {"actionPlan": "1. Escribe {tres} cosas\n2. Respira"} done"#;
        let reply: ActionPlanReply = parse_output(raw, "actionPlan").expect("valid output");
        assert_eq!(reply.action_plan, "1. Escribe {tres} cosas\n2. Respira");
    }

    #[test]
    fn missing_object_is_malformed() {
        let err = parse_output::<SupportReply>("Hola, ¿cómo estás?", "replyText").unwrap_err();
        assert!(matches!(err, PromptError::MalformedOutput(_)));

        let err = parse_output::<SupportReply>(r#"{"replyText": "sin cerrar""#, "replyText")
            .unwrap_err();
        assert!(matches!(err, PromptError::MalformedOutput(_)));
    }

    #[test]
    fn empty_field_is_rejected() {
        assert!(require_text("  ", "replyText").is_err());
        assert!(require_text("hola", "replyText").is_ok());
    }

    #[test]
    fn support_prompt_reflects_flags() {
        let request = SupportRequest {
            user_text: "necesito ayuda".into(),
            flags: SupportFlags {
                crisis_mode: true,
                include_faith_affirmations: false,
                user_name: Some("Ana".into()),
            },
        };
        let prompt = support_prompt(&request);
        assert!(prompt.contains("crisis mode"));
        assert!(!prompt.contains("faith-based"));
        assert!(prompt.contains("User's name: Ana."));
        assert!(prompt.ends_with("User: necesito ayuda\nAssistant:"));
    }

    #[test]
    fn plan_prompts_embed_input() {
        let prompt = personalized_plan_prompt(&ActionPlanRequest {
            daily_check_in: "Hoy me siento: Triste.".into(),
            include_faith_affirmations: true,
        });
        assert!(prompt.contains("Hoy me siento: Triste."));
        assert!(prompt.contains("faith-based"));

        let prompt = project_plan_prompt(&ProjectPlanRequest {
            project_description: "abrir una panadería".into(),
        });
        assert!(prompt.contains("\"abrir una panadería\""));
        assert!(prompt.contains("\"actionPlan\""));
    }
}
