//! Seam to the hosted prompt service.
//!
//! Each flow takes a structured request and returns a structured reply or a
//! [`PromptError`]. The conversation never sees a raw model string: output
//! is validated into these types by the service implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PromptError;

/// Flags that shape a support reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportFlags {
    pub crisis_mode: bool,
    pub include_faith_affirmations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportRequest {
    pub user_text: String,
    pub flags: SupportFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportReply {
    pub reply_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlanRequest {
    /// e.g. "Hoy me siento: Triste."
    pub daily_check_in: String,
    pub include_faith_affirmations: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPlanRequest {
    pub project_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlanReply {
    pub action_plan: String,
}

/// The hosted prompt-execution service. Calls are fire-once: callers do not
/// retry, they substitute a fallback on error.
#[async_trait]
pub trait PromptService: Send + Sync {
    async fn provide_support(&self, request: SupportRequest) -> Result<SupportReply, PromptError>;

    async fn personalized_action_plan(
        &self,
        request: ActionPlanRequest,
    ) -> Result<ActionPlanReply, PromptError>;

    async fn project_action_plan(
        &self,
        request: ProjectPlanRequest,
    ) -> Result<ActionPlanReply, PromptError>;
}
