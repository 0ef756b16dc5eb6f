//! Action plans returned by the prompt service, split into checkable items.

use serde::{Deserialize, Serialize};

use crate::emotion::Mood;
use crate::error::PromptError;
use crate::prompt::{ActionPlanRequest, ProjectPlanRequest, PromptService};

/// Shown instead of a plan when the prompt service fails.
pub const PLAN_ERROR_MESSAGE: &str =
    "Hubo un problema al generar tu plan de acción. Por favor, inténtalo de nuevo.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanElementKind {
    Action,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanElement {
    pub id: String,
    pub kind: PlanElementKind,
    pub text: String,
    /// Always false for text elements.
    pub completed: bool,
}

/// An action plan as an ordered list of actionable items and plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    elements: Vec<PlanElement>,
}

impl ActionPlan {
    /// Lines starting with `-`, `*` or `N.` become action items with the
    /// list marker removed; every other line is kept verbatim as text.
    pub fn parse(plan_text: &str) -> Self {
        let elements = plan_text
            .lines()
            .enumerate()
            .map(|(index, line)| {
                let trimmed = line.trim();
                match strip_list_marker(trimmed) {
                    Some(rest) => PlanElement {
                        id: format!("action-{index}"),
                        kind: PlanElementKind::Action,
                        text: rest.to_string(),
                        completed: false,
                    },
                    None => PlanElement {
                        id: format!("text-{index}"),
                        kind: PlanElementKind::Text,
                        text: line.to_string(),
                        completed: false,
                    },
                }
            })
            .collect();
        Self { elements }
    }

    pub fn elements(&self) -> &[PlanElement] {
        &self.elements
    }

    pub fn actions(&self) -> impl Iterator<Item = &PlanElement> {
        self.elements
            .iter()
            .filter(|e| e.kind == PlanElementKind::Action)
    }

    /// Flip completion of the action item `id`. Returns the new state, or
    /// `None` when `id` is unknown or names a text element.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let element = self
            .elements
            .iter_mut()
            .find(|e| e.id == id && e.kind == PlanElementKind::Action)?;
        element.completed = !element.completed;
        Some(element.completed)
    }

    pub fn action_count(&self) -> usize {
        self.actions().count()
    }

    pub fn completed_count(&self) -> usize {
        self.actions().filter(|e| e.completed).count()
    }
}

/// Ask the service for a plan built around today's check-in mood.
pub async fn personalized_plan(
    service: &dyn PromptService,
    mood: Mood,
    include_faith_affirmations: bool,
) -> Result<ActionPlan, PromptError> {
    let request = ActionPlanRequest {
        daily_check_in: mood.check_in_text(),
        include_faith_affirmations,
    };
    let reply = service.personalized_action_plan(request).await?;
    Ok(ActionPlan::parse(&reply.action_plan))
}

/// Ask the service for a step-by-step plan for a described project.
pub async fn project_plan(
    service: &dyn PromptService,
    project_description: &str,
) -> Result<ActionPlan, PromptError> {
    let request = ProjectPlanRequest {
        project_description: project_description.trim().to_string(),
    };
    let reply = service.project_action_plan(request).await?;
    Ok(ActionPlan::parse(&reply.action_plan))
}

fn strip_list_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('-').or_else(|| line.strip_prefix('*')) {
        return Some(trim_marker_tail(rest));
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix('.') {
            return Some(trim_marker_tail(rest));
        }
    }
    None
}

/// Drops repeated markers such as `**` or `1.-` and the following spaces.
fn trim_marker_tail(rest: &str) -> &str {
    rest.trim_start_matches(|c: char| c == '-' || c == '*' || c == '.' || c.is_ascii_digit())
        .trim_start()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedPrompt;

    const PLAN: &str = "Plan de Acción Sugerido:\n\
- Respira profundamente durante un minuto\n\
* Escribe tres cosas por las que estás agradecido\n\
\n\
1. Llama a un amigo\n\
2. Sal a caminar cinco minutos\n\
Recuerda: cada paso cuenta.";

    #[test]
    fn parses_actions_and_text() {
        let plan = ActionPlan::parse(PLAN);
        assert_eq!(plan.elements().len(), 7);
        assert_eq!(plan.action_count(), 4);

        let texts: Vec<&str> = plan.actions().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Respira profundamente durante un minuto",
                "Escribe tres cosas por las que estás agradecido",
                "Llama a un amigo",
                "Sal a caminar cinco minutos",
            ]
        );
        assert_eq!(plan.elements()[0].kind, PlanElementKind::Text);
        assert_eq!(plan.elements()[6].text, "Recuerda: cada paso cuenta.");
    }

    #[test]
    fn numbers_without_dot_are_text() {
        let plan = ActionPlan::parse("3 minutos de estiramiento");
        assert_eq!(plan.action_count(), 0);
    }

    #[test]
    fn toggle_only_affects_actions() {
        let mut plan = ActionPlan::parse(PLAN);
        assert_eq!(plan.toggle("action-1"), Some(true));
        assert_eq!(plan.completed_count(), 1);
        assert_eq!(plan.toggle("action-1"), Some(false));
        assert_eq!(plan.completed_count(), 0);

        assert_eq!(plan.toggle("text-0"), None);
        assert_eq!(plan.toggle("action-99"), None);
    }

    #[test]
    fn bold_markers_are_stripped() {
        let plan = ActionPlan::parse("**Respiración consciente**");
        let first = plan.actions().next().map(|e| e.text.clone());
        assert_eq!(first.as_deref(), Some("Respiración consciente**"));
    }

    #[tokio::test]
    async fn plan_flows_parse_service_output() {
        let service = ScriptedPrompt::replying(PLAN);
        let plan = personalized_plan(&service, Mood::Triste, false).await.unwrap();
        assert_eq!(plan.action_count(), 4);

        let plan = project_plan(&service, "  abrir una panadería ").await.unwrap();
        assert_eq!(plan.elements().len(), 7);
    }

    #[tokio::test]
    async fn plan_flow_failure_is_reported() {
        let service = ScriptedPrompt::failing();
        let err = personalized_plan(&service, Mood::Ansioso, true)
            .await
            .unwrap_err();
        assert!(matches!(err, PromptError::Unreachable(_)));
    }
}
