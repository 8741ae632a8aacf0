use agentdbg_core::guidelines::diagnostic_categories;
use agentdbg_core::session::BehaviorInput;
use agentdbg_core::{AgentKind, AgentStore};
use serde::Serialize;

/// Flattened view of one agent as the diagnostic agent sees it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    /// Parent's display name; null when unparented or dangling.
    pub parent: Option<String>,
    pub system_prompt: String,
}

pub fn describe_hierarchy(store: &AgentStore) -> Vec<AgentDescription> {
    store
        .agents()
        .iter()
        .map(|agent| AgentDescription {
            name: agent.name.clone(),
            kind: agent.kind,
            parent: store.parent_of(agent).map(|p| p.name.clone()),
            system_prompt: agent
                .current_prompt()
                .unwrap_or("Not provided")
                .to_string(),
        })
        .collect()
}

pub fn user_message(hierarchy: &[AgentDescription], behavior: &BehaviorInput) -> String {
    let config = serde_json::to_string_pretty(hierarchy).unwrap_or_else(|_| "[]".to_string());
    let flow = if behavior.flow_description.trim().is_empty() {
        "Not provided - please infer from agent structure"
    } else {
        behavior.flow_description.as_str()
    };

    format!(
        "\nAGENT SYSTEM CONFIGURATION:\n{config}\n\n\
FLOW DESCRIPTION:\n{flow}\n\n\
EXPECTED BEHAVIOR:\n{}\n\n\
ACTUAL BEHAVIOR:\n{}\n\n\
Please analyze this multi-agent system and provide comprehensive diagnostics across all {} categories.\n",
        behavior.expected_behavior,
        behavior.actual_behavior,
        diagnostic_categories().len()
    )
}

pub fn system_prompt() -> String {
    let categories = diagnostic_categories()
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a multi-agent system diagnostician. You are given the agents of a system \
(major orchestrators and their sub-agents, with their system prompts), a description of how \
they are meant to work together, the behavior the user expected and the behavior they observed. \
Explain the gap.\n\n\
Evaluate the system in each of these categories, one finding per category:\n{categories}\n\n\
For every finding give a status of \"Pass\", \"Warning\" or \"Issue\" and a severity of \
\"Low\", \"Medium\" or \"High\". Ground findings in the agents' actual prompts and in the \
difference between expected and actual behavior. Recommended fixes must be concrete changes \
to a named agent's prompt or to the hierarchy, not general advice.\n\n\
Output ONLY a JSON object of this shape:\n\
{{\"overall_health_score\": <integer 0-100>, \
\"diagnostics\": [{{\"category\": \"...\", \"status\": \"Pass\"|\"Warning\"|\"Issue\", \
\"summary\": \"...\", \"detailed_explanation\": \"...\", \"recommended_fix\": \"...\", \
\"severity\": \"Low\"|\"Medium\"|\"High\"}}], \
\"priority_actions\": [\"...\"]}}\n\n\
Output ONLY the JSON object, nothing else."
    )
}
