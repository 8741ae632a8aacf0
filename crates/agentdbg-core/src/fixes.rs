use tracing::debug;

use crate::guidelines::{
    self, CLOSING_REMINDER, MAJOR_RESPONSIBILITIES, QUALITY_STANDARDS, SUB_RESPONSIBILITIES,
};
use crate::{Agent, AgentKind, DiagnosticResponse, PromptFixMap};

/// Build a prompt rewrite for every agent that has at least one actionable,
/// categorized finding. Agents without one are left out of the map.
pub fn synthesize(agents: &[Agent], results: &DiagnosticResponse) -> PromptFixMap {
    let snippets = guideline_snippets(results);
    let mut fixes = PromptFixMap::new();
    if snippets.is_empty() {
        return fixes;
    }
    for agent in agents {
        fixes.insert(agent.id.clone(), compose_prompt(agent, &snippets));
    }
    debug!(agents = fixes.len(), snippets = snippets.len(), "prompt fixes synthesized");
    fixes
}

/// Distinct snippets contributed by Warning/Issue findings, first-seen order.
pub fn guideline_snippets(results: &DiagnosticResponse) -> Vec<&'static str> {
    let mut snippets: Vec<&'static str> = Vec::new();
    for diagnostic in results.actionable() {
        let Some(category) = guidelines::match_category(&diagnostic.category) else {
            continue;
        };
        let snippet = category.snippet();
        if !snippets.contains(&snippet) {
            snippets.push(snippet);
        }
    }
    snippets
}

pub fn compose_prompt(agent: &Agent, snippets: &[&str]) -> String {
    let responsibilities = match agent.kind {
        AgentKind::Major => MAJOR_RESPONSIBILITIES,
        AgentKind::Sub => SUB_RESPONSIBILITIES,
    };

    let mut sections = vec![
        format!(
            "You are {}, a {} in a multi-agent system.",
            agent.name,
            agent.kind.role()
        ),
        format!("ROLE & RESPONSIBILITIES:\n{responsibilities}"),
        format!("OPERATIONAL GUIDELINES:\n{}", snippets.join("\n")),
        format!("QUALITY STANDARDS:\n{QUALITY_STANDARDS}"),
    ];
    if let Some(current) = agent.current_prompt() {
        sections.push(format!("CURRENT CONTEXT:\n{current}"));
    }
    sections.push(CLOSING_REMINDER.to_string());
    sections.join("\n\n")
}
