use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use agentdbg_core::guidelines::{self, CATEGORY_RULES};
use agentdbg_core::report::{render_report, status_counts, HealthBand};
use agentdbg_core::request::handle_prompt_fix_request;
use agentdbg_core::session::{AnalysisSession, BehaviorInput};
use agentdbg_core::{AgentKind, AgentPatch, ParentLink};
use agentdbg_diagnose::{collaborator_from_settings, prepare_analysis, SessionMetadata};

fn parse_kind(s: &str) -> Option<AgentKind> {
    match s.trim().to_ascii_lowercase().as_str() {
        "major" => Some(AgentKind::Major),
        "sub" => Some(AgentKind::Sub),
        _ => None,
    }
}

/// An empty string means "clear" for optional agent fields.
fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| if v.is_empty() { None } else { Some(v) })
}

fn text(t: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(t.into())]))
}

fn fail(t: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(t.into())]))
}

fn pretty(val: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(val).unwrap_or_else(|e| format!("Serialization error: {}", e))
}

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddAgentRequest {
    /// Display name (1-50 characters)
    name: String,
    /// "major" for an orchestrator, "sub" for an agent it delegates to
    kind: String,
    /// ID of the major agent this sub-agent reports to (e.g. "agent-1718000000000"). Required for sub-agents.
    parent_id: Option<String>,
    /// The agent's current system prompt, if known
    system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct UpdateAgentRequest {
    /// ID of the agent to update
    agent_id: String,
    /// New display name
    name: Option<String>,
    /// New kind: "major" or "sub"
    kind: Option<String>,
    /// New parent ID. Empty string clears it.
    parent_id: Option<String>,
    /// New system prompt. Empty string clears it.
    system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RemoveAgentRequest {
    /// ID of the agent to remove
    agent_id: String,
    /// Also remove the sub-agents of a major agent. Default: true.
    cascade: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetBehaviorRequest {
    /// How the agents are meant to work together. Optional; inferred from the hierarchy when empty.
    flow_description: Option<String>,
    /// What the system should have done
    expected_behavior: String,
    /// What the system actually did
    actual_behavior: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SynthesizeRequest {
    /// JSON body: {"agents": [{id, name, type, parentId?, systemPrompt?}], "diagnosticResults": {overall_health_score, diagnostics, priority_actions}}
    body: String,
}

// --- Server ---

#[derive(Clone)]
pub struct DebuggerServer {
    session: Arc<Mutex<AnalysisSession>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DebuggerServer {
    pub fn new(session: AnalysisSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Show the agent hierarchy: each major agent with its sub-agents, then orphan sub-agents. Orphans are flagged \"unparented\" (no parent set) or \"dangling\" (parent no longer exists)."
    )]
    async fn list_agents(&self) -> Result<CallToolResult, McpError> {
        let session = self.session.lock().await;
        let store = session.store();
        if store.is_empty() {
            return text("No agents yet. Use add_agent to describe your system.");
        }
        let tree = store.list_hierarchy();
        let orphans: Vec<serde_json::Value> = tree
            .orphans
            .iter()
            .map(|agent| {
                let reason = match store.parent_link(agent) {
                    ParentLink::Unparented => "unparented",
                    ParentLink::Dangling(_) => "dangling",
                    ParentLink::Resolved(_) => "parent is not a major agent",
                };
                serde_json::json!({ "agent": agent, "reason": reason })
            })
            .collect();
        text(pretty(&serde_json::json!({
            "groups": tree.groups,
            "orphans": orphans,
        })))
    }

    #[tool(description = "Add an agent to the system. Returns the created agent with its generated ID.")]
    async fn add_agent(
        &self,
        Parameters(req): Parameters<AddAgentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let Some(kind) = parse_kind(&req.kind) else {
            return fail(format!("Unknown kind '{}'. Use \"major\" or \"sub\".", req.kind));
        };
        let mut session = self.session.lock().await;
        match session.add_agent(
            &req.name,
            kind,
            req.parent_id.as_deref(),
            req.system_prompt.as_deref(),
        ) {
            Ok(agent) => text(pretty(&agent)),
            Err(e) => fail(e.to_string()),
        }
    }

    #[tool(description = "Update the name, kind, parent or system prompt of an existing agent")]
    async fn update_agent(
        &self,
        Parameters(req): Parameters<UpdateAgentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let kind = match req.kind.as_deref().map(parse_kind) {
            Some(None) => {
                return fail(format!(
                    "Unknown kind '{}'. Use \"major\" or \"sub\".",
                    req.kind.unwrap_or_default()
                ))
            }
            Some(k) => k,
            None => None,
        };
        let patch = AgentPatch {
            name: req.name,
            kind,
            parent_id: clearable(req.parent_id),
            system_prompt: clearable(req.system_prompt),
        };
        let mut session = self.session.lock().await;
        match session.update_agent(&req.agent_id, patch) {
            Ok(agent) => text(pretty(&agent)),
            Err(e) => fail(e.to_string()),
        }
    }

    #[tool(
        description = "Remove an agent. Removing a major agent also removes its sub-agents unless cascade is false, in which case they are left as orphans. Prompt fixes for removed agents are discarded."
    )]
    async fn remove_agent(
        &self,
        Parameters(req): Parameters<RemoveAgentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session.lock().await;
        match session.remove_agent(&req.agent_id, req.cascade.unwrap_or(true)) {
            Ok(removed) => text(format!(
                "Removed {} agent(s): {}",
                removed.len(),
                removed.join(", ")
            )),
            Err(e) => fail(e.to_string()),
        }
    }

    #[tool(description = "Describe the expected and actual behavior of the system, and optionally its intended flow")]
    async fn set_behavior(
        &self,
        Parameters(req): Parameters<SetBehaviorRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut session = self.session.lock().await;
        session.set_behavior(BehaviorInput {
            flow_description: req.flow_description.unwrap_or_default(),
            expected_behavior: req.expected_behavior,
            actual_behavior: req.actual_behavior,
        });
        text("Behavior description saved.")
    }

    #[tool(
        description = "Run the diagnostic agent over the current hierarchy and behavior description. Replaces any previous diagnostics and prompt fixes. Returns the plain-text report."
    )]
    async fn analyze(&self) -> Result<CallToolResult, McpError> {
        let settings = agentdbg_core::read_settings();
        let collaborator = match collaborator_from_settings(&settings) {
            Ok(c) => c,
            Err(e) => return fail(e.to_string()),
        };

        let (ticket, request) = {
            let mut session = self.session.lock().await;
            match prepare_analysis(&mut session, SessionMetadata::new("diagnostic-user")) {
                Ok(prepared) => prepared,
                Err(e) => return fail(e.to_string()),
            }
        };

        let outcome = collaborator.diagnose(&request).await;

        let mut session = self.session.lock().await;
        match session.complete_analysis(ticket, outcome) {
            Ok(results) => text(render_report(results)),
            Err(e) => {
                error!(error = %e, "analysis failed");
                fail(e.to_string())
            }
        }
    }

    #[tool(description = "Get the plain-text report of the latest analysis, with health band and status counts")]
    async fn get_report(&self) -> Result<CallToolResult, McpError> {
        let session = self.session.lock().await;
        let Some(results) = session.results() else {
            return fail("No diagnostic results yet. Run analyze first.");
        };
        let counts = status_counts(results);
        let band = HealthBand::from_score(results.overall_health_score);
        text(format!(
            "{}\nHealth band: {:?}\nPass: {}  Warning: {}  Issue: {}",
            render_report(results),
            band,
            counts.pass,
            counts.warning,
            counts.issue
        ))
    }

    #[tool(description = "Get the latest diagnostics as JSON: {overall_health_score, diagnostics, priority_actions}")]
    async fn get_diagnostics(&self) -> Result<CallToolResult, McpError> {
        let session = self.session.lock().await;
        match session.results() {
            Some(results) => text(pretty(&serde_json::json!({
                "overall_health_score": results.overall_health_score,
                "diagnostics": results.diagnostics,
                "priority_actions": results.priority_actions(),
            }))),
            None => fail("No diagnostic results yet. Run analyze first."),
        }
    }

    #[tool(
        description = "Synthesize a rewritten system prompt for each agent from the latest diagnostics. Agents with no applicable findings are omitted. Returns {agentId: prompt}."
    )]
    async fn generate_prompt_fixes(&self) -> Result<CallToolResult, McpError> {
        let mut session = self.session.lock().await;
        match session.generate_prompt_fixes() {
            Ok(fixes) if fixes.is_empty() => {
                text("No prompt fixes: no Warning or Issue finding maps to a guideline category.")
            }
            Ok(fixes) => text(pretty(fixes)),
            Err(e) => fail(e.to_string()),
        }
    }

    #[tool(
        description = "Stateless prompt-fix synthesis. Takes a request body with agents and diagnosticResults and returns {promptFixes} or {error, status}."
    )]
    async fn synthesize_prompt_fixes(
        &self,
        Parameters(req): Parameters<SynthesizeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let body: serde_json::Value = match serde_json::from_str(&req.body) {
            Ok(v) => v,
            Err(e) => return fail(format!("Invalid JSON body: {}", e)),
        };
        match handle_prompt_fix_request(&body) {
            Ok(resp) => text(pretty(&resp)),
            Err(e) => fail(pretty(&serde_json::json!({
                "status": e.status(),
                "error": e.body().error,
            }))),
        }
    }

    #[tool(description = "List the diagnostic categories and the keyword rules that map findings to prompt guidelines")]
    fn get_guidelines(&self) -> Result<CallToolResult, McpError> {
        let mut out = String::from("Reported categories:\n");
        for c in guidelines::diagnostic_categories() {
            out.push_str("- ");
            out.push_str(c);
            out.push('\n');
        }
        out.push_str("\nKeyword rules (first match wins):\n");
        for (i, (keywords, category)) in CATEGORY_RULES.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} -> {}\n{}\n",
                i + 1,
                keywords.join(" / "),
                category.label(),
                category.snippet()
            ));
        }
        text(out)
    }
}

#[tool_handler]
impl ServerHandler for DebuggerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"Agent system debugger. Describe a multi-agent system, say what it should do and what it did, and get a diagnostic report plus rewritten prompts.

## Workflow
1. `add_agent` for each major (orchestrator) agent, then each sub-agent with `parent_id` set to its major agent.
2. `set_behavior` with the expected and actual behavior.
3. `analyze` to run the diagnostic agent. Each run replaces the previous results.
4. `generate_prompt_fixes` for per-agent prompt rewrites based on Warning and Issue findings.

Use `list_agents` to check the hierarchy; orphan sub-agents are listed separately."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("AGENTDBG_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let settings = agentdbg_core::read_settings();
    let session = AnalysisSession::new(settings.store_policy());
    info!(provider = %settings.provider, "starting agentdbg MCP server");

    let service = DebuggerServer::new(session)
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| error!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}
