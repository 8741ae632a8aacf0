pub mod error;
pub mod fixes;
pub mod guidelines;
pub mod hierarchy;
pub mod normalize;
pub mod report;
pub mod request;
pub mod session;

use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub use error::{AgentError, AnalysisError, CollaboratorError, FormatError, RequestError};
pub use hierarchy::{AgentPatch, AgentStore, Hierarchy, HierarchyGroup, ParentLink, StorePolicy};

// --- Types ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Major,
    Sub,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Major => "major",
            AgentKind::Sub => "sub",
        }
    }

    /// How the role is described to the agent in a synthesized prompt.
    pub fn role(&self) -> &'static str {
        match self {
            AgentKind::Major => "primary orchestrator",
            AgentKind::Sub => "specialized sub-agent",
        }
    }
}

/// One agent in the described system. `parent_id` is a weak reference by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Agent {
    /// The existing system prompt, passed on verbatim unless it is empty.
    pub fn current_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, schemars::JsonSchema)]
pub enum DiagnosticStatus {
    Pass,
    Warning,
    Issue,
}

impl DiagnosticStatus {
    /// Whether a finding with this status should feed prompt fixes.
    pub fn is_actionable(&self) -> bool {
        matches!(self, DiagnosticStatus::Warning | DiagnosticStatus::Issue)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Collaborators are loose about case ("warning", "HIGH"); read the label
/// case-insensitively and write it back in canonical form.
fn read_label<'de, D, T>(
    deserializer: D,
    variants: &'static [&'static str],
    pick: fn(usize) -> T,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    variants
        .iter()
        .position(|v| v.eq_ignore_ascii_case(raw.trim()))
        .map(pick)
        .ok_or_else(|| de::Error::unknown_variant(&raw, variants))
}

impl<'de> Deserialize<'de> for DiagnosticStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        read_label(deserializer, &["Pass", "Warning", "Issue"], |i| match i {
            0 => DiagnosticStatus::Pass,
            1 => DiagnosticStatus::Warning,
            _ => DiagnosticStatus::Issue,
        })
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        read_label(deserializer, &["Low", "Medium", "High"], |i| match i {
            0 => Severity::Low,
            1 => Severity::Medium,
            _ => Severity::High,
        })
    }
}

/// Scores arrive as any JSON number; fractional ones are rounded.
fn read_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() || raw < 0.0 || raw > f64::from(u32::MAX) {
        return Err(de::Error::custom(format!(
            "overall_health_score out of range: {raw}"
        )));
    }
    Ok(raw.round() as u32)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct DiagnosticResult {
    pub category: String,
    pub status: DiagnosticStatus,
    pub summary: String,
    pub detailed_explanation: String,
    pub recommended_fix: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct DiagnosticResponse {
    #[serde(deserialize_with = "read_score")]
    #[schemars(with = "u32")]
    pub overall_health_score: u32,
    pub diagnostics: Vec<DiagnosticResult>,
    /// Left as the collaborator sent it. Read through [`DiagnosticResponse::priority_actions`].
    #[serde(rename = "priority_actions", default, skip_serializing_if = "Option::is_none")]
    pub raw_priority_actions: Option<Vec<String>>,
}

impl DiagnosticResponse {
    /// Priority actions, empty when the collaborator omitted them.
    pub fn priority_actions(&self) -> &[String] {
        self.raw_priority_actions.as_deref().unwrap_or(&[])
    }

    /// Findings with status Warning or Issue, in report order.
    pub fn actionable(&self) -> impl Iterator<Item = &DiagnosticResult> {
        self.diagnostics.iter().filter(|d| d.status.is_actionable())
    }
}

/// Synthesized prompt text keyed by agent id.
pub type PromptFixMap = BTreeMap<String, String>;

// --- Settings ---

/// Resolve the settings directory (~/.agentdbg/).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentdbg")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    /// Base URL of the hosted diagnostic agent (provider "agent-api").
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default = "default_require_sub_parent")]
    pub require_sub_parent: bool,
}

fn default_require_sub_parent() -> bool {
    true
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            model: String::new(),
            endpoint: String::new(),
            agent_id: String::new(),
            require_sub_parent: default_require_sub_parent(),
        }
    }
}

impl AiSettings {
    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            require_sub_parent: self.require_sub_parent,
        }
    }
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn read_settings() -> AiSettings {
    let path = settings_path();
    if !path.exists() {
        return AiSettings::default();
    }
    fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    if settings.provider == "agent-api" {
        return !settings.endpoint.is_empty() && !settings.agent_id.is_empty();
    }
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}
