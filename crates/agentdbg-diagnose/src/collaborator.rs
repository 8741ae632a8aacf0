use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use agentdbg_core::{ai_configured, AiSettings, CollaboratorError};

use crate::prompt::AgentDescription;
use crate::{engine, parse};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionMetadata {
    pub user_id: String,
    pub session_id: String,
}

impl SessionMetadata {
    /// Metadata for a fresh session ("session-{unix millis}").
    pub fn new(user_id: impl Into<String>) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self {
            user_id: user_id.into(),
            session_id: format!("session-{millis}"),
        }
    }
}

/// Everything sent to the diagnostic collaborator for one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticRequest {
    pub message: String,
    pub hierarchy: Vec<AgentDescription>,
    pub metadata: SessionMetadata,
}

/// The external diagnostic service. Called once per analysis; no retries.
#[async_trait]
pub trait DiagnosticCollaborator: Send + Sync {
    async fn diagnose(&self, request: &DiagnosticRequest) -> Result<Value, CollaboratorError>;
}

/// Asks a chat model directly, with the diagnostic system prompt.
pub struct LlmCollaborator {
    settings: AiSettings,
}

impl LlmCollaborator {
    pub fn new(settings: AiSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl DiagnosticCollaborator for LlmCollaborator {
    async fn diagnose(&self, request: &DiagnosticRequest) -> Result<Value, CollaboratorError> {
        info!(
            provider = %self.settings.provider,
            model = %self.settings.model,
            session = %request.metadata.session_id,
            "sending diagnostic request"
        );
        engine::diagnose(&self.settings, request).await
    }
}

#[derive(Serialize)]
struct AgentApiBody<'a> {
    message: &'a str,
    agent_id: &'a str,
    user_id: &'a str,
    session_id: &'a str,
}

/// Calls a hosted diagnostic agent over HTTP and unwraps its reply envelope.
pub struct AgentApiCollaborator {
    client: reqwest::Client,
    endpoint: String,
    agent_id: String,
    api_key: String,
}

impl AgentApiCollaborator {
    pub fn new(endpoint: impl Into<String>, agent_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            agent_id: agent_id.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl DiagnosticCollaborator for AgentApiCollaborator {
    async fn diagnose(&self, request: &DiagnosticRequest) -> Result<Value, CollaboratorError> {
        let body = AgentApiBody {
            message: &request.message,
            agent_id: &self.agent_id,
            user_id: &request.metadata.user_id,
            session_id: &request.metadata.session_id,
        };
        info!(endpoint = %self.endpoint, agent = %self.agent_id, "calling diagnostic agent");

        let mut call = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            call = call.bearer_auth(&self.api_key);
        }
        let resp = call
            .send()
            .await
            .map_err(|e| CollaboratorError::new(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| CollaboratorError::new(format!("read reply: {e}")))?;
        if !status.is_success() {
            return Err(CollaboratorError::new(format!(
                "agent API returned {status}: {text}"
            )));
        }

        let reply: Value = serde_json::from_str(&text)
            .map_err(|e| CollaboratorError::new(format!("agent API reply is not JSON: {e}")))?;
        parse::unwrap_envelope(reply)
    }
}

/// Pick the collaborator the settings describe.
pub fn collaborator_from_settings(
    settings: &AiSettings,
) -> Result<Box<dyn DiagnosticCollaborator>, CollaboratorError> {
    if !ai_configured(settings) {
        return Err(CollaboratorError::new(
            "no diagnostic provider configured; set provider and model in ~/.agentdbg/settings.json",
        ));
    }
    if settings.provider == "agent-api" {
        return Ok(Box::new(AgentApiCollaborator::new(
            &settings.endpoint,
            &settings.agent_id,
            &settings.api_key,
        )));
    }
    Ok(Box::new(LlmCollaborator::new(settings.clone())))
}
