use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::fixes::synthesize;
use crate::{Agent, DiagnosticResponse, PromptFixMap, RequestError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFixRequest {
    #[serde(default)]
    pub agents: Option<Vec<Agent>>,
    #[serde(default)]
    pub diagnostic_results: Option<DiagnosticResponse>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptFixResponse {
    pub prompt_fixes: PromptFixMap,
}

/// Answer a prompt-fix request body.
///
/// Absent inputs are a 400; a body that does not fit the typed shape is a 500.
pub fn handle_prompt_fix_request(body: &Value) -> Result<PromptFixResponse, RequestError> {
    let missing = |key: &str| body.get(key).map_or(true, Value::is_null);
    if missing("agents") || missing("diagnosticResults") {
        return Err(RequestError::MissingInputs);
    }

    let request: PromptFixRequest = serde_json::from_value(body.clone()).map_err(|e| {
        warn!(error = %e, "prompt fix request did not parse");
        RequestError::Malformed(e.to_string())
    })?;
    let (Some(agents), Some(results)) = (request.agents, request.diagnostic_results) else {
        return Err(RequestError::MissingInputs);
    };

    Ok(PromptFixResponse {
        prompt_fixes: synthesize(&agents, &results),
    })
}
