use agentdbg_core::normalize::extract_json_object;
use agentdbg_core::CollaboratorError;
use serde_json::Value;

/// Reply envelope of the hosted agent API.
#[derive(serde::Deserialize)]
struct AgentEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    response: Option<EnvelopeResponse>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(serde::Deserialize)]
struct EnvelopeResponse {
    #[serde(default)]
    result: Option<Value>,
}

/// Pull the diagnostic payload out of an agent API reply.
/// A failed or empty envelope is a collaborator failure, not a format problem.
pub fn unwrap_envelope(body: Value) -> Result<Value, CollaboratorError> {
    let envelope: AgentEnvelope = serde_json::from_value(body)
        .map_err(|e| CollaboratorError::new(format!("unreadable agent API reply: {e}")))?;

    if !envelope.success {
        return Err(CollaboratorError::new(
            envelope
                .error
                .unwrap_or_else(|| "agent API reported failure".to_string()),
        ));
    }

    match envelope.response.and_then(|r| r.result) {
        Some(Value::Null) | None => Err(CollaboratorError::new(
            envelope
                .error
                .unwrap_or_else(|| "agent API returned no result".to_string()),
        )),
        Some(result) => Ok(embedded_json(result)),
    }
}

/// Turn model reply text into a payload for the normalizer. Text without a
/// JSON object is passed through as a string and rejected there.
pub fn llm_payload(raw: &str) -> Value {
    extract_json_object(raw).unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Some agents answer with the JSON document as a string.
fn embedded_json(result: Value) -> Value {
    match result {
        Value::String(text) => llm_payload(&text),
        other => other,
    }
}
