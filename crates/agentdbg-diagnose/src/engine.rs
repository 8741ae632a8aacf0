use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use serde_json::Value;
use tracing::{debug, warn};

use agentdbg_core::{AiSettings, CollaboratorError};

use crate::collaborator::DiagnosticRequest;
use crate::{parse, prompt};

fn map_backend(provider: &str) -> Result<LLMBackend, CollaboratorError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(CollaboratorError::new(format!(
            "provider '{other}' cannot run diagnostics as a chat model"
        ))),
    }
}

/// A builder primed with the diagnostic system prompt for the configured model.
fn diagnostic_builder(settings: &AiSettings) -> Result<LLMBuilder, CollaboratorError> {
    let backend = map_backend(&settings.provider)?;
    if settings.model.trim().is_empty() {
        return Err(CollaboratorError::new(format!(
            "no model configured for provider '{}'",
            settings.provider
        )));
    }

    let mut builder = LLMBuilder::new()
        .backend(backend)
        .model(&settings.model)
        .system(prompt::system_prompt());
    if !settings.api_key.is_empty() {
        builder = builder.api_key(&settings.api_key);
    }
    Ok(builder)
}

fn reply_text(text: Option<String>) -> Result<String, CollaboratorError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        Some(_) => Err(CollaboratorError::new("model returned an empty diagnosis")),
        None => Err(CollaboratorError::new("model returned no text")),
    }
}

/// Ask the configured chat model for a diagnosis of `request`.
///
/// The reply is reduced to the JSON object it carries. Prose with no object
/// is passed on as a string, which the normalizer rejects.
pub async fn diagnose(
    settings: &AiSettings,
    request: &DiagnosticRequest,
) -> Result<Value, CollaboratorError> {
    let llm = diagnostic_builder(settings)?
        .build()
        .map_err(|e| CollaboratorError::new(format!("build LLM: {e}")))?;

    let messages = vec![ChatMessage::user().content(&request.message).build()];
    let response = llm
        .chat(&messages)
        .await
        .map_err(|e| CollaboratorError::new(format!("chat: {e}")))?;

    let text = reply_text(response.text())?;
    debug!(
        session = %request.metadata.session_id,
        len = text.len(),
        "diagnostic reply received"
    );
    let payload = parse::llm_payload(&text);
    if payload.is_string() {
        warn!(session = %request.metadata.session_id, "diagnostic reply carries no JSON object");
    }
    Ok(payload)
}
