use serde::Serialize;
use thiserror::Error;

/// Errors from agent hierarchy operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Invalid agent: {0}")]
    Validation(String),

    #[error("Agent not found: {0}")]
    NotFound(String),
}

/// The diagnostic payload could not be read as a `DiagnosticResponse`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unrecognized diagnostic response shape")]
    UnrecognizedShape,

    #[error("diagnostics is not a sequence")]
    DiagnosticsNotSequence,

    #[error("malformed diagnostic response: {0}")]
    Malformed(String),
}

/// The external diagnostic call itself failed. The message is kept verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Cannot analyze: {0}")]
    Input(String),

    #[error("No diagnostic results yet. Run an analysis first.")]
    NoResults,

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Diagnostic collaborator failed: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Analysis result arrived after a newer analysis started")]
    Stale,
}

/// Failure at the prompt-fix request boundary, with the status the caller should answer with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing agents or diagnostic results")]
    MissingInputs,

    #[error("Failed to generate prompt fixes")]
    Malformed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl RequestError {
    pub fn status(&self) -> u16 {
        match self {
            RequestError::MissingInputs => 400,
            RequestError::Malformed(_) => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}
