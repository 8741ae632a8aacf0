pub mod collaborator;
pub mod engine;
mod parse;
pub mod prompt;

use agentdbg_core::session::{AnalysisSession, AnalysisTicket};
use agentdbg_core::{AnalysisError, DiagnosticResponse};

pub use collaborator::{
    collaborator_from_settings, AgentApiCollaborator, DiagnosticCollaborator, DiagnosticRequest,
    LlmCollaborator, SessionMetadata,
};

/// Start an analysis on `session` and build the request for the collaborator.
/// The session is not borrowed past this call, so the caller may release any
/// lock around it while the request is in flight.
pub fn prepare_analysis(
    session: &mut AnalysisSession,
    metadata: SessionMetadata,
) -> Result<(AnalysisTicket, DiagnosticRequest), AnalysisError> {
    let ticket = session.begin_analysis()?;
    let hierarchy = prompt::describe_hierarchy(session.store());
    let message = prompt::user_message(&hierarchy, session.behavior());
    Ok((
        ticket,
        DiagnosticRequest {
            message,
            hierarchy,
            metadata,
        },
    ))
}

/// Run one full analysis: begin, call the collaborator once, normalize, store.
pub async fn run_analysis<'s>(
    session: &'s mut AnalysisSession,
    collaborator: &dyn DiagnosticCollaborator,
    metadata: SessionMetadata,
) -> Result<&'s DiagnosticResponse, AnalysisError> {
    let (ticket, request) = prepare_analysis(session, metadata)?;
    let outcome = collaborator.diagnose(&request).await;
    session.complete_analysis(ticket, outcome)
}
