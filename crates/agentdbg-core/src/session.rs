use serde_json::Value;
use tracing::{info, warn};

use crate::fixes::synthesize;
use crate::normalize::normalize;
use crate::{
    Agent, AgentError, AgentKind, AgentPatch, AgentStore, AnalysisError, CollaboratorError,
    DiagnosticResponse, PromptFixMap, StorePolicy,
};

/// Free-text description of what the system should do and what it did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorInput {
    pub flow_description: String,
    pub expected_behavior: String,
    pub actual_behavior: String,
}

/// Handed out when an analysis starts; a result is only accepted with the
/// ticket of the analysis currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTicket {
    generation: u64,
}

impl AnalysisTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One editor's working state: the agents, the behavior description, the
/// latest diagnostics and the prompt fixes derived from them.
#[derive(Debug, Default)]
pub struct AnalysisSession {
    store: AgentStore,
    behavior: BehaviorInput,
    results: Option<DiagnosticResponse>,
    prompt_fixes: Option<PromptFixMap>,
    generation: u64,
    in_flight: Option<u64>,
}

impl AnalysisSession {
    pub fn new(policy: StorePolicy) -> Self {
        Self::with_store(AgentStore::new(policy))
    }

    pub fn with_store(store: AgentStore) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }

    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    pub fn behavior(&self) -> &BehaviorInput {
        &self.behavior
    }

    pub fn set_behavior(&mut self, behavior: BehaviorInput) {
        self.behavior = behavior;
    }

    pub fn results(&self) -> Option<&DiagnosticResponse> {
        self.results.as_ref()
    }

    pub fn prompt_fixes(&self) -> Option<&PromptFixMap> {
        self.prompt_fixes.as_ref()
    }

    pub fn is_analyzing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn add_agent(
        &mut self,
        name: &str,
        kind: AgentKind,
        parent_id: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<Agent, AgentError> {
        let agent = self.store.add(name, kind, parent_id, system_prompt)?;
        self.prompt_fixes = None;
        Ok(agent)
    }

    pub fn update_agent(&mut self, id: &str, patch: AgentPatch) -> Result<Agent, AgentError> {
        let agent = self.store.update(id, patch)?;
        self.prompt_fixes = None;
        Ok(agent)
    }

    /// Remove an agent (and with `cascade`, its subs) along with their prompt fixes.
    pub fn remove_agent(&mut self, id: &str, cascade: bool) -> Result<Vec<String>, AgentError> {
        let removed = self.store.remove(id, cascade)?;
        if let Some(fixes) = self.prompt_fixes.as_mut() {
            for rid in &removed {
                fixes.remove(rid);
            }
        }
        Ok(removed)
    }

    /// Check the inputs and start a new analysis. Previous diagnostics and
    /// prompt fixes are dropped, and any analysis still in flight goes stale.
    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, AnalysisError> {
        if self.behavior.expected_behavior.trim().is_empty()
            || self.behavior.actual_behavior.trim().is_empty()
        {
            return Err(AnalysisError::Input(
                "both expected and actual behavior are required".to_string(),
            ));
        }
        if self.store.is_empty() {
            return Err(AnalysisError::Input(
                "add at least one agent to the system".to_string(),
            ));
        }

        self.results = None;
        self.prompt_fixes = None;
        self.generation += 1;
        self.in_flight = Some(self.generation);
        info!(generation = self.generation, agents = self.store.len(), "analysis started");
        Ok(AnalysisTicket {
            generation: self.generation,
        })
    }

    /// Accept the collaborator's outcome for `ticket`. On any failure the
    /// session is left without diagnostics.
    pub fn complete_analysis(
        &mut self,
        ticket: AnalysisTicket,
        outcome: Result<Value, CollaboratorError>,
    ) -> Result<&DiagnosticResponse, AnalysisError> {
        if self.in_flight != Some(ticket.generation) {
            warn!(generation = ticket.generation, "ignoring late analysis result");
            return Err(AnalysisError::Stale);
        }
        self.in_flight = None;

        let raw = outcome.inspect_err(|e| warn!(error = %e, "diagnostic collaborator failed"))?;
        let response = normalize(&raw).inspect_err(|e| warn!(error = %e, "diagnostic payload rejected"))?;
        info!(
            generation = ticket.generation,
            score = response.overall_health_score,
            findings = response.diagnostics.len(),
            "analysis complete"
        );
        Ok(&*self.results.insert(response))
    }

    /// Recompute prompt fixes from the current agents and diagnostics.
    pub fn generate_prompt_fixes(&mut self) -> Result<&PromptFixMap, AnalysisError> {
        let results = self.results.as_ref().ok_or(AnalysisError::NoResults)?;
        let fixes = synthesize(self.store.agents(), results);
        Ok(&*self.prompt_fixes.insert(fixes))
    }
}
