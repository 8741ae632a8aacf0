use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info};

use crate::{Agent, AgentError, AgentKind};

pub const MAX_NAME_LEN: usize = 50;

/// Rules applied on add/update that the UI enforces but the model itself can live without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Reject sub-agents created or updated without a parent reference.
    pub require_sub_parent: bool,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            require_sub_parent: true,
        }
    }
}

/// Field changes for [`AgentStore::update`]. `None` leaves a field as it is;
/// `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub kind: Option<AgentKind>,
    pub parent_id: Option<Option<String>>,
    pub system_prompt: Option<Option<String>>,
}

/// What an agent's `parent_id` points at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParentLink<'a> {
    Unparented,
    Resolved(&'a Agent),
    Dangling(&'a str),
}

#[derive(Debug, Serialize)]
pub struct HierarchyGroup<'a> {
    pub major: &'a Agent,
    pub children: Vec<&'a Agent>,
}

/// Majors with their sub-agents, then every sub that has no major to sit under.
#[derive(Debug, Serialize)]
pub struct Hierarchy<'a> {
    pub groups: Vec<HierarchyGroup<'a>>,
    pub orphans: Vec<&'a Agent>,
}

impl Hierarchy<'_> {
    /// Number of agents placed, groups heads included.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| 1 + g.children.len()).sum::<usize>() + self.orphans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.orphans.is_empty()
    }
}

/// Agent records in insertion order.
#[derive(Debug, Clone, Default)]
pub struct AgentStore {
    agents: Vec<Agent>,
    policy: StorePolicy,
    last_stamp: u128,
}

impl AgentStore {
    pub fn new(policy: StorePolicy) -> Self {
        Self {
            agents: Vec::new(),
            policy,
            last_stamp: 0,
        }
    }

    /// Rebuild a store from records supplied by a caller. Degenerate parent
    /// references are kept; duplicate ids are rejected.
    pub fn from_agents(agents: Vec<Agent>, policy: StorePolicy) -> Result<Self, AgentError> {
        let mut store = Self::new(policy);
        for mut agent in agents {
            if store.contains(&agent.id) {
                return Err(AgentError::Validation(format!(
                    "duplicate agent id '{}'",
                    agent.id
                )));
            }
            if agent.kind == AgentKind::Major {
                agent.parent_id = None;
            }
            store.agents.push(agent);
        }
        Ok(store)
    }

    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn add(
        &mut self,
        name: &str,
        kind: AgentKind,
        parent_id: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<Agent, AgentError> {
        let name = validate_name(name)?;
        let parent_id = self.check_parent(None, kind, parent_id.map(str::to_string))?;
        let agent = Agent {
            id: self.next_id(),
            name,
            kind,
            parent_id,
            system_prompt: system_prompt.map(str::to_string),
        };
        info!(id = %agent.id, kind = agent.kind.as_str(), "agent added");
        self.agents.push(agent.clone());
        Ok(agent)
    }

    pub fn update(&mut self, id: &str, patch: AgentPatch) -> Result<Agent, AgentError> {
        let idx = self
            .agents
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| AgentError::NotFound(id.to_string()))?;
        let current = &self.agents[idx];

        let name = match patch.name {
            Some(n) => validate_name(&n)?,
            None => current.name.clone(),
        };
        let kind = patch.kind.unwrap_or(current.kind);
        let parent = patch
            .parent_id
            .unwrap_or_else(|| current.parent_id.clone());
        let system_prompt = patch
            .system_prompt
            .unwrap_or_else(|| current.system_prompt.clone());
        let parent_id = self.check_parent(Some(id), kind, parent)?;

        let agent = &mut self.agents[idx];
        agent.name = name;
        agent.kind = kind;
        agent.parent_id = parent_id;
        agent.system_prompt = system_prompt;
        info!(id, kind = kind.as_str(), "agent updated");
        Ok(agent.clone())
    }

    /// Remove an agent. With `cascade`, removing a major also removes its subs.
    /// Returns every removed id, the target first.
    pub fn remove(&mut self, id: &str, cascade: bool) -> Result<Vec<String>, AgentError> {
        let target = self
            .get(id)
            .ok_or_else(|| AgentError::NotFound(id.to_string()))?;

        let mut removed = vec![id.to_string()];
        if cascade && target.kind == AgentKind::Major {
            removed.extend(
                self.agents
                    .iter()
                    .filter(|a| a.parent_id.as_deref() == Some(id))
                    .map(|a| a.id.clone()),
            );
        }
        self.agents.retain(|a| !removed.contains(&a.id));
        info!(id, cascade, removed = removed.len(), "agent removed");
        Ok(removed)
    }

    pub fn list_hierarchy(&self) -> Hierarchy<'_> {
        let groups = self
            .agents
            .iter()
            .filter(|a| a.kind == AgentKind::Major)
            .map(|major| HierarchyGroup {
                major,
                children: self
                    .agents
                    .iter()
                    .filter(|a| {
                        a.kind == AgentKind::Sub && a.parent_id.as_deref() == Some(major.id.as_str())
                    })
                    .collect(),
            })
            .collect();

        let orphans = self
            .agents
            .iter()
            .filter(|a| a.kind == AgentKind::Sub && !self.under_major(a))
            .collect();

        Hierarchy { groups, orphans }
    }

    /// The referenced parent, or `None` when the reference is absent or dangling.
    pub fn parent_of<'a>(&'a self, agent: &'a Agent) -> Option<&'a Agent> {
        match self.parent_link(agent) {
            ParentLink::Resolved(parent) => Some(parent),
            _ => None,
        }
    }

    pub fn parent_link<'a>(&'a self, agent: &'a Agent) -> ParentLink<'a> {
        match agent.parent_id.as_deref() {
            None => ParentLink::Unparented,
            Some(pid) => match self.get(pid) {
                Some(parent) => ParentLink::Resolved(parent),
                None => ParentLink::Dangling(pid),
            },
        }
    }

    fn under_major(&self, agent: &Agent) -> bool {
        matches!(self.parent_link(agent), ParentLink::Resolved(p) if p.kind == AgentKind::Major)
    }

    fn check_parent(
        &self,
        self_id: Option<&str>,
        kind: AgentKind,
        parent_id: Option<String>,
    ) -> Result<Option<String>, AgentError> {
        if kind == AgentKind::Major {
            return Ok(None);
        }
        let parent_id = parent_id.filter(|p| !p.trim().is_empty());
        let Some(pid) = parent_id else {
            if self.policy.require_sub_parent {
                return Err(AgentError::Validation(
                    "a sub-agent needs a parent agent".to_string(),
                ));
            }
            return Ok(None);
        };
        if self_id == Some(pid.as_str()) {
            return Err(AgentError::Validation(
                "an agent cannot be its own parent".to_string(),
            ));
        }
        match self.get(&pid) {
            Some(parent) if parent.kind == AgentKind::Sub => Err(AgentError::Validation(format!(
                "parent '{}' is a sub-agent; sub-agents report to a major agent",
                parent.name
            ))),
            Some(_) => Ok(Some(pid)),
            None => {
                debug!(parent = %pid, "parent reference does not resolve");
                Ok(Some(pid))
            }
        }
    }

    /// Time-ordered id ("agent-{unix millis}"), bumped past any id already issued.
    fn next_id(&mut self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let mut stamp = now.max(self.last_stamp + 1);
        while self.contains(&format!("agent-{stamp}")) {
            stamp += 1;
        }
        self.last_stamp = stamp;
        format!("agent-{stamp}")
    }
}

fn validate_name(name: &str) -> Result<String, AgentError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AgentError::Validation("agent name is empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AgentError::Validation(format!(
            "agent name must be {MAX_NAME_LEN} characters or less"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(agents: &[&Agent]) -> Vec<String> {
        agents.iter().map(|a| a.id.clone()).collect()
    }

    fn lenient() -> AgentStore {
        AgentStore::new(StorePolicy {
            require_sub_parent: false,
        })
    }

    #[test]
    fn add_rejects_empty_and_overlong_names() {
        let mut store = AgentStore::default();
        assert!(matches!(
            store.add("   ", AgentKind::Major, None, None),
            Err(AgentError::Validation(_))
        ));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            store.add(&long, AgentKind::Major, None, None),
            Err(AgentError::Validation(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn add_trims_name_and_drops_parent_of_major() {
        let mut store = AgentStore::default();
        let agent = store
            .add("  Router  ", AgentKind::Major, Some("agent-x"), None)
            .unwrap();
        assert_eq!(agent.name, "Router");
        assert_eq!(agent.parent_id, None);
    }

    #[test]
    fn sub_without_parent_follows_policy() {
        let mut strict = AgentStore::default();
        assert!(matches!(
            strict.add("Worker", AgentKind::Sub, None, None),
            Err(AgentError::Validation(_))
        ));

        let mut store = lenient();
        let orphan = store.add("Worker", AgentKind::Sub, None, None).unwrap();
        assert_eq!(store.parent_link(&orphan), ParentLink::Unparented);
        assert_eq!(ids(&store.list_hierarchy().orphans), vec![orphan.id]);
    }

    #[test]
    fn sub_cannot_report_to_a_sub() {
        let mut store = AgentStore::default();
        let major = store.add("Lead", AgentKind::Major, None, None).unwrap();
        let sub = store
            .add("Worker", AgentKind::Sub, Some(&major.id), None)
            .unwrap();
        let err = store
            .add("Helper", AgentKind::Sub, Some(&sub.id), None)
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[test]
    fn ids_are_unique_when_created_back_to_back() {
        let mut store = AgentStore::default();
        let a = store.add("A", AgentKind::Major, None, None).unwrap();
        let b = store.add("B", AgentKind::Major, None, None).unwrap();
        let c = store.add("C", AgentKind::Major, None, None).unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert!(a.id.starts_with("agent-"));
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut store = AgentStore::default();
        let err = store.update("agent-404", AgentPatch::default()).unwrap_err();
        assert_eq!(err, AgentError::NotFound("agent-404".into()));
    }

    #[test]
    fn update_patches_only_given_fields() {
        let mut store = AgentStore::default();
        let major = store.add("Lead", AgentKind::Major, None, None).unwrap();
        let sub = store
            .add("Worker", AgentKind::Sub, Some(&major.id), Some("Summarize."))
            .unwrap();

        let updated = store
            .update(
                &sub.id,
                AgentPatch {
                    name: Some("Summarizer".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Summarizer");
        assert_eq!(updated.parent_id.as_deref(), Some(major.id.as_str()));
        assert_eq!(updated.system_prompt.as_deref(), Some("Summarize."));

        let cleared = store
            .update(
                &sub.id,
                AgentPatch {
                    system_prompt: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.system_prompt, None);
    }

    #[test]
    fn update_applies_same_constraints_as_add() {
        let mut store = AgentStore::default();
        let major = store.add("Lead", AgentKind::Major, None, None).unwrap();
        let err = store
            .update(
                &major.id,
                AgentPatch {
                    kind: Some(AgentKind::Sub),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));

        let err = store
            .update(
                &major.id,
                AgentPatch {
                    kind: Some(AgentKind::Sub),
                    parent_id: Some(Some(major.id.clone())),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert_eq!(store.get(&major.id).unwrap().kind, AgentKind::Major);
    }

    #[test]
    fn cascade_removes_major_and_its_subs_only() {
        let mut store = AgentStore::default();
        let a = store.add("A", AgentKind::Major, None, None).unwrap();
        let b = store.add("B", AgentKind::Major, None, None).unwrap();
        let a1 = store.add("A1", AgentKind::Sub, Some(&a.id), None).unwrap();
        let b1 = store.add("B1", AgentKind::Sub, Some(&b.id), None).unwrap();
        let a2 = store.add("A2", AgentKind::Sub, Some(&a.id), None).unwrap();

        let removed = store.remove(&a.id, true).unwrap();
        assert_eq!(removed, vec![a.id, a1.id, a2.id]);
        let left: Vec<&str> = store.agents().iter().map(|x| x.id.as_str()).collect();
        assert_eq!(left, vec![b.id.as_str(), b1.id.as_str()]);
    }

    #[test]
    fn non_cascading_remove_leaves_dangling_subs() {
        let mut store = AgentStore::default();
        let a = store.add("A", AgentKind::Major, None, None).unwrap();
        let a1 = store.add("A1", AgentKind::Sub, Some(&a.id), None).unwrap();

        assert_eq!(store.remove(&a.id, false).unwrap(), vec![a.id.clone()]);
        let sub = store.get(&a1.id).unwrap();
        assert_eq!(store.parent_link(sub), ParentLink::Dangling(a.id.as_str()));
        assert!(store.parent_of(sub).is_none());
        assert_eq!(ids(&store.list_hierarchy().orphans), vec![a1.id]);
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let mut store = AgentStore::default();
        assert!(matches!(
            store.remove("agent-1", true),
            Err(AgentError::NotFound(_))
        ));
    }

    #[test]
    fn hierarchy_keeps_insertion_order() {
        let mut store = lenient();
        let b = store.add("B", AgentKind::Major, None, None).unwrap();
        let orphan = store.add("Loose", AgentKind::Sub, None, None).unwrap();
        let a = store.add("A", AgentKind::Major, None, None).unwrap();
        let b2 = store.add("B2", AgentKind::Sub, Some(&b.id), None).unwrap();
        let a1 = store.add("A1", AgentKind::Sub, Some(&a.id), None).unwrap();
        let b1 = store.add("B1", AgentKind::Sub, Some(&b.id), None).unwrap();
        let ghost = store
            .add("Ghost", AgentKind::Sub, Some("agent-gone"), None)
            .unwrap();

        let tree = store.list_hierarchy();
        assert_eq!(tree.groups.len(), 2);
        assert_eq!(tree.groups[0].major.id, b.id);
        assert_eq!(ids(&tree.groups[0].children), vec![b2.id, b1.id]);
        assert_eq!(tree.groups[1].major.id, a.id);
        assert_eq!(ids(&tree.groups[1].children), vec![a1.id]);
        assert_eq!(ids(&tree.orphans), vec![orphan.id, ghost.id]);
        assert_eq!(tree.len(), store.len());
    }

    #[test]
    fn demoted_parent_turns_children_into_orphans() {
        let mut store = AgentStore::default();
        let lead = store.add("Lead", AgentKind::Major, None, None).unwrap();
        let other = store.add("Other", AgentKind::Major, None, None).unwrap();
        let worker = store
            .add("Worker", AgentKind::Sub, Some(&lead.id), None)
            .unwrap();
        store
            .update(
                &lead.id,
                AgentPatch {
                    kind: Some(AgentKind::Sub),
                    parent_id: Some(Some(other.id.clone())),
                    ..Default::default()
                },
            )
            .unwrap();

        let tree = store.list_hierarchy();
        assert_eq!(ids(&tree.groups[0].children), vec![lead.id.clone()]);
        assert_eq!(ids(&tree.orphans), vec![worker.id.clone()]);
        let worker = store.get(&worker.id).unwrap();
        assert_eq!(store.parent_of(worker).map(|p| p.id.as_str()), Some(lead.id.as_str()));
    }

    #[test]
    fn parent_of_resolves_only_live_references() {
        let mut store = lenient();
        let lead = store.add("Lead", AgentKind::Major, None, None).unwrap();
        let worker = store
            .add("Worker", AgentKind::Sub, Some(&lead.id), None)
            .unwrap();
        let loose = store.add("Loose", AgentKind::Sub, None, None).unwrap();
        let ghost = store
            .add("Ghost", AgentKind::Sub, Some("agent-gone"), None)
            .unwrap();

        let cases = [
            (&worker, Some("Lead")),
            (&loose, None),
            (&ghost, None),
            (&lead, None),
        ];
        for (agent, expected) in cases {
            assert_eq!(store.parent_of(agent).map(|p| p.name.as_str()), expected);
        }
    }

    #[test]
    fn from_agents_rejects_duplicate_ids() {
        let agent = Agent {
            id: "agent-1".into(),
            name: "A".into(),
            kind: AgentKind::Major,
            parent_id: None,
            system_prompt: None,
        };
        let err = AgentStore::from_agents(vec![agent.clone(), agent], StorePolicy::default())
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }
}
