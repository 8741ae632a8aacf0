use agentdbg_core::fixes::synthesize;
use agentdbg_core::normalize::normalize;
use agentdbg_core::{
    AgentKind, AgentStore, DiagnosticResponse, DiagnosticResult, DiagnosticStatus, Severity,
    StorePolicy,
};
use proptest::prelude::*;
use std::collections::HashSet;

/// How a generated agent picks its parent.
#[derive(Debug, Clone)]
enum Link {
    Major,
    SubOf(usize),
    Orphan,
    Dangling,
}

fn link_strategy() -> impl Strategy<Value = Link> {
    prop_oneof![
        3 => Just(Link::Major),
        4 => (0usize..16).prop_map(Link::SubOf),
        1 => Just(Link::Orphan),
        1 => Just(Link::Dangling),
    ]
}

/// Build a store from generated links. `SubOf(n)` picks the n-th major created
/// so far, falling back to an orphan when there is none.
fn build(links: &[Link]) -> AgentStore {
    let mut store = AgentStore::new(StorePolicy {
        require_sub_parent: false,
    });
    let mut majors: Vec<String> = Vec::new();
    for (i, link) in links.iter().enumerate() {
        let name = format!("agent {i}");
        match link {
            Link::Major => {
                let a = store.add(&name, AgentKind::Major, None, None).unwrap();
                majors.push(a.id);
            }
            Link::SubOf(n) if !majors.is_empty() => {
                let parent = majors[n % majors.len()].clone();
                store.add(&name, AgentKind::Sub, Some(&parent), None).unwrap();
            }
            Link::SubOf(_) | Link::Orphan => {
                store.add(&name, AgentKind::Sub, None, None).unwrap();
            }
            Link::Dangling => {
                store
                    .add(&name, AgentKind::Sub, Some("agent-missing"), None)
                    .unwrap();
            }
        }
    }
    store
}

proptest! {
    /// Property: every agent lands in exactly one place in the hierarchy.
    #[test]
    fn prop_hierarchy_partitions_agents(links in prop::collection::vec(link_strategy(), 0..24)) {
        let store = build(&links);
        let tree = store.list_hierarchy();

        let mut seen: Vec<&str> = Vec::new();
        for group in &tree.groups {
            prop_assert_eq!(group.major.kind, AgentKind::Major);
            seen.push(&group.major.id);
            for child in &group.children {
                prop_assert_eq!(child.parent_id.as_deref(), Some(group.major.id.as_str()));
                seen.push(&child.id);
            }
        }
        for orphan in &tree.orphans {
            prop_assert_eq!(orphan.kind, AgentKind::Sub);
            prop_assert!(store.parent_of(orphan).is_none());
            seen.push(&orphan.id);
        }

        let unique: HashSet<&str> = seen.iter().copied().collect();
        prop_assert_eq!(unique.len(), seen.len());
        let all: HashSet<&str> = store.agents().iter().map(|a| a.id.as_str()).collect();
        prop_assert_eq!(unique, all);
    }

    /// Property: cascading removal takes a major and exactly its subs.
    #[test]
    fn prop_cascade_removes_exact_subtree(
        links in prop::collection::vec(link_strategy(), 1..24),
        pick in 0usize..24,
    ) {
        let mut store = build(&links);
        let majors: Vec<String> = store
            .agents()
            .iter()
            .filter(|a| a.kind == AgentKind::Major)
            .map(|a| a.id.clone())
            .collect();
        prop_assume!(!majors.is_empty());
        let target = majors[pick % majors.len()].clone();

        let expected: HashSet<String> = store
            .agents()
            .iter()
            .filter(|a| a.id == target || a.parent_id.as_deref() == Some(target.as_str()))
            .map(|a| a.id.clone())
            .collect();
        let before = store.len();

        let removed = store.remove(&target, true).unwrap();
        let removed_set: HashSet<String> = removed.iter().cloned().collect();
        prop_assert_eq!(removed_set, expected);
        prop_assert_eq!(store.len(), before - removed.len());
        prop_assert!(store.agents().iter().all(|a| !removed.contains(&a.id)));
    }

    /// Property: removing a sub without cascade touches nothing else.
    #[test]
    fn prop_sub_removal_is_local(
        links in prop::collection::vec(link_strategy(), 1..24),
        pick in 0usize..24,
    ) {
        let mut store = build(&links);
        let subs: Vec<String> = store
            .agents()
            .iter()
            .filter(|a| a.kind == AgentKind::Sub)
            .map(|a| a.id.clone())
            .collect();
        prop_assume!(!subs.is_empty());
        let target = subs[pick % subs.len()].clone();

        let mut expected = store.agents().to_vec();
        expected.retain(|a| a.id != target);

        prop_assert_eq!(store.remove(&target, false).unwrap(), vec![target.clone()]);
        prop_assert_eq!(store.agents(), expected.as_slice());
    }

    /// Property: Pass findings never produce prompt fixes.
    #[test]
    fn prop_pass_never_contributes(categories in prop::collection::vec("[a-zA-Z ]{0,24}", 0..8)) {
        let store = build(&[Link::Major, Link::SubOf(0)]);
        let results = DiagnosticResponse {
            overall_health_score: 100,
            diagnostics: categories
                .into_iter()
                .map(|category| DiagnosticResult {
                    category,
                    status: DiagnosticStatus::Pass,
                    summary: String::new(),
                    detailed_explanation: String::new(),
                    recommended_fix: String::new(),
                    severity: Severity::Low,
                })
                .collect(),
            raw_priority_actions: None,
        };
        prop_assert!(synthesize(store.agents(), &results).is_empty());
    }

    /// Property: normalizing a normalized payload changes nothing.
    #[test]
    fn prop_normalize_idempotent(score in 0u32..=100, actions in prop::option::of(prop::collection::vec("[a-z ]{1,12}", 0..4))) {
        let mut raw = serde_json::json!({"result": {"overall_health_score": score, "diagnostics": []}});
        if let Some(actions) = &actions {
            raw["result"]["priority_actions"] = serde_json::json!(actions);
        }
        let once = normalize(&raw).unwrap();
        let twice = normalize(&serde_json::to_value(&once).unwrap()).unwrap();
        prop_assert_eq!(once, twice);
    }
}
