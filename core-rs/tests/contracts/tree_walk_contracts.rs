// Tree Walk Contract Tests
//
// These tests verify what enumeration may reveal. Query results and entity
// counts are built by walking the tree under access decisions, so the walk
// is the single place where hidden resources could leak.
//
// **Problem**: a resource allowed on its own shows up below a hidden parent
// **Solution**: a denied node always hides its whole subtree

use indexmap::IndexMap;
use model_bridge::walker::PathCollector;
use model_bridge::{AccessPolicy, AccessRule, InMemoryKernel, PathElement, ResourcePath, ResourceWalker};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn build_tree(leaves: &[Vec<(String, String)>]) -> (InMemoryKernel, BTreeSet<ResourcePath>) {
    let kernel = InMemoryKernel::new();
    let mut all = BTreeSet::new();
    all.insert(ResourcePath::root());
    for leaf in leaves {
        let mut prefix = ResourcePath::root();
        for (key, value) in leaf {
            prefix = prefix.append(PathElement::new(key.clone(), value.clone()));
            if all.insert(prefix.clone()) {
                kernel.insert_resource(prefix.clone(), IndexMap::new()).unwrap();
            }
        }
    }
    (kernel, all)
}

fn arb_leaves() -> impl Strategy<Value = Vec<Vec<(String, String)>>> {
    let element = ("[abc]", "[12]");
    prop::collection::vec(prop::collection::vec(element, 1..4), 0..8)
}

fn hidden_by(path: &ResourcePath, hidden: &BTreeSet<ResourcePath>) -> bool {
    hidden.iter().any(|h| h == path || h.is_ancestor_of(path))
}

proptest! {
    /// WHY: Exactly the resources outside hidden subtrees are visited
    /// REASON: Per-path decisions alone would expose descendants of hidden nodes
    /// BREAKS: Queries leak names of resources below a hidden parent
    #[test]
    fn walk_visits_exactly_unhidden_resources(
        leaves in arb_leaves(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let (kernel, all) = build_tree(&leaves);
        let candidates: Vec<&ResourcePath> = all.iter().filter(|p| !p.is_empty()).collect();
        let hidden: BTreeSet<ResourcePath> = if candidates.is_empty() {
            BTreeSet::new()
        } else {
            picks.iter().map(|i| (*i.get(&candidates)).clone()).collect()
        };
        let mut policy = AccessPolicy::allow_all();
        for path in &hidden {
            policy = policy.with_rule(AccessRule::hidden(path.to_string()));
        }
        kernel.set_access_policy(policy);

        let visited = ResourceWalker::new(&kernel, &kernel).walk(&ResourcePath::root(), PathCollector::default());
        let expected: BTreeSet<ResourcePath> = all.iter().filter(|p| !hidden_by(p, &hidden)).cloned().collect();

        prop_assert_eq!(visited.len(), expected.len());
        prop_assert_eq!(visited.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    /// WHY: Every parent is visited before its children
    /// REASON: Query results are consumed as a pre-order listing
    /// BREAKS: Clients building a tree view from query results
    #[test]
    fn walk_is_pre_order(leaves in arb_leaves()) {
        let (kernel, _) = build_tree(&leaves);
        let visited = ResourceWalker::new(&kernel, &kernel).walk(&ResourcePath::root(), PathCollector::default());
        for (i, path) in visited.iter().enumerate() {
            if let Some(parent) = path.parent() {
                prop_assert!(visited[..i].contains(&parent));
            }
        }
    }
}

/// WHY: An allowed child of a denied parent stays invisible
/// REASON: Access to /a=x/b=y is meaningless when /a=x cannot be addressed
/// BREAKS: Restricted subsystems leak their bindings
#[test]
fn denied_parent_hides_allowed_child() {
    let (kernel, _) = build_tree(&[vec![
        ("a".to_string(), "x".to_string()),
        ("b".to_string(), "y".to_string()),
    ]]);
    kernel.set_access_policy(
        AccessPolicy::allow_all()
            .with_rule(AccessRule::hidden("/a=x"))
            .with_rule(AccessRule::new("/a=x/b=y")),
    );

    let visited = ResourceWalker::new(&kernel, &kernel).walk(&ResourcePath::root(), PathCollector::default());
    assert_eq!(visited, vec![ResourcePath::root()]);
}
