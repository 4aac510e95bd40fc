use docsuite::services::DependencyResolver;
use docsuite::WorkflowError;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{HashMap, HashSet};

/// Random DAG: node `i` may only depend on nodes with a smaller index.
/// Nodes are presented to the resolver in shuffled order.
fn acyclic_graph() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    (1usize..24)
        .prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0usize..n, 0..4), n))
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, candidates)| {
                    let deps: HashSet<usize> = candidates.into_iter().filter(|d| *d < i).collect();
                    (
                        format!("t{i}"),
                        deps.into_iter().map(|d| format!("t{d}")).collect(),
                    )
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

fn order(
    resolver: &DependencyResolver,
    graph: &[(String, Vec<String>)],
) -> Result<Vec<String>, WorkflowError> {
    resolver.order_ids(
        graph
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.iter().map(String::as_str))),
    )
}

proptest! {
    /// Property: every dependency precedes its dependents in the resolved order
    #[test]
    fn prop_order_respects_dependencies(graph in acyclic_graph()) {
        let resolver = DependencyResolver::new();
        let ordered = order(&resolver, &graph)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(ordered.len(), graph.len());
        let position: HashMap<&str, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        for (id, deps) in &graph {
            for dep in deps {
                prop_assert!(
                    position[dep.as_str()] < position[id.as_str()],
                    "{} scheduled before its dependency {}", id, dep
                );
            }
        }
    }

    /// Property: the order is a pure function of the input
    #[test]
    fn prop_order_is_deterministic(graph in acyclic_graph()) {
        let resolver = DependencyResolver::new();
        let first = order(&resolver, &graph).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let second = order(&resolver, &graph).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(first, second);
    }

    /// Property: any graph containing a cycle is rejected, naming a task on it
    #[test]
    fn prop_cycle_is_detected(graph in acyclic_graph(), cycle_len in 1usize..6) {
        let resolver = DependencyResolver::new();
        let mut graph = graph;

        // c0 -> c1 -> ... -> c{k-1} -> c0
        let cycle_ids: Vec<String> = (0..cycle_len).map(|i| format!("c{i}")).collect();
        for (i, id) in cycle_ids.iter().enumerate() {
            let next = cycle_ids[(i + 1) % cycle_len].clone();
            let mut deps = vec![next];
            deps.push(graph[0].0.clone());
            graph.push((id.clone(), deps));
        }

        match order(&resolver, &graph) {
            Err(WorkflowError::Cycle { task_id, path }) => {
                prop_assert!(cycle_ids.contains(&task_id), "unexpected cycle member {}", task_id);
                prop_assert!(path.len() >= 2);
                prop_assert_eq!(path.first(), path.last());
                prop_assert!(path.iter().all(|id| cycle_ids.contains(id)));
            }
            other => prop_assert!(false, "expected a cycle error, got {:?}", other),
        }
    }

    /// Property: a dependency on an id that is not in the graph is rejected
    #[test]
    fn prop_unknown_dependency_is_rejected(graph in acyclic_graph()) {
        let resolver = DependencyResolver::new();
        let mut graph = graph;
        graph.push(("orphan".to_string(), vec!["missing".to_string()]));

        let result = order(&resolver, &graph);
        let is_unknown = matches!(
            result,
            Err(WorkflowError::UnknownDependency { ref task_id, ref dependency })
                if task_id == "orphan" && dependency == "missing"
        );
        prop_assert!(is_unknown, "unexpected result {:?}", result);
    }
}
