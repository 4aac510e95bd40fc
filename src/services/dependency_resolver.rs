use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{DocumentType, TaskDescriptor};

/// Service for ordering task descriptors and detecting circular dependencies
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Grey,
    Black,
}

/// Index-based adjacency list: `edges[n]` holds the dependencies of node `n`.
struct Graph<'a> {
    ids: Vec<&'a str>,
    edges: Vec<Vec<usize>>,
}

// Depth-first post-order visit. A grey neighbour is on the current path.
fn visit(
    node: usize,
    graph: &Graph<'_>,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> WorkflowResult<()> {
    marks[node] = Mark::Grey;
    path.push(node);

    for &dep in &graph.edges[node] {
        match marks[dep] {
            Mark::White => visit(dep, graph, marks, path, order)?,
            Mark::Grey => {
                let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|&n| graph.ids[n].to_string())
                    .collect();
                cycle.push(graph.ids[dep].to_string());
                return Err(WorkflowError::Cycle {
                    task_id: graph.ids[dep].to_string(),
                    path: cycle,
                });
            }
            Mark::Black => {}
        }
    }

    path.pop();
    marks[node] = Mark::Black;
    order.push(node);
    Ok(())
}

fn topological_order(graph: &Graph<'_>) -> WorkflowResult<Vec<usize>> {
    let n = graph.ids.len();
    let mut marks = vec![Mark::White; n];
    let mut order = Vec::with_capacity(n);
    let mut path = Vec::new();

    for start in 0..n {
        if marks[start] == Mark::White {
            visit(start, graph, &mut marks, &mut path, &mut order)?;
        }
    }
    Ok(order)
}

// Longest chain of in-set dependencies below each node, following `order`.
fn depths(graph: &Graph<'_>, order: &[usize]) -> Vec<usize> {
    let mut depth = vec![0usize; graph.ids.len()];
    for &node in order {
        depth[node] = graph.edges[node]
            .iter()
            .map(|&dep| depth[dep] + 1)
            .max()
            .unwrap_or(0);
    }
    depth
}

impl DependencyResolver {
    pub const fn new() -> Self {
        Self
    }

    /// Order descriptors so that every descriptor follows the producers of
    /// all its dependencies.
    ///
    /// Traversal follows input order, then each descriptor's dependency
    /// order, so the result is deterministic.
    pub fn resolve(&self, descriptors: &[TaskDescriptor]) -> WorkflowResult<Vec<TaskDescriptor>> {
        self.resolve_with_upstream(descriptors, &BTreeSet::new())
    }

    /// Like [`resolve`](Self::resolve), but output types in `upstream` are
    /// produced by an earlier phase and satisfy dependencies without being
    /// ordered.
    pub fn resolve_with_upstream(
        &self,
        descriptors: &[TaskDescriptor],
        upstream: &BTreeSet<DocumentType>,
    ) -> WorkflowResult<Vec<TaskDescriptor>> {
        let graph = descriptor_graph(descriptors, upstream)?;
        let order = topological_order(&graph)?;
        Ok(order.into_iter().map(|n| descriptors[n].clone()).collect())
    }

    /// Order raw `(id, dependency ids)` pairs with the same algorithm.
    pub fn order_ids<'a, I, D>(&self, nodes: I) -> WorkflowResult<Vec<String>>
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: IntoIterator<Item = &'a str>,
    {
        let nodes: Vec<(&str, Vec<&str>)> = nodes
            .into_iter()
            .map(|(id, deps)| (id, deps.into_iter().collect()))
            .collect();

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
        for (i, (id, _)) in nodes.iter().enumerate() {
            if index.insert(*id, i).is_some() {
                return Err(WorkflowError::DuplicateTask((*id).to_string()));
            }
        }

        let mut edges = Vec::with_capacity(nodes.len());
        for (id, deps) in &nodes {
            let mut node_edges = Vec::with_capacity(deps.len());
            for dep in deps {
                let &target = index
                    .get(dep)
                    .ok_or_else(|| WorkflowError::UnknownDependency {
                        task_id: (*id).to_string(),
                        dependency: (*dep).to_string(),
                    })?;
                node_edges.push(target);
            }
            edges.push(node_edges);
        }

        let graph = Graph {
            ids: nodes.iter().map(|(id, _)| *id).collect(),
            edges,
        };
        let order = topological_order(&graph)?;
        Ok(order
            .into_iter()
            .map(|n| graph.ids[n].to_string())
            .collect())
    }

    /// Group descriptors into waves of mutually independent tasks.
    ///
    /// Wave `k` holds every task whose longest in-phase dependency chain has
    /// length `k`. Ids within a wave keep input order.
    pub fn execution_waves(
        &self,
        descriptors: &[TaskDescriptor],
        upstream: &BTreeSet<DocumentType>,
    ) -> WorkflowResult<Vec<Vec<String>>> {
        let graph = descriptor_graph(descriptors, upstream)?;
        let order = topological_order(&graph)?;
        let depth = depths(&graph, &order);

        let wave_count = depth.iter().max().map_or(0, |d| d + 1);
        let mut waves = vec![Vec::new(); wave_count];
        for (node, &d) in depth.iter().enumerate() {
            waves[d].push(graph.ids[node].to_string());
        }
        Ok(waves)
    }

    /// Longest in-phase dependency chain below each descriptor, by id.
    pub fn depth(
        &self,
        descriptors: &[TaskDescriptor],
        upstream: &BTreeSet<DocumentType>,
    ) -> WorkflowResult<BTreeMap<String, usize>> {
        let graph = descriptor_graph(descriptors, upstream)?;
        let order = topological_order(&graph)?;
        let depth = depths(&graph, &order);
        Ok(graph
            .ids
            .iter()
            .zip(depth)
            .map(|(id, d)| ((*id).to_string(), d))
            .collect())
    }
}

fn descriptor_graph<'a>(
    descriptors: &'a [TaskDescriptor],
    upstream: &BTreeSet<DocumentType>,
) -> WorkflowResult<Graph<'a>> {
    let mut producers: HashMap<DocumentType, usize> = HashMap::with_capacity(descriptors.len());
    let mut seen_ids: HashMap<&str, usize> = HashMap::with_capacity(descriptors.len());

    for (i, descriptor) in descriptors.iter().enumerate() {
        if seen_ids.insert(descriptor.id.as_str(), i).is_some() {
            return Err(WorkflowError::DuplicateTask(descriptor.id.clone()));
        }
        if producers.insert(descriptor.output_type, i).is_some() {
            return Err(WorkflowError::DuplicateTask(format!(
                "{} (output type {} produced twice)",
                descriptor.id, descriptor.output_type
            )));
        }
    }

    let mut edges = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let mut node_edges = Vec::with_capacity(descriptor.dependencies.len());
        for dep in &descriptor.dependencies {
            if let Some(&producer) = producers.get(dep) {
                node_edges.push(producer);
            } else if !upstream.contains(dep) {
                return Err(WorkflowError::UnknownDependency {
                    task_id: descriptor.id.clone(),
                    dependency: dep.to_string(),
                });
            }
        }
        edges.push(node_edges);
    }

    Ok(Graph {
        ids: descriptors.iter().map(|d| d.id.as_str()).collect(),
        edges,
    })
}
