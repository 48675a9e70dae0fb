//! Dependency graph built from a skill's phases, and batch-by-batch
//! topological scheduling over it.

use std::collections::{HashMap, VecDeque};

use crate::error::{DagError, Result};
use crate::phase::Phase;

/// One phase as it sits in the graph: its value object plus the incoming
/// edge count and the set of phases that depend on it.
#[derive(Debug, Clone)]
pub struct DagNode {
    pub phase: Phase,
    pub in_degree: usize,
    pub out_edges: Vec<String>,
}

/// The dependency graph derived from a [`crate::Skill`]'s phases.
///
/// Built once per run via [`Dag::build`] and immutable thereafter. Owns a
/// phase-id → node mapping; phase-declaration order is retained separately
/// so that batching is deterministic (see [`Dag::parallel_batches`]).
#[derive(Debug, Clone)]
pub struct Dag {
    nodes: HashMap<String, DagNode>,
    declaration_order: Vec<String>,
}

impl Dag {
    /// Constructs a `Dag` from an ordered sequence of phases.
    ///
    /// Fails with [`DagError::NoPhases`] if `phases` is empty,
    /// [`DagError::DependencyNotFound`] if any `depends_on` references an
    /// unknown id, or [`DagError::Cycle`] if the dependency relation
    /// contains a cycle (three-color DFS; a self-edge counts as a cycle).
    pub fn build(phases: Vec<Phase>) -> Result<Dag> {
        if phases.is_empty() {
            return Err(DagError::NoPhases(String::new()));
        }

        let declaration_order: Vec<String> = phases.iter().map(|p| p.id.clone()).collect();
        let known: std::collections::HashSet<&str> =
            phases.iter().map(|p| p.id.as_str()).collect();

        for phase in &phases {
            for dep in &phase.depends_on {
                if !known.contains(dep.as_str()) {
                    return Err(DagError::DependencyNotFound {
                        phase: phase.id.clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        detect_cycle(&phases)?;

        let mut out_edges: HashMap<String, Vec<String>> = phases
            .iter()
            .map(|p| (p.id.clone(), Vec::new()))
            .collect();
        for phase in &phases {
            for dep in &phase.depends_on {
                out_edges.get_mut(dep).unwrap().push(phase.id.clone());
            }
        }

        let mut nodes = HashMap::with_capacity(phases.len());
        for phase in phases {
            let in_degree = phase.depends_on.len();
            let id = phase.id.clone();
            let edges = out_edges.remove(&id).unwrap_or_default();
            nodes.insert(
                id,
                DagNode {
                    phase,
                    in_degree,
                    out_edges: edges,
                },
            );
        }

        Ok(Dag {
            nodes,
            declaration_order,
        })
    }

    /// Number of phases in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_phase(&self, phase_id: &str) -> Option<&Phase> {
        self.nodes.get(phase_id).map(|n| &n.phase)
    }

    pub fn get_node(&self, phase_id: &str) -> Option<&DagNode> {
        self.nodes.get(phase_id)
    }

    /// The declared dependencies of `phase_id` (a defensive copy), or an
    /// empty vec if `phase_id` is unknown.
    pub fn dependencies(&self, phase_id: &str) -> Vec<String> {
        self.nodes
            .get(phase_id)
            .map(|n| n.phase.depends_on.clone())
            .unwrap_or_default()
    }

    /// The phases that declare `phase_id` as a dependency (a defensive
    /// copy), or an empty vec if `phase_id` is unknown.
    pub fn dependents(&self, phase_id: &str) -> Vec<String> {
        self.nodes
            .get(phase_id)
            .map(|n| n.out_edges.clone())
            .unwrap_or_default()
    }

    /// Kahn's algorithm, materialized batch-by-batch: at each round every
    /// node with current in-degree zero forms the next batch, is marked
    /// processed, and decrements the in-degree of its successors.
    ///
    /// Batch membership is deterministic: within a round, zero-in-degree
    /// nodes are collected in phase-declaration order, not map-iteration
    /// order, so the same skill always yields the same batches. The batch
    /// *set* at position k depends only on phase order and the dependency
    /// relation.
    pub fn parallel_batches(&self) -> Result<Vec<Vec<String>>> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(id, n)| (id.as_str(), n.in_degree))
            .collect();

        let mut remaining = self.nodes.len();
        let mut batches = Vec::new();

        while remaining > 0 {
            let mut batch: Vec<String> = Vec::new();
            for id in &self.declaration_order {
                if in_degree.get(id.as_str()).copied() == Some(0) {
                    batch.push(id.clone());
                }
            }

            if batch.is_empty() {
                // Defensive: construction-time validation should make this
                // unreachable, but a corrupted graph must not spin forever.
                let stuck = self
                    .declaration_order
                    .iter()
                    .find(|id| in_degree.contains_key(id.as_str()))
                    .cloned()
                    .unwrap_or_default();
                return Err(DagError::Cycle(stuck));
            }

            for id in &batch {
                in_degree.remove(id.as_str());
                remaining -= 1;
                for dependent in &self.nodes[id].out_edges {
                    if let Some(d) = in_degree.get_mut(dependent.as_str()) {
                        *d -= 1;
                    }
                }
            }

            batches.push(batch);
        }

        Ok(batches)
    }

    /// The id(s) of terminal phases (no outgoing edges), in
    /// phase-declaration order.
    pub fn terminal_phases(&self) -> Vec<String> {
        self.declaration_order
            .iter()
            .filter(|id| {
                self.nodes
                    .get(id.as_str())
                    .map(|n| n.out_edges.is_empty())
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

fn detect_cycle(phases: &[Phase]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Grey,
        Black,
    }

    let index: HashMap<&str, usize> = phases
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.as_str(), i))
        .collect();
    let mut colors = vec![Color::White; phases.len()];

    fn visit(
        node: usize,
        phases: &[Phase],
        index: &HashMap<&str, usize>,
        colors: &mut [Color],
    ) -> Result<()> {
        colors[node] = Color::Grey;
        for dep in &phases[node].depends_on {
            let dep_idx = index[dep.as_str()];
            match colors[dep_idx] {
                Color::Grey => return Err(DagError::Cycle(phases[node].id.clone())),
                Color::White => visit(dep_idx, phases, index, colors)?,
                Color::Black => {}
            }
        }
        colors[node] = Color::Black;
        Ok(())
    }

    for i in 0..phases.len() {
        if colors[i] == Color::White {
            visit(i, phases, &index, &mut colors)?;
        }
    }
    Ok(())
}

/// Flattens `batches` into a single reading order, useful for tests that
/// want a deterministic linear order consistent with the DAG.
pub fn flatten_batches(batches: &[Vec<String>]) -> VecDeque<String> {
    batches.iter().flatten().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    fn phase(id: &str, deps: &[&str]) -> Phase {
        Phase::new(id, id, "{{._input}}")
            .with_depends_on(deps.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_build_rejects_empty() {
        assert!(matches!(Dag::build(vec![]), Err(DagError::NoPhases(_))));
    }

    #[test]
    fn test_build_rejects_unknown_dependency() {
        let result = Dag::build(vec![phase("a", &["ghost"])]);
        assert!(matches!(result, Err(DagError::DependencyNotFound { .. })));
    }

    #[test]
    fn test_build_rejects_cycle() {
        let result = Dag::build(vec![phase("a", &["b"]), phase("b", &["a"])]);
        assert!(matches!(result, Err(DagError::Cycle(_))));
    }

    #[test]
    fn test_build_rejects_self_loop() {
        let result = Dag::build(vec![phase("a", &["a"])]);
        assert!(matches!(result, Err(DagError::Cycle(_))));
    }

    #[test]
    fn test_linear_chain_batches() {
        let dag = Dag::build(vec![phase("a", &[]), phase("b", &["a"]), phase("c", &["b"])]).unwrap();
        let batches = dag.parallel_batches().unwrap();
        assert_eq!(batches, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn test_diamond_batches() {
        let dag = Dag::build(vec![
            phase("a", &[]),
            phase("b", &["a"]),
            phase("c", &["a"]),
            phase("d", &["b", "c"]),
        ])
        .unwrap();
        let batches = dag.parallel_batches().unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec!["a"]);
        let mut middle = batches[1].clone();
        middle.sort();
        assert_eq!(middle, vec!["b", "c"]);
        assert_eq!(batches[2], vec!["d"]);
    }

    #[test]
    fn test_every_batch_depends_only_on_earlier_batches() {
        let dag = Dag::build(vec![
            phase("a", &[]),
            phase("b", &["a"]),
            phase("c", &["a"]),
            phase("d", &["b", "c"]),
            phase("e", &["d"]),
        ])
        .unwrap();
        let batches = dag.parallel_batches().unwrap();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        for batch in &batches {
            for id in batch {
                for dep in dag.dependencies(id) {
                    assert!(seen.contains(&dep), "dependency {dep} of {id} not yet satisfied");
                }
            }
            seen.extend(batch.iter().cloned());
        }
    }

    #[test]
    fn test_terminal_phases_single() {
        let dag = Dag::build(vec![phase("a", &[]), phase("b", &["a"]), phase("c", &["b"])]).unwrap();
        assert_eq!(dag.terminal_phases(), vec!["c"]);
    }

    #[test]
    fn test_terminal_phases_multiple() {
        let dag = Dag::build(vec![phase("a", &[]), phase("b", &["a"]), phase("c", &["a"])]).unwrap();
        assert_eq!(dag.terminal_phases(), vec!["b", "c"]);
    }

    #[test]
    fn test_dependents_and_dependencies_are_defensive_copies() {
        let dag = Dag::build(vec![phase("a", &[]), phase("b", &["a"])]).unwrap();
        let mut deps = dag.dependencies("b");
        deps.push("tampered".to_string());
        assert_eq!(dag.dependencies("b"), vec!["a"]);

        let mut dependents = dag.dependents("a");
        dependents.push("tampered".to_string());
        assert_eq!(dag.dependents("a"), vec!["b"]);
    }

    #[test]
    fn test_get_phase_and_get_node_miss_return_none() {
        let dag = Dag::build(vec![phase("a", &[])]).unwrap();
        assert!(dag.get_phase("ghost").is_none());
        assert!(dag.get_node("ghost").is_none());
    }
}
