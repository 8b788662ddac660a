// src/dag/plan.rs

//! Static schedule derived from a validated graph.
//!
//! The plan is what a dry run prints: tasks grouped into *waves* (tasks whose
//! longest dependency chain has the same length), which is both a valid
//! execution order and a picture of the available parallelism. The number of
//! waves is the critical-path length in tasks.

use petgraph::algo::toposort;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::dag::cycle::validate;
use crate::dag::graph::GraphModel;
use crate::errors::CycleError;
use crate::types::TaskId;

/// Precedence-respecting schedule for a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// `waves[k]` holds the tasks at depth `k`, in declaration order.
    pub waves: Vec<Vec<TaskId>>,
    /// One longest dependency chain, root first.
    pub critical_path: Vec<TaskId>,
}

impl Plan {
    /// Compute the plan. Fails with the same error as
    /// [`validate`](crate::dag::validate) on a cyclic graph.
    pub fn compute(graph: &GraphModel) -> Result<Self, CycleError> {
        validate(graph)?;

        let (pg, nodes) = to_petgraph(graph);
        let order = toposort(&pg, None).map_err(|cycle| CycleError {
            path: vec![pg[cycle.node_id()].to_string()],
        })?;

        // depth[i] = length of the longest chain of dependencies below i.
        let mut depth = vec![0usize; graph.len()];
        for node in order {
            let i = node.index();
            depth[i] = graph
                .deps_at(i)
                .iter()
                .map(|&d| depth[d] + 1)
                .max()
                .unwrap_or(0);
        }
        debug_assert_eq!(nodes.len(), graph.len());

        let wave_count = depth.iter().max().map_or(0, |d| d + 1);
        let mut waves: Vec<Vec<TaskId>> = vec![Vec::new(); wave_count];
        for (i, &d) in depth.iter().enumerate() {
            waves[d].push(graph.id_at(i).to_string());
        }

        let critical_path = critical_path(graph, &depth);

        Ok(Self {
            waves,
            critical_path,
        })
    }

    /// Flattened execution order: wave by wave.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.waves.iter().flatten().map(|s| s.as_str())
    }

    /// Largest number of tasks that can run at the same time under this plan.
    pub fn max_parallelism(&self) -> usize {
        self.waves.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Walk back from the first deepest task through a dependency one level
/// shallower each step.
fn critical_path(graph: &GraphModel, depth: &[usize]) -> Vec<TaskId> {
    let Some(max) = depth.iter().copied().max() else {
        return Vec::new();
    };

    let mut current = depth.iter().position(|&d| d == max);
    let mut path = Vec::with_capacity(max + 1);

    while let Some(i) = current {
        path.push(graph.id_at(i).to_string());
        current = graph
            .deps_at(i)
            .iter()
            .copied()
            .find(|&d| depth[d] + 1 == depth[i]);
    }

    path.reverse();
    path
}

/// Mirror the graph into petgraph; edges point from dependency to dependent.
fn to_petgraph(graph: &GraphModel) -> (DiGraph<&str, ()>, Vec<NodeIndex>) {
    let mut pg: DiGraph<&str, ()> = DiGraph::with_capacity(graph.len(), 0);
    let nodes: Vec<NodeIndex> = graph.task_ids().map(|id| pg.add_node(id)).collect();

    for (i, &node) in nodes.iter().enumerate() {
        for &dep in graph.deps_at(i) {
            pg.add_edge(nodes[dep], node, ());
        }
    }

    (pg, nodes)
}

/// Render the graph in Graphviz DOT format (dependency -> dependent).
///
/// Node labels are the quoted task ids.
pub fn to_dot(graph: &GraphModel) -> String {
    let (pg, _) = to_petgraph(graph);
    format!("{:?}", Dot::with_config(&pg, &[Config::EdgeNoLabel]))
}
