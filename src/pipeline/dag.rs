// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagflow contributors

//! DAG (Directed Acyclic Graph) view of a pipeline
//!
//! Builds a petgraph graph from a pipeline's task dependencies and answers
//! ordering and reachability questions about it. Node indices follow task
//! declaration order, so every listing here is deterministic.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, Control, Dfs, DfsEvent};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::errors::DagflowError;
use crate::pipeline::Pipeline;

/// Builder for task dependency DAGs
pub struct DagBuilder {
    graph: DiGraph<usize, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    index_to_name: Vec<String>,
}

impl DagBuilder {
    /// Create an empty DAG
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_index: HashMap::new(),
            index_to_name: Vec::new(),
        }
    }

    /// Build a DAG from a pipeline
    ///
    /// Edges point from upstream to downstream.
    pub fn build(pipeline: &Pipeline) -> Self {
        let mut builder = Self::new();

        for (idx, task) in pipeline.tasks().iter().enumerate() {
            let node = builder.graph.add_node(idx);
            builder.name_to_index.insert(task.name.clone(), node);
            builder.index_to_name.push(task.name.clone());
        }

        for task in pipeline.tasks() {
            let task_node = builder.name_to_index[&task.name];
            for upstream in task.upstream() {
                // Pipeline guarantees upstream names exist
                if let Some(&up_node) = builder.name_to_index.get(upstream) {
                    builder.graph.add_edge(up_node, task_node, ());
                }
            }
        }

        builder
    }

    /// Number of tasks in the graph
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Topologically sorted task indices (Kahn's algorithm)
    ///
    /// Among tasks whose dependencies are all satisfied, the one declared
    /// first is always picked next.
    pub fn topological_order(&self) -> Result<Vec<usize>, DagflowError> {
        let mut in_degree = self.in_degrees();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for next in self.dependents_of(idx) {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() != self.len() {
            let stuck: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|(_, &deg)| deg > 0)
                .map(|(idx, _)| self.index_to_name[idx].clone())
                .collect();
            return Err(DagflowError::Cycle { path: stuck });
        }

        Ok(order)
    }

    /// Topologically sorted task names
    pub fn topological_order_names(&self) -> Result<Vec<String>, DagflowError> {
        Ok(self
            .topological_order()?
            .into_iter()
            .map(|idx| self.index_to_name[idx].clone())
            .collect())
    }

    /// Number of upstream edges per task, by declaration index
    pub(crate) fn in_degrees(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect()
    }

    /// Direct dependents of a task, by declaration index, in ascending order
    pub(crate) fn dependents_of(&self, idx: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(idx), Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Every task reachable from `idx`, excluding `idx` itself, ascending
    pub(crate) fn downstream_of(&self, idx: usize) -> Vec<usize> {
        let start = NodeIndex::new(idx);
        let mut dfs = Dfs::new(&self.graph, start);
        let mut out = Vec::new();
        while let Some(node) = dfs.next(&self.graph) {
            if node != start {
                out.push(self.graph[node]);
            }
        }
        out.sort_unstable();
        out
    }

    /// Get dependencies for a task (tasks that must run before it)
    pub fn dependencies(&self, task_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(task_name)?;
        let mut deps: Vec<usize> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .map(|n| self.graph[n])
            .collect();
        deps.sort_unstable();
        Some(deps.into_iter().map(|i| self.index_to_name[i].clone()).collect())
    }

    /// Get dependents for a task (tasks that depend on it)
    pub fn dependents(&self, task_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(task_name)?;
        Some(
            self.dependents_of(self.graph[*node])
                .into_iter()
                .map(|i| self.index_to_name[i].clone())
                .collect(),
        )
    }

    /// All tasks that transitively depend on `task_name`
    pub fn downstream_closure(&self, task_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(task_name)?;
        Some(
            self.downstream_of(self.graph[*node])
                .into_iter()
                .map(|i| self.index_to_name[i].clone())
                .collect(),
        )
    }

    /// Check if task A depends (directly or transitively) on task B
    pub fn depends_on(&self, task_a: &str, task_b: &str) -> bool {
        let Some(node_a) = self.name_to_index.get(task_a) else {
            return false;
        };
        let Some(node_b) = self.name_to_index.get(task_b) else {
            return false;
        };

        petgraph::algo::has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Depth-first search for a path of edges from `from` to `to`
    ///
    /// Returns the task names along the path, both ends included.
    pub fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let start = *self.name_to_index.get(from)?;
        let goal = *self.name_to_index.get(to)?;
        if start == goal {
            return Some(vec![from.to_string()]);
        }

        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut found = false;
        depth_first_search(&self.graph, Some(start), |event| {
            if let DfsEvent::TreeEdge(u, v) = event {
                parent.insert(v, u);
                if v == goal {
                    found = true;
                    return Control::Break(());
                }
            }
            Control::Continue
        });

        if !found {
            return None;
        }

        let mut path = vec![goal];
        let mut current = goal;
        while let Some(&prev) = parent.get(&current) {
            path.push(prev);
            if prev == start {
                break;
            }
            current = prev;
        }
        path.reverse();

        Some(
            path.into_iter()
                .map(|n| self.index_to_name[self.graph[n]].clone())
                .collect(),
        )
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");

        for (idx, name) in self.index_to_name.iter().enumerate() {
            out.push_str(&format!("    t{}[\"{}\"]\n", idx, name));
        }

        for (to, _) in self.index_to_name.iter().enumerate() {
            let deps = self.dependencies_of(to);
            for from in deps {
                out.push_str(&format!("    t{} --> t{}\n", from, to));
            }
        }

        out
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for name in &self.index_to_name {
            out.push_str(&format!("    \"{}\";\n", name));
        }

        for (to, to_name) in self.index_to_name.iter().enumerate() {
            for from in self.dependencies_of(to) {
                out.push_str(&format!(
                    "    \"{}\" -> \"{}\";\n",
                    self.index_to_name[from], to_name
                ));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> Result<String, DagflowError> {
        let order = self.topological_order()?;
        let mut out = String::new();

        for (i, idx) in order.iter().enumerate() {
            let task = &pipeline.tasks()[*idx];
            let deps = self.dependencies(&task.name).unwrap_or_default();

            out.push_str(&format!("{}. {} ({})", i + 1, task.name, task.operation));

            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        Ok(out)
    }

    fn dependencies_of(&self, idx: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(idx), Direction::Incoming)
            .map(|n| self.graph[n])
            .collect();
        deps.sort_unstable();
        deps
    }
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}
