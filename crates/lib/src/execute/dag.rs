//! Execution DAG for rule dependency management.
//!
//! This module provides a directed acyclic graph (DAG) over every indexed rule
//! and computes parallel execution waves.

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::resolver::BuildRuleResolver;
use crate::target::BuildTarget;

use super::types::ExecuteError;

/// A DAG representing rule dependencies for execution planning.
///
/// Edges point from a dependency to its dependent.
pub struct ExecutionDag {
  graph: DiGraph<BuildTarget, ()>,
  nodes: HashMap<BuildTarget, NodeIndex>,
}

impl ExecutionDag {
  /// Build an execution DAG from every rule in `resolver`.
  ///
  /// # Errors
  ///
  /// Returns `MissingDependency` if a rule depends on a rule that is not indexed,
  /// and `CycleDetected` if the dependencies form a cycle.
  pub fn from_resolver(resolver: &BuildRuleResolver) -> Result<Self, ExecuteError> {
    let rules = resolver.rules();
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for rule in &rules {
      let idx = graph.add_node(rule.target().clone());
      nodes.insert(rule.target().clone(), idx);
    }

    for rule in &rules {
      let dependent_idx = nodes[rule.target()];
      for dep in rule.deps() {
        let Some(&dep_idx) = nodes.get(dep.target()) else {
          return Err(ExecuteError::MissingDependency {
            target: rule.target().clone(),
            dep: dep.target().clone(),
          });
        };
        graph.add_edge(dep_idx, dependent_idx, ());
      }
    }

    let dag = Self { graph, nodes };
    dag.verify_acyclic()?;
    Ok(dag)
  }

  fn verify_acyclic(&self) -> Result<(), ExecuteError> {
    toposort(&self.graph, None).map_err(|_| ExecuteError::CycleDetected)?;
    Ok(())
  }

  /// Get rules organized into parallel execution waves.
  ///
  /// Each wave contains rules whose dependencies are all in previous waves.
  /// Rules within a wave are sorted by target.
  pub fn waves(&self) -> Result<Vec<Vec<BuildTarget>>, ExecuteError> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let mut ready: Vec<NodeIndex> = remaining.iter().filter(|&&idx| in_degree[&idx] == 0).copied().collect();

      if ready.is_empty() {
        return Err(ExecuteError::CycleDetected);
      }

      for &idx in &ready {
        remaining.remove(&idx);
        for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&neighbor) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      ready.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
      waves.push(ready.into_iter().map(|idx| self.graph[idx].clone()).collect());
    }

    Ok(waves)
  }

  /// Get the direct dependencies of a rule.
  pub fn dependencies(&self, target: &BuildTarget) -> Vec<BuildTarget> {
    let Some(&idx) = self.nodes.get(target) else {
      return Vec::new();
    };

    let mut deps: Vec<BuildTarget> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep_idx| self.graph[dep_idx].clone())
      .collect();
    deps.sort();
    deps
  }

  /// Get the number of rules in the DAG.
  pub fn rule_count(&self) -> usize {
    self.nodes.len()
  }
}
