//! Types for rule execution.
//!
//! This module defines the error types, result types, and configuration
//! for executing the rules held by a [`BuildRuleResolver`](crate::resolver::BuildRuleResolver).

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use crate::consts::PARALLELISM_ENV;
use crate::rule::StepError;
use crate::rule_key::{RuleKey, RuleKeyError};
use crate::target::BuildTarget;

use super::cache::CacheError;

/// Errors that can occur during rule execution.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// Cycle detected in the dependency graph.
  #[error("dependency cycle detected")]
  CycleDetected,

  /// A rule depends on a rule that was never indexed.
  #[error("rule {target} depends on {dep}, which is not indexed")]
  MissingDependency { target: BuildTarget, dep: BuildTarget },

  /// The rule key could not be computed, usually because an input is unreadable.
  #[error("failed to compute rule key for {target}: {source}")]
  RuleKey {
    target: BuildTarget,
    #[source]
    source: RuleKeyError,
  },

  /// A build step failed.
  #[error("step '{step}' failed for {target}: {source}")]
  Step {
    target: BuildTarget,
    step: String,
    #[source]
    source: StepError,
  },

  #[error("rule key cache error: {0}")]
  Cache(#[from] CacheError),

  /// A spawned execution task panicked or was cancelled.
  #[error("execution task failed: {0}")]
  Task(String),
}

/// How a single rule was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
  /// Steps ran and artifacts were recorded.
  Built { rule_key: RuleKey },
  /// The cached key matched and the output exists; nothing ran.
  UpToDate { rule_key: RuleKey },
}

impl RuleOutcome {
  pub fn rule_key(&self) -> &RuleKey {
    match self {
      RuleOutcome::Built { rule_key } | RuleOutcome::UpToDate { rule_key } => rule_key,
    }
  }
}

/// Result of executing every indexed rule.
#[derive(Debug, Default)]
pub struct ExecutionResult {
  /// Rules whose steps ran.
  pub built: BTreeMap<BuildTarget, RuleKey>,

  /// Rules skipped because their cached key still matched.
  pub up_to_date: BTreeMap<BuildTarget, RuleKey>,

  /// Rules that failed.
  pub failed: BTreeMap<BuildTarget, ExecuteError>,

  /// Rules that were not attempted because a dependency failed.
  /// Maps skipped target -> the failed dependency.
  pub skipped: BTreeMap<BuildTarget, BuildTarget>,

  /// Output path of every rule that succeeded.
  pub outputs: BTreeMap<BuildTarget, PathBuf>,
}

impl ExecutionResult {
  /// Returns true if no rule failed or was skipped.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.skipped.is_empty()
  }

  /// Returns the total number of rules processed.
  pub fn total(&self) -> usize {
    self.built.len() + self.up_to_date.len() + self.failed.len() + self.skipped.len()
  }
}

/// Configuration for rule execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of rules to execute in parallel.
  pub parallelism: usize,
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self {
      parallelism: default_parallelism(),
    }
  }
}

/// `PREBUILD_PARALLELISM` if set to a positive integer, otherwise the number of CPUs.
pub fn default_parallelism() -> usize {
  if let Ok(value) = std::env::var(PARALLELISM_ENV) {
    match value.trim().parse::<usize>() {
      Ok(n) if n > 0 => return n,
      _ => warn!(value = %value, "ignoring invalid {}", PARALLELISM_ENV),
    }
  }
  num_cpus()
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
