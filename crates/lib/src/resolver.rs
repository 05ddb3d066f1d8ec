//! The shared rule index.
//!
//! Every configured rule, primary or derived, is indexed by its target. Many targets
//! are configured concurrently against one [`BuildRuleResolver`], so insertion is an
//! atomic check-then-insert on a sharded concurrent map: a target is bound at most
//! once and never silently rebound to a different rule.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tracing::trace;

use crate::rule::BuildRule;
use crate::target::{BuildTarget, TargetError};

/// Configuration-time errors. All of them are fatal to configuration.
#[derive(Debug, Error)]
pub enum RuleError {
  #[error(
    "flavor {derived} derived from {conflicting} conflicts with the rule already derived from {existing}"
  )]
  DuplicateFlavor {
    derived: BuildTarget,
    existing: BuildTarget,
    conflicting: BuildTarget,
  },

  #[error("rule {target} is declared more than once")]
  DuplicateRule { target: BuildTarget },

  #[error("cannot resolve artifact reference {reference}: {reason}")]
  UnresolvedArtifactReference { reference: String, reason: String },

  #[error("rule {target} depends on unknown rule {dep}")]
  UnknownDependency { target: BuildTarget, dep: BuildTarget },

  #[error("dependency cycle detected among {}", join_targets(.targets))]
  DependencyCycle { targets: Vec<BuildTarget> },

  #[error("invalid target: {0}")]
  InvalidTarget(#[from] TargetError),
}

fn join_targets(targets: &[BuildTarget]) -> String {
  targets.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// A target already bound to a rule that is not equivalent to the one offered.
#[derive(Debug, Error)]
#[error("{target} is already bound to a different rule")]
pub struct IndexConflict {
  pub target: BuildTarget,
  pub existing: Arc<BuildRule>,
  pub rejected: Arc<BuildRule>,
}

/// Outcome of a successful [`BuildRuleResolver::add_to_index`].
#[derive(Debug, Clone)]
pub enum Registration {
  /// The rule is now indexed.
  Inserted(Arc<BuildRule>),
  /// An equivalent rule was already indexed; it is kept and returned.
  AlreadyPresent(Arc<BuildRule>),
}

impl Registration {
  pub fn rule(&self) -> &Arc<BuildRule> {
    match self {
      Registration::Inserted(rule) | Registration::AlreadyPresent(rule) => rule,
    }
  }
}

#[derive(Debug, Clone, Copy)]
enum OnConflict {
  Keep,
  Unbind,
}

#[derive(Debug, Default)]
pub struct BuildRuleResolver {
  index: DashMap<BuildTarget, Arc<BuildRule>>,
}

impl BuildRuleResolver {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, target: &BuildTarget) -> Option<Arc<BuildRule>> {
    self.index.get(target).map(|entry| entry.value().clone())
  }

  pub fn contains(&self, target: &BuildTarget) -> bool {
    self.index.contains_key(target)
  }

  pub fn len(&self) -> usize {
    self.index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.index.is_empty()
  }

  /// Bind `rule` to its target.
  ///
  /// Re-adding the same or an equivalent rule is a no-op. Offering a different rule
  /// for a bound target fails and leaves the existing binding untouched.
  pub fn add_to_index(&self, rule: Arc<BuildRule>) -> Result<Registration, IndexConflict> {
    self.insert(rule, OnConflict::Keep)
  }

  /// Like [`add_to_index`](Self::add_to_index), except that a conflict also unbinds
  /// the existing rule: afterwards neither rule is indexed under the target.
  ///
  /// Check and removal happen under the same entry lock.
  pub fn add_to_index_or_unbind(&self, rule: Arc<BuildRule>) -> Result<Registration, IndexConflict> {
    self.insert(rule, OnConflict::Unbind)
  }

  fn insert(&self, rule: Arc<BuildRule>, on_conflict: OnConflict) -> Result<Registration, IndexConflict> {
    match self.index.entry(rule.target().clone()) {
      Entry::Vacant(vacant) => {
        trace!(target = %rule.target(), "indexed rule");
        vacant.insert(rule.clone());
        Ok(Registration::Inserted(rule))
      }
      Entry::Occupied(occupied) => {
        let existing = occupied.get();
        if Arc::ptr_eq(existing, &rule) || existing.is_equivalent(&rule) {
          trace!(target = %rule.target(), "equivalent rule already indexed");
          return Ok(Registration::AlreadyPresent(existing.clone()));
        }

        let existing = match on_conflict {
          OnConflict::Keep => occupied.get().clone(),
          OnConflict::Unbind => {
            trace!(target = %rule.target(), "unbinding conflicting rule");
            occupied.remove()
          }
        };
        Err(IndexConflict {
          target: rule.target().clone(),
          existing,
          rejected: rule,
        })
      }
    }
  }

  /// Every indexed rule, sorted by target.
  pub fn rules(&self) -> Vec<Arc<BuildRule>> {
    let mut rules: Vec<Arc<BuildRule>> = self.index.iter().map(|entry| entry.value().clone()).collect();
    rules.sort_by(|a, b| a.target().cmp(b.target()));
    rules
  }
}
