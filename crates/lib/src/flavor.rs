//! Registration of flavored rules derived from a primary rule.
//!
//! Registration walks a fixed sequence of stages and either reaches
//! [`RegistrationStage::Indexed`] or fails; there is no partial state to roll back.
//!
//! 1. derive the flavored target from the primary target
//! 2. construct the derived buildable
//! 3. wire the derived rule to depend on exactly the primary rule
//! 4. index the derived rule

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::resolver::{BuildRuleResolver, IndexConflict, Registration, RuleError};
use crate::rule::{BuildRule, BuildRuleType, Buildable};
use crate::target::{BuildTarget, Flavor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
  Unregistered,
  DerivedTargetComputed,
  BuildableConstructed,
  DependencyWired,
  Indexed,
}

impl fmt::Display for RegistrationStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      RegistrationStage::Unregistered => "unregistered",
      RegistrationStage::DerivedTargetComputed => "derived-target-computed",
      RegistrationStage::BuildableConstructed => "buildable-constructed",
      RegistrationStage::DependencyWired => "dependency-wired",
      RegistrationStage::Indexed => "indexed",
    };
    f.write_str(name)
  }
}

pub struct FlavorRegistrar<'a> {
  resolver: &'a BuildRuleResolver,
}

impl<'a> FlavorRegistrar<'a> {
  pub fn new(resolver: &'a BuildRuleResolver) -> Self {
    Self { resolver }
  }

  /// Derive `primary`'s `flavor` rule and index it.
  ///
  /// Registering an equivalent derived rule again is a no-op. A derived target
  /// already bound to a different rule fails with [`RuleError::DuplicateFlavor`]
  /// and unbinds the existing rule, so neither rule is indexed under that target.
  pub fn register<F>(
    &self,
    primary: &Arc<BuildRule>,
    flavor: Flavor,
    rule_type: BuildRuleType,
    create_buildable: F,
  ) -> Result<Registration, RuleError>
  where
    F: FnOnce() -> Result<Box<dyn Buildable>, RuleError>,
  {
    let primary_target = primary.target();
    debug!(target = %primary_target, flavor = %flavor, stage = %RegistrationStage::Unregistered, "registering flavor");

    let derived = primary_target.with_flavor(flavor);
    debug!(target = %derived, stage = %RegistrationStage::DerivedTargetComputed, "registering flavor");

    let buildable = create_buildable()?;
    debug!(target = %derived, output = %buildable.path_to_output().display(), stage = %RegistrationStage::BuildableConstructed, "registering flavor");

    let params = primary.params().copy_with_changes(derived.clone(), vec![primary.clone()]);
    let rule = Arc::new(BuildRule::new(rule_type, params, buildable));
    debug!(target = %derived, dep = %primary_target, stage = %RegistrationStage::DependencyWired, "registering flavor");

    let registration = self
      .resolver
      .add_to_index_or_unbind(rule)
      .map_err(|conflict| duplicate_flavor(primary_target, conflict))?;
    debug!(target = %derived, stage = %RegistrationStage::Indexed, "registered flavor");

    Ok(registration)
  }
}

/// The primary a conflicting rule was derived from; rules with no dependency
/// (declared directly under a flavored name) stand for themselves.
fn derived_from(rule: &BuildRule) -> &BuildTarget {
  match rule.deps() {
    [primary] => primary.target(),
    _ => rule.target(),
  }
}

fn duplicate_flavor(conflicting: &BuildTarget, conflict: IndexConflict) -> RuleError {
  RuleError::DuplicateFlavor {
    derived: conflict.target,
    existing: derived_from(&conflict.existing).clone(),
    conflicting: conflicting.clone(),
  }
}
