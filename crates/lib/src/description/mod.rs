//! Rule descriptions: how declared arguments become rules.
//!
//! A [`Description`] turns a target's validated arguments into the buildable of its
//! primary rule. A [`FlavorableDescription`] additionally derives flavored rules
//! from an already constructed primary rule and registers them in the rule index.
//!
//! # Submodules
//!
//! - [`prebuilt_archive`] - the `prebuilt_archive` description and its arguments
//! - [`secondary_module`] - artifact selection and the derived secondary module

pub mod prebuilt_archive;
pub mod secondary_module;

use std::sync::Arc;

use crate::resolver::{BuildRuleResolver, RuleError};
use crate::rule::{BuildRule, BuildRuleParams, BuildRuleType, Buildable};

pub use prebuilt_archive::{PrebuiltArchive, PrebuiltArchiveArg, PrebuiltArchiveDescription};
pub use secondary_module::{
  ArtifactSelection, CandidateResolution, SecondaryModule, create_secondary_module, select_secondary_module_artifact,
};

pub trait Description: Send + Sync {
  type Arg;

  fn rule_type(&self) -> BuildRuleType;

  fn create_buildable(&self, params: &BuildRuleParams, arg: &Self::Arg) -> Box<dyn Buildable>;
}

pub trait FlavorableDescription: Description {
  /// Derive and index the flavored rules of `primary`, which must already be
  /// constructed from `arg`.
  fn register_flavors(
    &self,
    arg: &Self::Arg,
    primary: &Arc<BuildRule>,
    resolver: &BuildRuleResolver,
  ) -> Result<(), RuleError>;
}
