//! `prebuilt_archive`: an archive checked into the project rather than built.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artifact::BuildableContext;
use crate::flavor::FlavorRegistrar;
use crate::resolver::{BuildRuleResolver, RuleError};
use crate::rule::{BuildContext, BuildRule, BuildRuleParams, BuildRuleType, Buildable, Step};
use crate::rule_key::RuleKeyBuilder;
use crate::source_path::SourcePath;
use crate::target::{BuildTarget, Flavor};

use super::secondary_module::create_secondary_module;
use super::{Description, FlavorableDescription};

/// Declared arguments of a `prebuilt_archive` target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrebuiltArchiveArg {
  pub binary_archive: PathBuf,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source_archive: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub secondary_module: Option<SourcePath>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docs_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deps: Option<BTreeSet<BuildTarget>>,
}

impl PrebuiltArchiveArg {
  /// Rules that must be configured and built before this one: declared
  /// dependencies plus the rule behind a referenced secondary module.
  pub fn dependency_targets(&self) -> BTreeSet<BuildTarget> {
    let mut targets = self.deps.clone().unwrap_or_default();
    if let Some(target) = self.secondary_module.as_ref().and_then(SourcePath::target) {
      targets.insert(target.clone());
    }
    targets
  }
}

/// Primary buildable of a prebuilt archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrebuiltArchive {
  binary_archive: PathBuf,
  source_archive: Option<PathBuf>,
  docs_url: Option<String>,
}

impl PrebuiltArchive {
  pub fn source_archive(&self) -> Option<&Path> {
    self.source_archive.as_deref()
  }

  pub fn docs_url(&self) -> Option<&str> {
    self.docs_url.as_deref()
  }
}

impl Buildable for PrebuiltArchive {
  fn inputs_to_compare(&self) -> Vec<PathBuf> {
    let mut inputs = vec![self.binary_archive.clone()];
    inputs.extend(self.source_archive.clone());
    inputs
  }

  fn build_steps(&self, _context: &BuildContext, buildable_context: &dyn BuildableContext) -> Vec<Step> {
    buildable_context.record_artifact(&self.binary_archive);
    vec![Step::VerifyExists {
      path: self.binary_archive.clone(),
    }]
  }

  fn append_details_to_rule_key(&self, builder: RuleKeyBuilder) -> RuleKeyBuilder {
    builder.set_optional("docs_url", self.docs_url.as_deref())
  }

  fn path_to_output(&self) -> &Path {
    &self.binary_archive
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PrebuiltArchiveDescription;

impl Description for PrebuiltArchiveDescription {
  type Arg = PrebuiltArchiveArg;

  fn rule_type(&self) -> BuildRuleType {
    BuildRuleType::prebuilt_archive()
  }

  fn create_buildable(&self, _params: &BuildRuleParams, arg: &PrebuiltArchiveArg) -> Box<dyn Buildable> {
    Box::new(PrebuiltArchive {
      binary_archive: arg.binary_archive.clone(),
      source_archive: arg.source_archive.clone(),
      docs_url: arg.docs_url.clone(),
    })
  }
}

impl FlavorableDescription for PrebuiltArchiveDescription {
  fn register_flavors(
    &self,
    arg: &PrebuiltArchiveArg,
    primary: &Arc<BuildRule>,
    resolver: &BuildRuleResolver,
  ) -> Result<(), RuleError> {
    FlavorRegistrar::new(resolver).register(
      primary,
      Flavor::secondary_module(),
      BuildRuleType::secondary_module(),
      || Ok(Box::new(create_secondary_module(arg, resolver)?)),
    )?;
    Ok(())
  }
}
