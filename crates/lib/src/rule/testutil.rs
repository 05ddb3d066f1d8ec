//! Rule fixtures shared by unit tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artifact::BuildableContext;
use crate::filesystem::ProjectFilesystem;
use crate::rule::{BuildContext, BuildRule, BuildRuleParams, BuildRuleType, Buildable, Step, Visibility};
use crate::rule_key::DefaultRuleKeyBuilderFactory;

/// Buildable with a fixed output and tracked inputs.
#[derive(Debug)]
pub struct FixedBuildable {
  pub output: PathBuf,
  pub inputs: Vec<PathBuf>,
}

impl Buildable for FixedBuildable {
  fn inputs_to_compare(&self) -> Vec<PathBuf> {
    self.inputs.clone()
  }

  fn build_steps(&self, _context: &BuildContext, buildable_context: &dyn BuildableContext) -> Vec<Step> {
    buildable_context.record_artifact(&self.output);
    Vec::new()
  }

  fn path_to_output(&self) -> &Path {
    &self.output
  }
}

pub fn params(root: &Path, target: &str, deps: Vec<Arc<BuildRule>>) -> BuildRuleParams {
  let filesystem = Arc::new(ProjectFilesystem::new(root));
  let factory = Arc::new(DefaultRuleKeyBuilderFactory::new(filesystem.clone()));
  BuildRuleParams::new(target.parse().unwrap(), deps, Visibility::Public, filesystem, factory)
}

pub fn fixed_rule(root: &Path, target: &str, output: &str, deps: Vec<Arc<BuildRule>>) -> Arc<BuildRule> {
  Arc::new(BuildRule::new(
    BuildRuleType::prebuilt_archive(),
    params(root, target, deps),
    Box::new(FixedBuildable {
      output: PathBuf::from(output),
      inputs: Vec::new(),
    }),
  ))
}
