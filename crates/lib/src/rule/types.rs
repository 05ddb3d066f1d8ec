use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::filesystem::ProjectFilesystem;
use crate::rule_key::{RuleKey, RuleKeyBuilderFactory, RuleKeyError};
use crate::target::BuildTarget;

use super::buildable::Buildable;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildRuleType(pub String);

impl BuildRuleType {
  pub const PREBUILT_ARCHIVE: &'static str = "prebuilt_archive";
  pub const SECONDARY_MODULE: &'static str = "secondary_module";

  pub fn prebuilt_archive() -> Self {
    Self(Self::PREBUILT_ARCHIVE.to_string())
  }

  pub fn secondary_module() -> Self {
    Self(Self::SECONDARY_MODULE.to_string())
  }
}

impl fmt::Display for BuildRuleType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Who may depend on a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Visibility {
  #[default]
  Public,
  /// Target patterns such as `//lib/...` or `//app:main`.
  Patterns(Vec<String>),
}

impl Visibility {
  /// `PUBLIC` anywhere in the list makes the rule public.
  pub fn from_patterns(patterns: Vec<String>) -> Self {
    if patterns.is_empty() || patterns.iter().any(|p| p == "PUBLIC") {
      Visibility::Public
    } else {
      Visibility::Patterns(patterns)
    }
  }
}

/// Identity, dependencies and ambient configuration of a rule.
#[derive(Clone)]
pub struct BuildRuleParams {
  target: BuildTarget,
  deps: Vec<Arc<BuildRule>>,
  visibility: Visibility,
  filesystem: Arc<ProjectFilesystem>,
  rule_key_builder_factory: Arc<dyn RuleKeyBuilderFactory>,
}

impl BuildRuleParams {
  pub fn new(
    target: BuildTarget,
    mut deps: Vec<Arc<BuildRule>>,
    visibility: Visibility,
    filesystem: Arc<ProjectFilesystem>,
    rule_key_builder_factory: Arc<dyn RuleKeyBuilderFactory>,
  ) -> Self {
    deps.sort_by(|a, b| a.target().cmp(b.target()));
    deps.dedup_by(|a, b| a.target() == b.target());
    Self {
      target,
      deps,
      visibility,
      filesystem,
      rule_key_builder_factory,
    }
  }

  /// Parameters for another rule sharing this rule's visibility, filesystem
  /// and rule key factory.
  pub fn copy_with_changes(&self, target: BuildTarget, deps: Vec<Arc<BuildRule>>) -> Self {
    Self::new(
      target,
      deps,
      self.visibility.clone(),
      self.filesystem.clone(),
      self.rule_key_builder_factory.clone(),
    )
  }

  pub fn target(&self) -> &BuildTarget {
    &self.target
  }

  pub fn deps(&self) -> &[Arc<BuildRule>] {
    &self.deps
  }

  pub fn visibility(&self) -> &Visibility {
    &self.visibility
  }

  pub fn filesystem(&self) -> &Arc<ProjectFilesystem> {
    &self.filesystem
  }

  pub fn rule_key_builder_factory(&self) -> &Arc<dyn RuleKeyBuilderFactory> {
    &self.rule_key_builder_factory
  }
}

impl fmt::Debug for BuildRuleParams {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let deps: Vec<String> = self.deps.iter().map(|d| d.target().to_string()).collect();
    f.debug_struct("BuildRuleParams")
      .field("target", &self.target.to_string())
      .field("deps", &deps)
      .field("visibility", &self.visibility)
      .finish_non_exhaustive()
  }
}

#[derive(Debug)]
pub struct BuildRule {
  rule_type: BuildRuleType,
  params: BuildRuleParams,
  buildable: Box<dyn Buildable>,
  rule_key: OnceLock<RuleKey>,
}

impl BuildRule {
  pub fn new(rule_type: BuildRuleType, params: BuildRuleParams, buildable: Box<dyn Buildable>) -> Self {
    Self {
      rule_type,
      params,
      buildable,
      rule_key: OnceLock::new(),
    }
  }

  pub fn rule_type(&self) -> &BuildRuleType {
    &self.rule_type
  }

  pub fn target(&self) -> &BuildTarget {
    self.params.target()
  }

  pub fn deps(&self) -> &[Arc<BuildRule>] {
    self.params.deps()
  }

  pub fn params(&self) -> &BuildRuleParams {
    &self.params
  }

  pub fn buildable(&self) -> &dyn Buildable {
    self.buildable.as_ref()
  }

  pub fn path_to_output(&self) -> &Path {
    self.buildable.path_to_output()
  }

  /// The rule's key, computed on first use.
  ///
  /// Covers the rule type, target, every dependency's key (sorted by target),
  /// the content of every tracked input, then the buildable's own details.
  pub fn rule_key(&self) -> Result<RuleKey, RuleKeyError> {
    if let Some(key) = self.rule_key.get() {
      return Ok(key.clone());
    }

    let mut builder = self
      .params
      .rule_key_builder_factory()
      .new_builder()
      .set("type", &self.rule_type)
      .set("target", self.target());

    for dep in self.deps() {
      builder = builder.set(&format!("dep:{}", dep.target()), dep.rule_key()?);
    }

    for input in self.buildable.inputs_to_compare() {
      builder = builder.set_input("input", &input)?;
    }

    let key = self.buildable.append_details_to_rule_key(builder).build()?;
    Ok(self.rule_key.get_or_init(|| key).clone())
  }

  /// Whether `other` describes the same rule: same type, target, visibility,
  /// dependency targets, output path, tracked inputs and rule key details.
  pub fn is_equivalent(&self, other: &BuildRule) -> bool {
    self.rule_type == other.rule_type
      && self.target() == other.target()
      && self.params.visibility() == other.params.visibility()
      && self.deps().len() == other.deps().len()
      && self
        .deps()
        .iter()
        .zip(other.deps())
        .all(|(a, b)| a.target() == b.target())
      && self.path_to_output() == other.path_to_output()
      && self.buildable.inputs_to_compare() == other.buildable.inputs_to_compare()
      && self.detail_entries() == other.detail_entries()
  }

  /// Entries the buildable adds to the rule key on top of the common ones.
  fn detail_entries(&self) -> Vec<(String, String)> {
    let builder = self.params.rule_key_builder_factory().new_builder();
    self.buildable.append_details_to_rule_key(builder).entries().to_vec()
  }
}
