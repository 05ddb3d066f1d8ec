//! References to files: either a literal project path or another rule's output.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resolver::{BuildRuleResolver, RuleError};
use crate::target::{BuildTarget, TargetError};

/// A file a rule consumes.
///
/// In declarations, strings starting with `//` name another rule's output,
/// anything else is a path relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourcePath {
  Path(PathBuf),
  Target(BuildTarget),
}

impl SourcePath {
  /// The rule producing this file, if any.
  pub fn target(&self) -> Option<&BuildTarget> {
    match self {
      SourcePath::Path(_) => None,
      SourcePath::Target(target) => Some(target),
    }
  }

  /// The concrete path of this file.
  ///
  /// Rule references resolve to the referenced rule's output, which must already
  /// be indexed.
  pub fn resolve(&self, resolver: &BuildRuleResolver) -> Result<PathBuf, RuleError> {
    match self {
      SourcePath::Path(path) => Ok(path.clone()),
      SourcePath::Target(target) => resolver
        .get(target)
        .map(|rule| rule.path_to_output().to_path_buf())
        .ok_or_else(|| RuleError::UnresolvedArtifactReference {
          reference: target.to_string(),
          reason: "no rule with this target is configured".to_string(),
        }),
    }
  }
}

impl fmt::Display for SourcePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SourcePath::Path(path) => write!(f, "{}", path.display()),
      SourcePath::Target(target) => write!(f, "{}", target),
    }
  }
}

impl TryFrom<String> for SourcePath {
  type Error = TargetError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    if value.starts_with("//") {
      Ok(SourcePath::Target(value.parse()?))
    } else {
      Ok(SourcePath::Path(PathBuf::from(value)))
    }
  }
}

impl From<SourcePath> for String {
  fn from(source: SourcePath) -> Self {
    source.to_string()
  }
}

/// The subset of `inputs` whose content is compared directly: literal paths,
/// sorted and de-duplicated. Outputs of other rules are covered by those rules'
/// keys instead.
pub fn filter_inputs_to_compare<'a>(inputs: impl IntoIterator<Item = &'a SourcePath>) -> Vec<PathBuf> {
  let mut paths: Vec<PathBuf> = inputs
    .into_iter()
    .filter_map(|input| match input {
      SourcePath::Path(path) => Some(path.clone()),
      SourcePath::Target(_) => None,
    })
    .collect();
  paths.sort();
  paths.dedup();
  paths
}
