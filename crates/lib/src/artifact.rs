//! Artifact ledger: which files each rule produced during execution.
//!
//! Downstream consumers look artifacts up here whether a rule really built
//! something or merely points at a file that already exists.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::target::BuildTarget;

/// Lets a buildable record the artifacts it produces.
pub trait BuildableContext: Send + Sync {
  fn record_artifact(&self, path: &Path);
}

#[derive(Debug, Default)]
pub struct ArtifactLedger {
  artifacts: Mutex<BTreeMap<BuildTarget, Vec<PathBuf>>>,
}

impl ArtifactLedger {
  pub fn new() -> Self {
    Self::default()
  }

  /// A recording context bound to `target`.
  pub fn context_for<'a>(&'a self, target: &BuildTarget) -> RuleArtifacts<'a> {
    RuleArtifacts {
      ledger: self,
      target: target.clone(),
    }
  }

  pub fn record(&self, target: &BuildTarget, path: &Path) {
    debug!(target = %target, path = %path.display(), "recording artifact");
    let mut artifacts = self.artifacts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    artifacts.entry(target.clone()).or_default().push(path.to_path_buf());
  }

  pub fn artifacts_for(&self, target: &BuildTarget) -> Vec<PathBuf> {
    let artifacts = self.artifacts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    artifacts.get(target).cloned().unwrap_or_default()
  }

  /// A copy of every recorded artifact, ordered by target.
  pub fn snapshot(&self) -> BTreeMap<BuildTarget, Vec<PathBuf>> {
    self.artifacts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
  }
}

/// [`BuildableContext`] for a single rule.
pub struct RuleArtifacts<'a> {
  ledger: &'a ArtifactLedger,
  target: BuildTarget,
}

impl BuildableContext for RuleArtifacts<'_> {
  fn record_artifact(&self, path: &Path) {
    self.ledger.record(&self.target, path);
  }
}
