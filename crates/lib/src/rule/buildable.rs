//! The capability set every rule's buildable provides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::artifact::BuildableContext;
use crate::filesystem::ProjectFilesystem;
use crate::rule_key::RuleKeyBuilder;

/// What a rule tracks, what it runs and what it produces.
pub trait Buildable: Send + Sync + fmt::Debug {
  /// Inputs whose content decides whether the output is stale.
  fn inputs_to_compare(&self) -> Vec<PathBuf>;

  /// Steps to run when the rule is built. Called once per build execution;
  /// implementations record their artifacts through `buildable_context`.
  fn build_steps(&self, context: &BuildContext, buildable_context: &dyn BuildableContext) -> Vec<Step>;

  /// Extra rule key entries beyond type, target, dependencies and inputs.
  fn append_details_to_rule_key(&self, builder: RuleKeyBuilder) -> RuleKeyBuilder {
    builder
  }

  fn path_to_output(&self) -> &Path;
}

/// Execution-phase context handed to buildables and steps.
#[derive(Debug, Clone)]
pub struct BuildContext {
  filesystem: Arc<ProjectFilesystem>,
}

impl BuildContext {
  pub fn new(filesystem: Arc<ProjectFilesystem>) -> Self {
    Self { filesystem }
  }

  pub fn filesystem(&self) -> &ProjectFilesystem {
    &self.filesystem
  }
}

#[derive(Debug, Error)]
pub enum StepError {
  #[error("expected file does not exist: {}", path.display())]
  MissingFile { path: PathBuf },
}

/// A unit of work run by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
  /// Fails unless `path` exists in the project.
  VerifyExists { path: PathBuf },
}

impl Step {
  pub fn execute(&self, context: &BuildContext) -> Result<(), StepError> {
    match self {
      Step::VerifyExists { path } => {
        if context.filesystem().exists(path) {
          Ok(())
        } else {
          Err(StepError::MissingFile {
            path: context.filesystem().resolve(path),
          })
        }
      }
    }
  }

  pub fn description(&self) -> String {
    match self {
      Step::VerifyExists { path } => format!("verify {}", path.display()),
    }
  }
}
