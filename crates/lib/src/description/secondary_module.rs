//! The secondary module derived from a prebuilt archive.
//!
//! A secondary module never builds anything. It points at an existing archive
//! and records it as its artifact, so consumers of the secondary module find the
//! file the same way they find any built output.
//!
//! Which archive it points at is decided by [`SELECTION_RULES`], tried in order;
//! the first rule that matches wins. When none match, the binary archive is used.

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::artifact::BuildableContext;
use crate::resolver::{BuildRuleResolver, RuleError};
use crate::rule::{BuildContext, Buildable, Step};
use crate::source_path::{SourcePath, filter_inputs_to_compare};

use super::prebuilt_archive::PrebuiltArchiveArg;

/// Which file the secondary module exposes and which declared inputs decide
/// whether it is stale. Unresolved: rule references are still references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSelection {
  pub output: SourcePath,
  pub inputs_to_compare: Vec<SourcePath>,
}

impl ArtifactSelection {
  pub fn resolve(self, resolver: &BuildRuleResolver) -> Result<CandidateResolution, RuleError> {
    Ok(CandidateResolution {
      output: self.output.resolve(resolver)?,
      inputs_to_compare: self.inputs_to_compare,
    })
  }
}

/// An [`ArtifactSelection`] whose output is a concrete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateResolution {
  pub output: PathBuf,
  pub inputs_to_compare: Vec<SourcePath>,
}

pub struct SelectionRule {
  pub name: &'static str,
  pub select: fn(&PrebuiltArchiveArg) -> Option<ArtifactSelection>,
}

/// Precedence of the secondary module's artifact sources.
pub const SELECTION_RULES: &[SelectionRule] = &[
  SelectionRule {
    name: "secondary_module",
    select: select_declared_secondary_module,
  },
  SelectionRule {
    name: "source_archive",
    select: select_source_archive,
  },
];

/// An explicit secondary module is both the output and the only tracked input.
fn select_declared_secondary_module(arg: &PrebuiltArchiveArg) -> Option<ArtifactSelection> {
  arg.secondary_module.as_ref().map(|module| ArtifactSelection {
    output: module.clone(),
    inputs_to_compare: vec![module.clone()],
  })
}

/// A source archive on disk cannot change during a build, so nothing is tracked.
fn select_source_archive(arg: &PrebuiltArchiveArg) -> Option<ArtifactSelection> {
  arg.source_archive.as_ref().map(|source| ArtifactSelection {
    output: SourcePath::Path(source.clone()),
    inputs_to_compare: Vec::new(),
  })
}

fn select_binary_archive(arg: &PrebuiltArchiveArg) -> ArtifactSelection {
  ArtifactSelection {
    output: SourcePath::Path(arg.binary_archive.clone()),
    inputs_to_compare: Vec::new(),
  }
}

pub fn select_secondary_module_artifact(arg: &PrebuiltArchiveArg) -> ArtifactSelection {
  for rule in SELECTION_RULES {
    if let Some(selection) = (rule.select)(arg) {
      trace!(rule = rule.name, output = %selection.output, "selected secondary module artifact");
      return selection;
    }
  }
  trace!(output = %arg.binary_archive.display(), "secondary module falls back to binary archive");
  select_binary_archive(arg)
}

/// Pass-through buildable exposing an existing archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryModule {
  output: PathBuf,
  inputs_to_compare: Vec<SourcePath>,
}

impl SecondaryModule {
  pub fn new(resolution: CandidateResolution) -> Self {
    Self {
      output: resolution.output,
      inputs_to_compare: resolution.inputs_to_compare,
    }
  }

  /// The candidate inputs before filtering.
  pub fn candidate_inputs(&self) -> &[SourcePath] {
    &self.inputs_to_compare
  }
}

impl Buildable for SecondaryModule {
  fn inputs_to_compare(&self) -> Vec<PathBuf> {
    filter_inputs_to_compare(&self.inputs_to_compare)
  }

  fn build_steps(&self, _context: &BuildContext, buildable_context: &dyn BuildableContext) -> Vec<Step> {
    buildable_context.record_artifact(self.path_to_output());
    Vec::new()
  }

  fn path_to_output(&self) -> &Path {
    &self.output
  }
}

/// Select, resolve and wrap the secondary module artifact for `arg`.
pub fn create_secondary_module(
  arg: &PrebuiltArchiveArg,
  resolver: &BuildRuleResolver,
) -> Result<SecondaryModule, RuleError> {
  let resolution = select_secondary_module_artifact(arg).resolve(resolver)?;
  Ok(SecondaryModule::new(resolution))
}
