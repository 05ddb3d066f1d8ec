//! Loading and configuring a project, shared by every command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use prebuild_lib::configure::{ConfigureContext, configure, load_rules_file};
use prebuild_lib::execute::default_parallelism;
use prebuild_lib::filesystem::ProjectFilesystem;
use prebuild_lib::paths::project_root;
use prebuild_lib::resolver::BuildRuleResolver;
use prebuild_lib::rule_key::DefaultRuleKeyBuilderFactory;

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
  /// Rules file, relative to the project root unless absolute
  #[arg(long, default_value = "rules.json")]
  pub rules: PathBuf,

  /// Project root (default: $PREBUILD_ROOT, then the current directory)
  #[arg(long)]
  pub root: Option<PathBuf>,
}

/// A configured project: every declared rule and its derived rules are indexed.
pub struct Project {
  pub root: PathBuf,
  pub resolver: Arc<BuildRuleResolver>,
}

pub async fn load_project(args: &ProjectArgs) -> Result<Project> {
  let root = project_root(args.root.as_deref()).context("Failed to determine project root")?;
  let rules_path = rules_path(&root, &args.rules);
  debug!(root = %root.display(), rules = %rules_path.display(), "loading project");

  let rules_file = load_rules_file(&rules_path)?;

  let filesystem = Arc::new(ProjectFilesystem::new(&root));
  let context = ConfigureContext {
    rule_key_builder_factory: Arc::new(DefaultRuleKeyBuilderFactory::new(filesystem.clone())),
    filesystem,
    parallelism: default_parallelism(),
  };
  let resolver = Arc::new(BuildRuleResolver::new());

  configure(rules_file.rules, &context, resolver.clone())
    .await
    .with_context(|| format!("Failed to configure rules from {}", rules_path.display()))?;

  Ok(Project { root, resolver })
}

fn rules_path(root: &Path, rules: &Path) -> PathBuf {
  if rules.is_absolute() {
    rules.to_path_buf()
  } else {
    root.join(rules)
  }
}
