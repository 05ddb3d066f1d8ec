//! Shared test helpers for library integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use prebuild_lib::configure::{ConfigureContext, ConfigureError, RuleDeclaration, RulesFile, configure};
use prebuild_lib::filesystem::ProjectFilesystem;
use prebuild_lib::resolver::BuildRuleResolver;
use prebuild_lib::rule_key::DefaultRuleKeyBuilderFactory;
use prebuild_lib::target::BuildTarget;
use tempfile::TempDir;

/// Isolated project: a temporary root plus a fresh rule index.
pub struct TestProject {
  pub temp: TempDir,
  pub context: ConfigureContext,
  pub resolver: Arc<BuildRuleResolver>,
}

impl TestProject {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let filesystem = Arc::new(ProjectFilesystem::new(temp.path()));
    let context = ConfigureContext {
      rule_key_builder_factory: Arc::new(DefaultRuleKeyBuilderFactory::new(filesystem.clone())),
      filesystem,
      parallelism: 4,
    };
    Self {
      temp,
      context,
      resolver: Arc::new(BuildRuleResolver::new()),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the project root.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.root().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub async fn configure_json(&self, rules_json: &str) -> Result<(), ConfigureError> {
    let file: RulesFile = serde_json::from_str(rules_json).unwrap();
    self.configure(file.rules).await
  }

  pub async fn configure(&self, rules: Vec<RuleDeclaration>) -> Result<(), ConfigureError> {
    configure(rules, &self.context, self.resolver.clone()).await
  }
}

pub fn target(name: &str) -> BuildTarget {
  name.parse().unwrap()
}
