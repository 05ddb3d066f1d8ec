//! Configuration: turning declared rules into indexed rule objects.
//!
//! Declarations are ordered by their dependencies and configured wave by wave.
//! Targets within a wave are independent, so they are configured concurrently
//! against the shared [`BuildRuleResolver`]. Each task constructs its primary rule,
//! indexes it, then registers the rule's flavors.
//!
//! # Rules file
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "type": "prebuilt_archive",
//!       "name": "//lib:foo",
//!       "binary_archive": "lib/foo.archive",
//!       "secondary_module": "lib/foo-secondary.archive",
//!       "deps": ["//lib:bar"]
//!     }
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::description::{Description, FlavorableDescription, PrebuiltArchiveArg, PrebuiltArchiveDescription};
use crate::filesystem::ProjectFilesystem;
use crate::resolver::{BuildRuleResolver, RuleError};
use crate::rule::{BuildRule, BuildRuleParams, BuildRuleType, Visibility};
use crate::rule_key::RuleKeyBuilderFactory;
use crate::target::BuildTarget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesFile {
  pub rules: Vec<RuleDeclaration>,
}

/// One declared rule: its identity plus the arguments of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeclaration {
  #[serde(rename = "type")]
  pub rule_type: String,
  pub name: BuildTarget,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub visibility: Vec<String>,
  #[serde(flatten)]
  pub arg: PrebuiltArchiveArg,
}

#[derive(Debug, Error)]
pub enum ConfigureError {
  #[error("failed to read rules file {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse rules file {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("rule {target} has unsupported type '{rule_type}'")]
  UnsupportedRuleType { target: BuildTarget, rule_type: String },

  #[error("rule {target} is declared with flavors; flavored rules are derived, not declared")]
  FlavoredDeclaration { target: BuildTarget },

  #[error(transparent)]
  Rule(#[from] RuleError),

  #[error("configuration task failed: {0}")]
  Task(String),
}

/// Ambient configuration shared by every rule configured in one pass.
#[derive(Debug, Clone)]
pub struct ConfigureContext {
  pub filesystem: Arc<ProjectFilesystem>,
  pub rule_key_builder_factory: Arc<dyn RuleKeyBuilderFactory>,
  pub parallelism: usize,
}

pub fn load_rules_file(path: &Path) -> Result<RulesFile, ConfigureError> {
  let content = fs::read_to_string(path).map_err(|source| ConfigureError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  serde_json::from_str(&content).map_err(|source| ConfigureError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

/// Configure `rules` into `resolver`.
///
/// The first failure aborts configuration. Configuring the same declarations
/// into the same index again is a no-op.
pub async fn configure(
  rules: Vec<RuleDeclaration>,
  context: &ConfigureContext,
  resolver: Arc<BuildRuleResolver>,
) -> Result<(), ConfigureError> {
  info!(rule_count = rules.len(), "configuring rules");

  let declarations = validate(rules)?;
  let waves = configuration_waves(&declarations)?;
  debug!(wave_count = waves.len(), "computed configuration waves");

  let declarations = Arc::new(declarations);
  let semaphore = Arc::new(Semaphore::new(context.parallelism.max(1)));

  for (wave_idx, wave) in waves.into_iter().enumerate() {
    debug!(wave = wave_idx, rules = wave.len(), "configuring wave");
    let mut join_set = JoinSet::new();

    for target in wave {
      let declarations = declarations.clone();
      let context = context.clone();
      let resolver = resolver.clone();
      let semaphore = semaphore.clone();

      join_set.spawn(async move {
        let _permit = semaphore
          .acquire_owned()
          .await
          .map_err(|e| ConfigureError::Task(e.to_string()))?;
        let declaration = declarations
          .get(&target)
          .ok_or_else(|| ConfigureError::Task(format!("missing declaration for {}", target)))?;
        configure_rule(declaration, &context, &resolver).map(|_| ())
      });
    }

    while let Some(joined) = join_set.join_next().await {
      joined.map_err(|e| ConfigureError::Task(e.to_string()))??;
    }
  }

  info!(indexed = resolver.len(), "configuration complete");
  Ok(())
}

/// Construct, index and flavor a single declared rule. Its dependencies must
/// already be indexed.
pub fn configure_rule(
  declaration: &RuleDeclaration,
  context: &ConfigureContext,
  resolver: &BuildRuleResolver,
) -> Result<Arc<BuildRule>, ConfigureError> {
  let description = PrebuiltArchiveDescription;
  let target = &declaration.name;

  let deps = declaration
    .arg
    .dependency_targets()
    .into_iter()
    .map(|dep| {
      resolver.get(&dep).ok_or_else(|| RuleError::UnknownDependency {
        target: target.clone(),
        dep,
      })
    })
    .collect::<Result<Vec<_>, _>>()?;

  let params = BuildRuleParams::new(
    target.clone(),
    deps,
    Visibility::from_patterns(declaration.visibility.clone()),
    context.filesystem.clone(),
    context.rule_key_builder_factory.clone(),
  );
  let buildable = description.create_buildable(&params, &declaration.arg);
  let rule = Arc::new(BuildRule::new(description.rule_type(), params, buildable));

  let primary = resolver
    .add_to_index(rule)
    .map_err(|conflict| RuleError::DuplicateRule { target: conflict.target })?
    .rule()
    .clone();
  debug!(target = %target, output = %primary.path_to_output().display(), "configured rule");

  description.register_flavors(&declaration.arg, &primary, resolver)?;
  Ok(primary)
}

fn validate(rules: Vec<RuleDeclaration>) -> Result<HashMap<BuildTarget, RuleDeclaration>, ConfigureError> {
  let mut declarations = HashMap::with_capacity(rules.len());

  for rule in rules {
    if rule.rule_type != BuildRuleType::PREBUILT_ARCHIVE {
      return Err(ConfigureError::UnsupportedRuleType {
        target: rule.name,
        rule_type: rule.rule_type,
      });
    }
    if rule.name.is_flavored() {
      return Err(ConfigureError::FlavoredDeclaration { target: rule.name });
    }
    if declarations.contains_key(&rule.name) {
      return Err(RuleError::DuplicateRule { target: rule.name }.into());
    }
    declarations.insert(rule.name.clone(), rule);
  }

  for declaration in declarations.values() {
    for dep in declaration.arg.dependency_targets() {
      if !declarations.contains_key(&dep) {
        return Err(
          RuleError::UnknownDependency {
            target: declaration.name.clone(),
            dep,
          }
          .into(),
        );
      }
    }
  }

  Ok(declarations)
}

/// Group declarations into waves whose dependencies all lie in earlier waves.
fn configuration_waves(
  declarations: &HashMap<BuildTarget, RuleDeclaration>,
) -> Result<Vec<Vec<BuildTarget>>, RuleError> {
  let mut graph: DiGraph<BuildTarget, ()> = DiGraph::new();
  let mut nodes: HashMap<BuildTarget, NodeIndex> = HashMap::new();

  let mut targets: Vec<&BuildTarget> = declarations.keys().collect();
  targets.sort();
  for target in targets {
    nodes.insert(target.clone(), graph.add_node(target.clone()));
  }

  for declaration in declarations.values() {
    let dependent = nodes[&declaration.name];
    for dep in declaration.arg.dependency_targets() {
      if let Some(&dep_idx) = nodes.get(&dep) {
        graph.add_edge(dep_idx, dependent, ());
      }
    }
  }

  let mut in_degree: HashMap<NodeIndex, usize> = graph
    .node_indices()
    .map(|idx| (idx, graph.neighbors_directed(idx, Direction::Incoming).count()))
    .collect();
  let mut remaining: HashSet<NodeIndex> = graph.node_indices().collect();
  let mut waves = Vec::new();

  while !remaining.is_empty() {
    let mut ready: Vec<NodeIndex> = remaining.iter().filter(|idx| in_degree[idx] == 0).copied().collect();

    if ready.is_empty() {
      let mut targets: Vec<BuildTarget> = remaining.iter().map(|idx| graph[*idx].clone()).collect();
      targets.sort();
      return Err(RuleError::DependencyCycle { targets });
    }

    ready.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
    for idx in &ready {
      remaining.remove(idx);
      for neighbor in graph.neighbors_directed(*idx, Direction::Outgoing) {
        if let Some(degree) = in_degree.get_mut(&neighbor) {
          *degree = degree.saturating_sub(1);
        }
      }
    }

    waves.push(ready.into_iter().map(|idx| graph[idx].clone()).collect());
  }

  Ok(waves)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rule_key::DefaultRuleKeyBuilderFactory;
  use tempfile::tempdir;

  fn context(root: &Path) -> ConfigureContext {
    let filesystem = Arc::new(ProjectFilesystem::new(root));
    ConfigureContext {
      rule_key_builder_factory: Arc::new(DefaultRuleKeyBuilderFactory::new(filesystem.clone())),
      filesystem,
      parallelism: 4,
    }
  }

  fn declaration(name: &str, binary: &str) -> RuleDeclaration {
    RuleDeclaration {
      rule_type: BuildRuleType::PREBUILT_ARCHIVE.to_string(),
      name: name.parse().unwrap(),
      visibility: vec!["PUBLIC".to_string()],
      arg: PrebuiltArchiveArg {
        binary_archive: PathBuf::from(binary),
        source_archive: None,
        secondary_module: None,
        docs_url: None,
        deps: None,
      },
    }
  }

  fn target(name: &str) -> BuildTarget {
    name.parse().unwrap()
  }

  #[test]
  fn parses_rules_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("rules.json");
    fs::write(
      &path,
      r#"{
        "rules": [
          {
            "type": "prebuilt_archive",
            "name": "//lib:foo",
            "binary_archive": "lib/foo.archive",
            "source_archive": "lib/foo-src.archive",
            "deps": ["//lib:bar"]
          },
          { "type": "prebuilt_archive", "name": "//lib:bar", "binary_archive": "lib/bar.archive" }
        ]
      }"#,
    )
    .unwrap();

    let file = load_rules_file(&path).unwrap();

    assert_eq!(file.rules.len(), 2);
    assert_eq!(file.rules[0].name, target("//lib:foo"));
    assert_eq!(file.rules[0].arg.source_archive, Some(PathBuf::from("lib/foo-src.archive")));
    assert!(file.rules[1].visibility.is_empty());
  }

  #[test]
  fn missing_rules_file_is_a_read_error() {
    let temp = tempdir().unwrap();
    let result = load_rules_file(&temp.path().join("missing.json"));
    assert!(matches!(result, Err(ConfigureError::Read { .. })));
  }

  #[test]
  fn malformed_rules_file_is_a_parse_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("rules.json");
    fs::write(&path, r#"{ "rules": [ { "type": "prebuilt_archive" } ] }"#).unwrap();

    assert!(matches!(load_rules_file(&path), Err(ConfigureError::Parse { .. })));
  }

  #[tokio::test]
  async fn source_archive_derives_secondary_module_wired_to_primary() {
    let temp = tempdir().unwrap();
    let resolver = Arc::new(BuildRuleResolver::new());
    let mut bar = declaration("//lib:bar", "/lib/bar.archive");
    bar.arg.source_archive = Some(PathBuf::from("/lib/bar-src.archive"));

    configure(vec![bar], &context(temp.path()), resolver.clone()).await.unwrap();

    assert_eq!(resolver.len(), 2);
    let primary = resolver.get(&target("//lib:bar")).unwrap();
    let derived = resolver.get(&target("//lib:bar#secondary-module")).unwrap();
    assert_eq!(derived.rule_type(), &BuildRuleType::secondary_module());
    assert_eq!(derived.path_to_output(), Path::new("/lib/bar-src.archive"));
    assert!(derived.buildable().inputs_to_compare().is_empty());
    assert_eq!(derived.deps().len(), 1);
    assert!(Arc::ptr_eq(&derived.deps()[0], &primary));
  }

  #[tokio::test]
  async fn binary_archive_backs_secondary_module_without_other_sources() {
    let temp = tempdir().unwrap();
    let resolver = Arc::new(BuildRuleResolver::new());
    let mut baz = declaration("//lib:baz", "/lib/baz.archive");
    baz.arg.docs_url = Some("https://docs.example.com/baz".to_string());

    configure(vec![baz], &context(temp.path()), resolver.clone()).await.unwrap();

    let derived = resolver.get(&target("//lib:baz#secondary-module")).unwrap();
    assert_eq!(derived.path_to_output(), Path::new("/lib/baz.archive"));
    assert!(derived.buildable().inputs_to_compare().is_empty());
  }

  #[tokio::test]
  async fn reconfiguring_the_same_rules_is_a_no_op() {
    let temp = tempdir().unwrap();
    let resolver = Arc::new(BuildRuleResolver::new());
    let context = context(temp.path());
    let mut foo = declaration("//lib:foo", "lib/foo.archive");
    foo.arg.secondary_module = Some(crate::source_path::SourcePath::Path(PathBuf::from("lib/foo-mod.archive")));
    let rules = vec![foo, declaration("//lib:bar", "lib/bar.archive")];

    configure(rules.clone(), &context, resolver.clone()).await.unwrap();
    let derived = resolver.get(&target("//lib:foo#secondary-module")).unwrap();
    configure(rules, &context, resolver.clone()).await.unwrap();

    assert_eq!(resolver.len(), 4);
    assert!(Arc::ptr_eq(
      &resolver.get(&target("//lib:foo#secondary-module")).unwrap(),
      &derived
    ));
  }

  #[tokio::test]
  async fn referenced_secondary_module_is_configured_first() {
    let temp = tempdir().unwrap();
    let resolver = Arc::new(BuildRuleResolver::new());
    let mut foo = declaration("//lib:foo", "lib/foo.archive");
    foo.arg.secondary_module = Some("//gen:module".to_string().try_into().unwrap());
    let module = declaration("//gen:module", "gen/module.archive");

    configure(vec![foo, module], &context(temp.path()), resolver.clone())
      .await
      .unwrap();

    let derived = resolver.get(&target("//lib:foo#secondary-module")).unwrap();
    assert_eq!(derived.path_to_output(), Path::new("gen/module.archive"));
    assert!(derived.buildable().inputs_to_compare().is_empty());
    let primary = resolver.get(&target("//lib:foo")).unwrap();
    assert_eq!(primary.deps()[0].target(), &target("//gen:module"));
  }

  #[tokio::test]
  async fn duplicate_declarations_are_rejected() {
    let temp = tempdir().unwrap();
    let resolver = Arc::new(BuildRuleResolver::new());
    let rules = vec![
      declaration("//lib:foo", "lib/foo.archive"),
      declaration("//lib:foo", "lib/other.archive"),
    ];

    let err = configure(rules, &context(temp.path()), resolver.clone()).await.unwrap_err();

    assert!(matches!(err, ConfigureError::Rule(RuleError::DuplicateRule { .. })));
    assert!(resolver.is_empty());
  }

  #[tokio::test]
  async fn conflicting_reconfiguration_keeps_existing_rules() {
    let temp = tempdir().unwrap();
    let resolver = Arc::new(BuildRuleResolver::new());
    let context = context(temp.path());

    configure(vec![declaration("//lib:foo", "lib/foo.archive")], &context, resolver.clone())
      .await
      .unwrap();
    let err = configure(vec![declaration("//lib:foo", "lib/other.archive")], &context, resolver.clone())
      .await
      .unwrap_err();

    assert!(matches!(err, ConfigureError::Rule(RuleError::DuplicateRule { .. })));
    assert_eq!(
      resolver.get(&target("//lib:foo")).unwrap().path_to_output(),
      Path::new("lib/foo.archive")
    );
  }

  #[tokio::test]
  async fn changed_docs_url_is_a_duplicate_rule() {
    let temp = tempdir().unwrap();
    let resolver = Arc::new(BuildRuleResolver::new());
    let context = context(temp.path());
    let mut first = declaration("//lib:foo", "lib/foo.archive");
    first.arg.docs_url = Some("https://a.example.com".to_string());
    let mut second = first.clone();
    second.arg.docs_url = Some("https://b.example.com".to_string());

    configure(vec![first], &context, resolver.clone()).await.unwrap();
    let indexed = resolver.get(&target("//lib:foo")).unwrap();
    let err = configure(vec![second], &context, resolver.clone()).await.unwrap_err();

    assert!(matches!(err, ConfigureError::Rule(RuleError::DuplicateRule { .. })));
    assert!(Arc::ptr_eq(&resolver.get(&target("//lib:foo")).unwrap(), &indexed));
  }

  #[tokio::test]
  async fn changed_visibility_is_a_duplicate_rule() {
    let temp = tempdir().unwrap();
    let resolver = Arc::new(BuildRuleResolver::new());
    let context = context(temp.path());
    let first = declaration("//lib:foo", "lib/foo.archive");
    let mut second = first.clone();
    second.visibility = vec!["//app/...".to_string()];

    configure(vec![first], &context, resolver.clone()).await.unwrap();
    let err = configure(vec![second], &context, resolver.clone()).await.unwrap_err();

    assert!(matches!(err, ConfigureError::Rule(RuleError::DuplicateRule { .. })));
  }

  #[tokio::test]
  async fn unknown_dependency_is_rejected() {
    let temp = tempdir().unwrap();
    let mut foo = declaration("//lib:foo", "lib/foo.archive");
    foo.arg.deps = Some([target("//lib:missing")].into_iter().collect());

    let err = configure(vec![foo], &context(temp.path()), Arc::new(BuildRuleResolver::new()))
      .await
      .unwrap_err();

    match err {
      ConfigureError::Rule(RuleError::UnknownDependency { target: t, dep }) => {
        assert_eq!(t, target("//lib:foo"));
        assert_eq!(dep, target("//lib:missing"));
      }
      other => panic!("expected UnknownDependency, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn dependency_cycle_is_rejected() {
    let temp = tempdir().unwrap();
    let mut a = declaration("//lib:a", "lib/a.archive");
    a.arg.deps = Some([target("//lib:b")].into_iter().collect());
    let mut b = declaration("//lib:b", "lib/b.archive");
    b.arg.deps = Some([target("//lib:a")].into_iter().collect());

    let err = configure(vec![a, b], &context(temp.path()), Arc::new(BuildRuleResolver::new()))
      .await
      .unwrap_err();

    match err {
      ConfigureError::Rule(RuleError::DependencyCycle { targets }) => {
        assert_eq!(targets, vec![target("//lib:a"), target("//lib:b")]);
      }
      other => panic!("expected DependencyCycle, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn flavored_declaration_is_rejected() {
    let temp = tempdir().unwrap();
    let rules = vec![declaration("//lib:foo#secondary-module", "lib/foo.archive")];

    let err = configure(rules, &context(temp.path()), Arc::new(BuildRuleResolver::new()))
      .await
      .unwrap_err();

    assert!(matches!(err, ConfigureError::FlavoredDeclaration { .. }));
  }

  #[tokio::test]
  async fn unsupported_rule_type_is_rejected() {
    let temp = tempdir().unwrap();
    let mut rule = declaration("//lib:foo", "lib/foo.archive");
    rule.rule_type = "genrule".to_string();

    let err = configure(vec![rule], &context(temp.path()), Arc::new(BuildRuleResolver::new()))
      .await
      .unwrap_err();

    assert!(matches!(err, ConfigureError::UnsupportedRuleType { .. }));
  }

  #[test]
  fn waves_follow_dependencies() {
    let mut foo = declaration("//lib:foo", "lib/foo.archive");
    foo.arg.deps = Some([target("//lib:bar")].into_iter().collect());
    let declarations = validate(vec![
      foo,
      declaration("//lib:bar", "lib/bar.archive"),
      declaration("//lib:baz", "lib/baz.archive"),
    ])
    .unwrap();

    let waves = configuration_waves(&declarations).unwrap();

    assert_eq!(
      waves,
      vec![
        vec![target("//lib:bar"), target("//lib:baz")],
        vec![target("//lib:foo")]
      ]
    );
  }
}
