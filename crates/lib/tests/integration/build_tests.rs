use std::path::PathBuf;
use std::sync::Arc;

use prebuild_lib::artifact::ArtifactLedger;
use prebuild_lib::execute::{ExecuteConfig, ExecuteError, RuleKeyCache, execute_rules};
use prebuild_lib::paths::rule_key_cache_path;

use super::common::{TestProject, target};

const RULES: &str = r#"{
  "rules": [
    {
      "type": "prebuilt_archive",
      "name": "//lib:foo",
      "binary_archive": "lib/foo.archive",
      "source_archive": "lib/foo-src.archive"
    },
    {
      "type": "prebuilt_archive",
      "name": "//app:main",
      "binary_archive": "app/main.archive",
      "deps": ["//lib:foo"]
    }
  ]
}"#;

fn config() -> ExecuteConfig {
  ExecuteConfig { parallelism: 2 }
}

#[tokio::test]
async fn build_records_one_artifact_per_secondary_module() {
  let project = TestProject::new();
  project.write_file("lib/foo.archive", "binary");
  project.write_file("lib/foo-src.archive", "source");
  project.write_file("app/main.archive", "binary");
  project.configure_json(RULES).await.unwrap();

  let ledger = Arc::new(ArtifactLedger::new());
  let mut cache = RuleKeyCache::new();
  let result = execute_rules(&project.resolver, ledger.clone(), &mut cache, &config())
    .await
    .unwrap();

  assert!(result.is_success());
  assert_eq!(result.built.len(), 4);
  assert_eq!(
    ledger.artifacts_for(&target("//lib:foo#secondary-module")),
    vec![PathBuf::from("lib/foo-src.archive")]
  );
  assert_eq!(
    ledger.artifacts_for(&target("//app:main#secondary-module")),
    vec![PathBuf::from("app/main.archive")]
  );
  assert_eq!(
    ledger.artifacts_for(&target("//lib:foo")),
    vec![PathBuf::from("lib/foo.archive")]
  );
}

#[tokio::test]
async fn persisted_cache_makes_second_build_up_to_date() {
  let project = TestProject::new();
  project.write_file("lib/foo.archive", "binary");
  project.write_file("lib/foo-src.archive", "source");
  project.write_file("app/main.archive", "binary");
  project.configure_json(RULES).await.unwrap();
  let cache_path = rule_key_cache_path(project.root());

  let mut cache = RuleKeyCache::load(&cache_path).unwrap();
  execute_rules(&project.resolver, Arc::new(ArtifactLedger::new()), &mut cache, &config())
    .await
    .unwrap();
  cache.save(&cache_path).unwrap();

  let mut reloaded = RuleKeyCache::load(&cache_path).unwrap();
  let second = execute_rules(&project.resolver, Arc::new(ArtifactLedger::new()), &mut reloaded, &config())
    .await
    .unwrap();

  assert!(second.built.is_empty());
  assert_eq!(second.up_to_date.len(), 4);
}

#[tokio::test]
async fn changed_binary_archive_rebuilds_everything_downstream() {
  let project = TestProject::new();
  project.write_file("lib/foo.archive", "binary");
  project.write_file("lib/foo-src.archive", "source");
  project.write_file("app/main.archive", "binary");
  project.configure_json(RULES).await.unwrap();
  let mut cache = RuleKeyCache::new();
  execute_rules(&project.resolver, Arc::new(ArtifactLedger::new()), &mut cache, &config())
    .await
    .unwrap();

  // Rule keys are memoized per rule object, so changes are picked up by a fresh
  // configuration.
  let fresh = TestProject {
    temp: project.temp,
    context: project.context.clone(),
    resolver: Arc::new(prebuild_lib::resolver::BuildRuleResolver::new()),
  };
  fresh.context.filesystem.invalidate_hashes();
  fresh.write_file("lib/foo.archive", "changed binary");
  fresh.configure_json(RULES).await.unwrap();
  let second = execute_rules(&fresh.resolver, Arc::new(ArtifactLedger::new()), &mut cache, &config())
    .await
    .unwrap();

  // Every key covers its dependencies' keys, so the change reaches all four rules.
  assert_eq!(second.built.len(), 4);
  assert!(second.up_to_date.is_empty());
}

#[tokio::test]
async fn missing_binary_archive_fails_and_skips_secondary_module() {
  let project = TestProject::new();
  project.write_file("lib/foo-src.archive", "source");
  project.write_file("app/main.archive", "binary");
  project.configure_json(RULES).await.unwrap();

  let result = execute_rules(
    &project.resolver,
    Arc::new(ArtifactLedger::new()),
    &mut RuleKeyCache::new(),
    &config(),
  )
  .await
  .unwrap();

  assert!(matches!(
    result.failed.get(&target("//lib:foo")),
    Some(ExecuteError::RuleKey { .. })
  ));
  assert_eq!(
    result.skipped.get(&target("//lib:foo#secondary-module")),
    Some(&target("//lib:foo"))
  );
  assert_eq!(result.skipped.get(&target("//app:main")), Some(&target("//lib:foo")));
  assert_eq!(
    result.skipped.get(&target("//app:main#secondary-module")),
    Some(&target("//app:main"))
  );
}
