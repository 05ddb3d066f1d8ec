use std::path::Path;
use std::sync::Arc;

use prebuild_lib::configure::ConfigureError;
use prebuild_lib::description::{FlavorableDescription, PrebuiltArchiveArg, PrebuiltArchiveDescription};
use prebuild_lib::resolver::RuleError;
use prebuild_lib::rule::BuildRuleType;

use super::common::{TestProject, target};

const THREE_ARCHIVES: &str = r#"{
  "rules": [
    {
      "type": "prebuilt_archive",
      "name": "//lib:foo",
      "binary_archive": "/lib/foo.archive",
      "source_archive": "/lib/foo-src.archive",
      "secondary_module": "/lib/foo-secondary.archive"
    },
    {
      "type": "prebuilt_archive",
      "name": "//lib:bar",
      "binary_archive": "/lib/bar.archive",
      "source_archive": "/lib/bar-src.archive"
    },
    {
      "type": "prebuilt_archive",
      "name": "//lib:baz",
      "binary_archive": "/lib/baz.archive",
      "docs_url": "https://docs.example.com/baz"
    }
  ]
}"#;

#[tokio::test]
async fn every_prebuilt_archive_gets_exactly_one_secondary_module() {
  let project = TestProject::new();
  project.configure_json(THREE_ARCHIVES).await.unwrap();

  assert_eq!(project.resolver.len(), 6);
  for name in ["//lib:foo", "//lib:bar", "//lib:baz"] {
    let primary = project.resolver.get(&target(name)).unwrap();
    let derived = project
      .resolver
      .get(&target(&format!("{}#secondary-module", name)))
      .unwrap();

    assert_eq!(derived.rule_type(), &BuildRuleType::secondary_module());
    assert_eq!(derived.deps().len(), 1);
    assert!(Arc::ptr_eq(&derived.deps()[0], &primary));
  }
}

#[tokio::test]
async fn secondary_module_artifacts_follow_precedence() {
  let project = TestProject::new();
  project.configure_json(THREE_ARCHIVES).await.unwrap();

  let output = |name: &str| {
    project
      .resolver
      .get(&target(name))
      .unwrap()
      .path_to_output()
      .to_path_buf()
  };
  let compared = |name: &str| {
    project
      .resolver
      .get(&target(name))
      .unwrap()
      .buildable()
      .inputs_to_compare()
  };

  assert_eq!(output("//lib:foo#secondary-module"), Path::new("/lib/foo-secondary.archive"));
  assert_eq!(
    compared("//lib:foo#secondary-module"),
    vec![Path::new("/lib/foo-secondary.archive").to_path_buf()]
  );
  assert_eq!(output("//lib:bar#secondary-module"), Path::new("/lib/bar-src.archive"));
  assert!(compared("//lib:bar#secondary-module").is_empty());
  assert_eq!(output("//lib:baz#secondary-module"), Path::new("/lib/baz.archive"));
  assert!(compared("//lib:baz#secondary-module").is_empty());
}

#[tokio::test]
async fn configuring_twice_leaves_index_unchanged() {
  let project = TestProject::new();
  project.configure_json(THREE_ARCHIVES).await.unwrap();
  let before: Vec<_> = project.resolver.rules();

  project.configure_json(THREE_ARCHIVES).await.unwrap();
  let after: Vec<_> = project.resolver.rules();

  assert_eq!(before.len(), after.len());
  for (a, b) in before.iter().zip(&after) {
    assert!(Arc::ptr_eq(a, b));
  }
}

#[tokio::test]
async fn conflicting_secondary_module_is_a_duplicate_flavor() {
  let project = TestProject::new();
  project
    .configure_json(
      r#"{ "rules": [ { "type": "prebuilt_archive", "name": "//lib:foo", "binary_archive": "/lib/foo.archive" } ] }"#,
    )
    .await
    .unwrap();

  // A second primary for the same target whose derivation disagrees.
  let other = TestProject::new();
  other
    .configure_json(
      r#"{ "rules": [ { "type": "prebuilt_archive", "name": "//lib:foo", "binary_archive": "/lib/foo.archive", "source_archive": "/lib/foo-src.archive" } ] }"#,
    )
    .await
    .unwrap();
  let primary = other.resolver.get(&target("//lib:foo")).unwrap();
  let arg: PrebuiltArchiveArg =
    serde_json::from_str(r#"{ "binary_archive": "/lib/foo.archive", "source_archive": "/lib/foo-src.archive" }"#)
      .unwrap();
  let err = PrebuiltArchiveDescription
    .register_flavors(&arg, &primary, &project.resolver)
    .unwrap_err();

  match err {
    RuleError::DuplicateFlavor {
      derived,
      existing,
      conflicting,
    } => {
      assert_eq!(derived, target("//lib:foo#secondary-module"));
      assert_eq!(existing, target("//lib:foo"));
      assert_eq!(conflicting, target("//lib:foo"));
    }
    other => panic!("expected DuplicateFlavor, got {:?}", other),
  }
  assert!(project.resolver.get(&target("//lib:foo#secondary-module")).is_none());
}

#[tokio::test]
async fn secondary_module_may_reference_another_rule() {
  let project = TestProject::new();
  project
    .configure_json(
      r#"{
        "rules": [
          {
            "type": "prebuilt_archive",
            "name": "//lib:foo",
            "binary_archive": "lib/foo.archive",
            "secondary_module": "//gen:module"
          },
          { "type": "prebuilt_archive", "name": "//gen:module", "binary_archive": "gen/module.archive" }
        ]
      }"#,
    )
    .await
    .unwrap();

  let derived = project.resolver.get(&target("//lib:foo#secondary-module")).unwrap();
  assert_eq!(derived.path_to_output(), Path::new("gen/module.archive"));
  assert!(derived.buildable().inputs_to_compare().is_empty());
}

#[tokio::test]
async fn declaring_a_flavored_name_is_rejected() {
  let project = TestProject::new();
  let err = project
    .configure_json(
      r#"{ "rules": [ { "type": "prebuilt_archive", "name": "//lib:foo#secondary-module", "binary_archive": "lib/foo.archive" } ] }"#,
    )
    .await
    .unwrap_err();

  assert!(matches!(err, ConfigureError::FlavoredDeclaration { .. }));
  assert!(project.resolver.is_empty());
}
