//! Implementation of the `prebuild plan` command.
//!
//! Configures the project and lists every indexed rule, derived rules included,
//! without building anything.

use anyhow::{Context, Result};
use serde::Serialize;

use prebuild_lib::rule::BuildRule;

use crate::output::{self, OutputFormat, print_info, print_json, print_stat, print_success, truncate_hash};

use super::project::{ProjectArgs, load_project};

#[derive(Debug, Serialize)]
struct PlannedRule {
  target: String,
  rule_type: String,
  deps: Vec<String>,
  output: String,
  inputs_to_compare: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  rule_key: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  rule_key_error: Option<String>,
}

impl PlannedRule {
  fn from_rule(rule: &BuildRule) -> Self {
    let (rule_key, rule_key_error) = match rule.rule_key() {
      Ok(key) => (Some(key.0), None),
      Err(e) => (None, Some(e.to_string())),
    };
    Self {
      target: rule.target().to_string(),
      rule_type: rule.rule_type().to_string(),
      deps: rule.deps().iter().map(|dep| dep.target().to_string()).collect(),
      output: rule.path_to_output().display().to_string(),
      inputs_to_compare: rule
        .buildable()
        .inputs_to_compare()
        .iter()
        .map(|path| path.display().to_string())
        .collect(),
      rule_key,
      rule_key_error,
    }
  }
}

pub fn cmd_plan(args: &ProjectArgs, verbose: bool, format: OutputFormat) -> Result<()> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let project = rt.block_on(load_project(args))?;

  let planned: Vec<PlannedRule> = project
    .resolver
    .rules()
    .iter()
    .map(|rule| PlannedRule::from_rule(rule))
    .collect();

  if format.is_json() {
    print_json(&serde_json::json!({ "root": project.root, "rules": planned }))?;
    return Ok(());
  }

  print_success(&format!("Configured {} rule(s)", planned.len()));
  print_stat("Root", &project.root.display().to_string());

  for rule in &planned {
    println!();
    print_info(&format!("{} ({})", rule.target, rule.rule_type));
    print_stat("Output", &rule.output);
    if !rule.deps.is_empty() {
      print_stat("Deps", &rule.deps.join(", "));
    }
    if verbose {
      if !rule.inputs_to_compare.is_empty() {
        print_stat("Inputs", &rule.inputs_to_compare.join(", "));
      }
      match (&rule.rule_key, &rule.rule_key_error) {
        (Some(key), _) => print_stat("Key", truncate_hash(key)),
        (None, Some(err)) => print_stat("Key", &format!("{} {}", output::symbols::WARNING, err)),
        (None, None) => {}
      }
    }
  }

  Ok(())
}
