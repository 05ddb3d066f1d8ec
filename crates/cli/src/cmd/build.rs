//! Implementation of the `prebuild build` command.
//!
//! Configures the project, executes every rule whose key changed, persists the
//! rule key cache and reports each rule's outcome plus the recorded artifacts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use tracing::info;

use prebuild_lib::artifact::ArtifactLedger;
use prebuild_lib::execute::{ExecuteConfig, ExecutionResult, RuleKeyCache, execute_rules};
use prebuild_lib::paths::rule_key_cache_path;

use crate::output::{
  self, OutputFormat, format_duration, print_error, print_info, print_json, print_stat, print_success, print_warning,
};

use super::project::{ProjectArgs, load_project};

pub fn cmd_build(args: &ProjectArgs, verbose: bool, format: OutputFormat) -> Result<()> {
  let started = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let project = rt.block_on(load_project(args))?;

  let cache_path = rule_key_cache_path(&project.root);
  let mut cache = RuleKeyCache::load(&cache_path).context("Failed to load rule key cache")?;

  let ledger = Arc::new(ArtifactLedger::new());
  let config = ExecuteConfig::default();
  let result = rt
    .block_on(execute_rules(&project.resolver, ledger.clone(), &mut cache, &config))
    .context("Build failed")?;

  let live: Vec<_> = project.resolver.rules().iter().map(|rule| rule.target().clone()).collect();
  cache.retain_targets(&live);
  cache.save(&cache_path).context("Failed to save rule key cache")?;
  info!(path = %cache_path.display(), "rule key cache saved");

  let elapsed = started.elapsed();
  let artifacts = ledger.snapshot();

  if format.is_json() {
    print_json(&build_json(&result, &artifacts, elapsed.as_millis()))?;
  } else {
    print_summary(&result, &artifacts, verbose, &format_duration(elapsed));
  }

  if !result.is_success() {
    bail!(
      "{} rule(s) failed, {} rule(s) skipped",
      result.failed.len(),
      result.skipped.len()
    );
  }

  Ok(())
}

fn build_json(
  result: &ExecutionResult,
  artifacts: &BTreeMap<prebuild_lib::target::BuildTarget, Vec<std::path::PathBuf>>,
  duration_ms: u128,
) -> serde_json::Value {
  let failed: BTreeMap<String, String> = result
    .failed
    .iter()
    .map(|(target, err)| (target.to_string(), err.to_string()))
    .collect();

  serde_json::json!({
    "built": result.built,
    "up_to_date": result.up_to_date,
    "failed": failed,
    "skipped": result.skipped,
    "artifacts": artifacts,
    "duration_ms": duration_ms,
  })
}

fn print_summary(
  result: &ExecutionResult,
  artifacts: &BTreeMap<prebuild_lib::target::BuildTarget, Vec<std::path::PathBuf>>,
  verbose: bool,
  elapsed: &str,
) {
  for target in result.built.keys() {
    print_success(&format!("built {}", target));
  }
  if verbose {
    for target in result.up_to_date.keys() {
      print_info(&format!("up to date {}", target));
    }
  }
  for (target, err) in &result.failed {
    print_error(&format!("failed {}: {}", target, err));
  }
  for (target, dep) in &result.skipped {
    print_warning(&format!("skipped {} (dependency {} failed)", target, dep));
  }

  if !artifacts.is_empty() {
    println!();
    println!("Artifacts:");
    for (target, paths) in artifacts {
      for path in paths {
        println!("  {} {} {}", target, output::symbols::ARROW, path.display());
      }
    }
  }

  println!();
  print_stat("Built", &result.built.len().to_string());
  print_stat("Up to date", &result.up_to_date.len().to_string());
  print_stat("Failed", &result.failed.len().to_string());
  print_stat("Skipped", &result.skipped.len().to_string());
  print_stat("Time", elapsed);
}
