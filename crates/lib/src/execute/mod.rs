//! Rule execution module.
//!
//! This module provides the entry point for executing every rule held by a
//! [`BuildRuleResolver`]. It handles:
//! - DAG-based dependency ordering
//! - Parallel execution of independent rules
//! - Rule-key based up-to-date checks
//! - Failure propagation and skip tracking

pub mod cache;
pub mod dag;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::artifact::ArtifactLedger;
use crate::resolver::BuildRuleResolver;
use crate::rule::{BuildContext, BuildRule};
use crate::rule_key::RuleKey;
use crate::target::BuildTarget;

pub use cache::{CacheError, RuleKeyCache};
pub use dag::ExecutionDag;
pub use types::{ExecuteConfig, ExecuteError, ExecutionResult, RuleOutcome, default_parallelism};

/// Execute every indexed rule.
///
/// This is the main entry point for rule execution. It:
/// 1. Constructs a DAG from the resolver
/// 2. Computes parallel execution waves
/// 3. Executes rules wave by wave, with parallelism within each wave
/// 4. Tracks failures and skips dependent rules
///
/// A rule whose key matches the one in `cache` and whose output exists is up to
/// date: its steps don't run and it records no artifacts. Every rule that builds
/// has its new key stored in `cache`; persisting the cache is up to the caller.
pub async fn execute_rules(
  resolver: &BuildRuleResolver,
  ledger: Arc<ArtifactLedger>,
  cache: &mut RuleKeyCache,
  config: &ExecuteConfig,
) -> Result<ExecutionResult, ExecuteError> {
  info!(rule_count = resolver.len(), "starting rule execution");

  let dag = ExecutionDag::from_resolver(resolver)?;
  let waves = dag.waves()?;

  info!(wave_count = waves.len(), "computed execution waves");

  let mut result = ExecutionResult::default();
  let mut failed_rules: HashSet<BuildTarget> = HashSet::new();
  let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));

  for (wave_idx, wave) in waves.iter().enumerate() {
    debug!(wave = wave_idx, rules = wave.len(), "executing wave");

    let mut ready_rules = Vec::new();

    for target in wave {
      let failed_dep = dag.dependencies(target).into_iter().find(|dep| failed_rules.contains(dep));

      if let Some(failed_dep) = failed_dep {
        warn!(
          target = %target,
          failed_dep = %failed_dep,
          "skipping rule due to failed dependency"
        );
        failed_rules.insert(target.clone());
        result.skipped.insert(target.clone(), failed_dep);
        continue;
      }

      match resolver.get(target) {
        Some(rule) => ready_rules.push(rule),
        None => warn!(target = %target, "rule disappeared from the index"),
      }
    }

    if ready_rules.is_empty() {
      continue;
    }

    let wave_results = execute_wave(ready_rules, &ledger, cache, semaphore.clone()).await;

    for (rule, outcome) in wave_results {
      let target = rule.target().clone();
      match outcome {
        Ok(RuleOutcome::Built { rule_key }) => {
          info!(target = %target, "rule built");
          cache.insert(target.clone(), rule_key.clone());
          result.outputs.insert(target.clone(), rule.path_to_output().to_path_buf());
          result.built.insert(target, rule_key);
        }
        Ok(RuleOutcome::UpToDate { rule_key }) => {
          debug!(target = %target, "rule up to date");
          result.outputs.insert(target.clone(), rule.path_to_output().to_path_buf());
          result.up_to_date.insert(target, rule_key);
        }
        Err(e) => {
          error!(target = %target, error = %e, "rule failed");
          failed_rules.insert(target.clone());
          result.failed.insert(target, e);
        }
      }
    }
  }

  info!(
    built = result.built.len(),
    up_to_date = result.up_to_date.len(),
    failed = result.failed.len(),
    skipped = result.skipped.len(),
    "rule execution complete"
  );

  Ok(result)
}

/// Execute a wave of independent rules in parallel.
async fn execute_wave(
  rules: Vec<Arc<BuildRule>>,
  ledger: &Arc<ArtifactLedger>,
  cache: &RuleKeyCache,
  semaphore: Arc<Semaphore>,
) -> Vec<(Arc<BuildRule>, Result<RuleOutcome, ExecuteError>)> {
  let mut join_set = JoinSet::new();

  for rule in rules {
    let ledger = ledger.clone();
    let previous = cache.get(rule.target()).cloned();
    let semaphore = semaphore.clone();

    join_set.spawn(async move {
      let outcome = match semaphore.acquire_owned().await {
        Ok(_permit) => {
          let task_rule = rule.clone();
          tokio::task::spawn_blocking(move || execute_rule(&task_rule, &ledger, previous.as_ref()))
            .await
            .unwrap_or_else(|e| Err(ExecuteError::Task(e.to_string())))
        }
        Err(e) => Err(ExecuteError::Task(e.to_string())),
      };
      (rule, outcome)
    });
  }

  let mut results = Vec::new();

  while let Some(join_result) = join_set.join_next().await {
    match join_result {
      Ok(result) => results.push(result),
      Err(e) => error!(error = %e, "rule task panicked"),
    }
  }

  results.sort_by(|(a, _), (b, _)| a.target().cmp(b.target()));
  results
}

/// Execute a single rule whose dependencies have already been executed.
pub fn execute_rule(
  rule: &BuildRule,
  ledger: &ArtifactLedger,
  previous: Option<&RuleKey>,
) -> Result<RuleOutcome, ExecuteError> {
  let target = rule.target();
  let rule_key = rule.rule_key().map_err(|source| ExecuteError::RuleKey {
    target: target.clone(),
    source,
  })?;

  let filesystem = rule.params().filesystem();
  if previous == Some(&rule_key) && filesystem.exists(rule.path_to_output()) {
    return Ok(RuleOutcome::UpToDate { rule_key });
  }

  let context = BuildContext::new(filesystem.clone());
  let steps = rule.buildable().build_steps(&context, &ledger.context_for(target));
  debug!(target = %target, rule_key = %rule_key, steps = steps.len(), "building rule");

  for step in &steps {
    debug!(target = %target, step = %step.description(), "running step");
    step.execute(&context).map_err(|source| ExecuteError::Step {
      target: target.clone(),
      step: step.description(),
      source,
    })?;
  }

  Ok(RuleOutcome::Built { rule_key })
}
