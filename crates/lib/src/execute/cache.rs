//! Persisted rule keys from the last successful build of each rule.
//!
//! # Storage Layout
//!
//! ```text
//! {project_root}/.prebuild/
//! └── rule_keys.json      # RuleKeyCache: version + target -> rule key
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::RULE_KEY_CACHE_VERSION;
use crate::rule_key::RuleKey;
use crate::target::BuildTarget;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("failed to read rule key cache: {0}")]
  Read(#[source] io::Error),

  #[error("failed to parse rule key cache: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize rule key cache: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write rule key cache: {0}")]
  Write(#[source] io::Error),

  #[error("failed to create state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("unsupported rule key cache version {0}")]
  UnsupportedVersion(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleKeyCache {
  pub version: u32,
  #[serde(default)]
  pub keys: BTreeMap<BuildTarget, RuleKey>,
}

impl Default for RuleKeyCache {
  fn default() -> Self {
    Self::new()
  }
}

impl RuleKeyCache {
  pub fn new() -> Self {
    Self {
      version: RULE_KEY_CACHE_VERSION,
      keys: BTreeMap::new(),
    }
  }

  /// Load the cache at `path`.
  ///
  /// Returns an empty cache if the file doesn't exist.
  pub fn load(path: &Path) -> Result<Self, CacheError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
      Err(e) => return Err(CacheError::Read(e)),
    };

    let cache: RuleKeyCache = serde_json::from_str(&content).map_err(CacheError::Parse)?;
    if cache.version != RULE_KEY_CACHE_VERSION {
      return Err(CacheError::UnsupportedVersion(cache.version));
    }

    debug!(path = %path.display(), entries = cache.keys.len(), "loaded rule key cache");
    Ok(cache)
  }

  /// Save the cache to `path`.
  ///
  /// Uses atomic write (write to temp, then rename) to prevent corruption.
  pub fn save(&self, path: &Path) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(CacheError::CreateDir)?;
    }

    let temp_path = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(self).map_err(CacheError::Serialize)?;
    fs::write(&temp_path, &content).map_err(CacheError::Write)?;
    fs::rename(&temp_path, path).map_err(CacheError::Write)?;

    debug!(path = %path.display(), entries = self.keys.len(), "saved rule key cache");
    Ok(())
  }

  pub fn get(&self, target: &BuildTarget) -> Option<&RuleKey> {
    self.keys.get(target)
  }

  pub fn insert(&mut self, target: BuildTarget, key: RuleKey) {
    self.keys.insert(target, key);
  }

  /// Drop entries for targets that are no longer indexed.
  pub fn retain_targets<'a>(&mut self, live: impl IntoIterator<Item = &'a BuildTarget>) {
    let live: std::collections::BTreeSet<&BuildTarget> = live.into_iter().collect();
    self.keys.retain(|target, _| live.contains(target));
  }
}
