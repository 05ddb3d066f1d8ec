//! Rule keys: fingerprints deciding whether a rule's output is up to date.
//!
//! A rule key is the SHA-256 of an ordered list of `(key, value)` entries. Tracked
//! inputs contribute their content hash, dependencies contribute their own rule
//! key, so a change anywhere below a rule changes its key.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filesystem::FileHashLoader;
use crate::util::hash::{FileHashError, hash_serialized};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleKey(pub String);

impl fmt::Display for RuleKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Error)]
pub enum RuleKeyError {
  #[error("cannot fingerprint input {key}: {source}")]
  Input {
    key: String,
    #[source]
    source: FileHashError,
  },

  #[error("cannot serialize rule key entries: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// Accumulates the entries of one rule key.
pub struct RuleKeyBuilder {
  hashes: Arc<dyn FileHashLoader>,
  entries: Vec<(String, String)>,
}

impl RuleKeyBuilder {
  pub fn new(hashes: Arc<dyn FileHashLoader>) -> Self {
    Self {
      hashes,
      entries: Vec::new(),
    }
  }

  pub fn set(mut self, key: &str, value: impl fmt::Display) -> Self {
    self.entries.push((key.to_string(), value.to_string()));
    self
  }

  /// Records `value` when present; absence is recorded too so that
  /// `Some("")` and `None` hash differently.
  pub fn set_optional(self, key: &str, value: Option<impl fmt::Display>) -> Self {
    match value {
      Some(value) => self.set(key, value),
      None => self.set(key, "<absent>"),
    }
  }

  /// Records the path and the content hash of an input file.
  pub fn set_input(self, key: &str, path: &Path) -> Result<Self, RuleKeyError> {
    let hash = self.hashes.content_hash(path).map_err(|source| RuleKeyError::Input {
      key: key.to_string(),
      source,
    })?;
    Ok(self.set(key, format!("{}:{}", path.display(), hash)))
  }

  pub fn entries(&self) -> &[(String, String)] {
    &self.entries
  }

  pub fn build(self) -> Result<RuleKey, RuleKeyError> {
    let hash = hash_serialized(&self.entries)?;
    Ok(RuleKey(hash.0))
  }
}

/// Creates rule key builders. Carried unchanged through rule parameters.
pub trait RuleKeyBuilderFactory: Send + Sync + fmt::Debug {
  fn new_builder(&self) -> RuleKeyBuilder;
}

/// Factory whose builders hash inputs through a [`FileHashLoader`], usually the
/// project filesystem.
pub struct DefaultRuleKeyBuilderFactory {
  hashes: Arc<dyn FileHashLoader>,
}

impl DefaultRuleKeyBuilderFactory {
  pub fn new(hashes: Arc<dyn FileHashLoader>) -> Self {
    Self { hashes }
  }
}

impl fmt::Debug for DefaultRuleKeyBuilderFactory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DefaultRuleKeyBuilderFactory").finish_non_exhaustive()
  }
}

impl RuleKeyBuilderFactory for DefaultRuleKeyBuilderFactory {
  fn new_builder(&self) -> RuleKeyBuilder {
    RuleKeyBuilder::new(self.hashes.clone())
  }
}
