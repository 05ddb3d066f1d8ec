//! Project filesystem access.
//!
//! Rules declare paths relative to the project root (absolute paths are kept as-is).
//! [`ProjectFilesystem`] turns them into real paths and memoizes file content hashes
//! so each input is read at most once per process, no matter how many rule keys
//! reference it.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::trace;

use crate::util::hash::{ContentHash, FileHashError, hash_file};

/// Source of file content hashes for rule keys.
pub trait FileHashLoader: Send + Sync {
  fn content_hash(&self, path: &Path) -> Result<ContentHash, FileHashError>;
}

#[derive(Debug)]
pub struct ProjectFilesystem {
  root: PathBuf,
  hashes: DashMap<PathBuf, ContentHash>,
}

impl ProjectFilesystem {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      hashes: DashMap::new(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Resolve a declared path against the project root.
  pub fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.root.join(path)
    }
  }

  pub fn exists(&self, path: &Path) -> bool {
    self.resolve(path).exists()
  }

  /// Forget memoized hashes, e.g. after files were rewritten within one process.
  pub fn invalidate_hashes(&self) {
    self.hashes.clear();
  }
}

impl FileHashLoader for ProjectFilesystem {
  fn content_hash(&self, path: &Path) -> Result<ContentHash, FileHashError> {
    let resolved = self.resolve(path);
    if let Some(hash) = self.hashes.get(&resolved) {
      return Ok(hash.value().clone());
    }

    trace!(path = %resolved.display(), "hashing file");
    let hash = hash_file(&resolved)?;
    self.hashes.insert(resolved, hash.clone());
    Ok(hash)
  }
}
