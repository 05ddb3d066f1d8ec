use std::io;
use std::path::{Path, PathBuf};

use crate::consts::{ROOT_ENV, RULE_KEY_CACHE_FILENAME, STATE_DIR};

/// Returns the project root.
///
/// An explicit root wins, then `PREBUILD_ROOT`, then the current directory.
/// The result is canonicalized.
pub fn project_root(explicit: Option<&Path>) -> io::Result<PathBuf> {
  let root = match explicit {
    Some(path) => path.to_path_buf(),
    None => match std::env::var(ROOT_ENV) {
      Ok(value) if !value.is_empty() => PathBuf::from(value),
      _ => std::env::current_dir()?,
    },
  };
  dunce::canonicalize(root)
}

/// Returns the directory for persisted build state within a project.
pub fn state_dir(root: &Path) -> PathBuf {
  root.join(STATE_DIR)
}

/// Returns the path of the persisted rule key cache within a project.
pub fn rule_key_cache_path(root: &Path) -> PathBuf {
  state_dir(root).join(RULE_KEY_CACHE_FILENAME)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::tempdir;

  #[test]
  #[serial]
  fn explicit_root_takes_precedence() {
    let explicit = tempdir().unwrap();
    let from_env = tempdir().unwrap();

    temp_env::with_var(ROOT_ENV, Some(from_env.path()), || {
      let root = project_root(Some(explicit.path())).unwrap();
      assert_eq!(root, dunce::canonicalize(explicit.path()).unwrap());
    });
  }

  #[test]
  #[serial]
  fn env_root_used_when_not_explicit() {
    let from_env = tempdir().unwrap();

    temp_env::with_var(ROOT_ENV, Some(from_env.path()), || {
      let root = project_root(None).unwrap();
      assert_eq!(root, dunce::canonicalize(from_env.path()).unwrap());
    });
  }

  #[test]
  #[serial]
  fn missing_root_is_an_error() {
    temp_env::with_var(ROOT_ENV, Some("/definitely/not/a/prebuild/root"), || {
      assert!(project_root(None).is_err());
    });
  }

  #[test]
  fn rule_key_cache_lives_in_state_dir() {
    let path = rule_key_cache_path(Path::new("/project"));
    assert_eq!(path, PathBuf::from("/project/.prebuild/rule_keys.json"));
  }
}
