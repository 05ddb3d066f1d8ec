//! Build target identities.
//!
//! A target names a single rule in the project:
//!
//! ```text
//! //<base_path>:<short_name>[#<flavor>,<flavor>...]
//! ```
//!
//! Flavored targets name rules derived from an unflavored one. Deriving a flavored
//! target appends to the flavor list, so derivation is deterministic and injective:
//! two distinct targets never derive the same flavored target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::SECONDARY_MODULE_FLAVOR;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
  #[error("target must start with '//': {0}")]
  MissingPrefix(String),

  #[error("target must contain exactly one ':' separating path and name: {0}")]
  MissingName(String),

  #[error("target has an empty name: {0}")]
  EmptyName(String),

  #[error("invalid flavor '{flavor}': only [a-z0-9_-] are allowed")]
  InvalidFlavor { flavor: String },
}

/// A qualifier naming a rule derived from another one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Flavor(String);

impl Flavor {
  pub fn new(name: &str) -> Result<Self, TargetError> {
    let valid = !name.is_empty()
      && name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid {
      return Err(TargetError::InvalidFlavor {
        flavor: name.to_string(),
      });
    }
    Ok(Self(name.to_string()))
  }

  /// The flavor naming a prebuilt archive's secondary module rule.
  pub fn secondary_module() -> Self {
    Self(SECONDARY_MODULE_FLAVOR.to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Flavor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<String> for Flavor {
  type Error = TargetError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Flavor::new(&value)
  }
}

impl From<Flavor> for String {
  fn from(flavor: Flavor) -> Self {
    flavor.0
  }
}

/// Globally unique identity of a build rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildTarget {
  base_path: String,
  short_name: String,
  flavors: Vec<Flavor>,
}

impl BuildTarget {
  pub fn new(base_path: &str, short_name: &str) -> Result<Self, TargetError> {
    if short_name.is_empty() {
      return Err(TargetError::EmptyName(format!("//{}:", base_path)));
    }
    Ok(Self {
      base_path: base_path.to_string(),
      short_name: short_name.to_string(),
      flavors: Vec::new(),
    })
  }

  pub fn base_path(&self) -> &str {
    &self.base_path
  }

  pub fn short_name(&self) -> &str {
    &self.short_name
  }

  pub fn flavors(&self) -> &[Flavor] {
    &self.flavors
  }

  pub fn is_flavored(&self) -> bool {
    !self.flavors.is_empty()
  }

  /// The target with `flavor` appended to its flavor list.
  pub fn with_flavor(&self, flavor: Flavor) -> Self {
    let mut flavored = self.clone();
    flavored.flavors.push(flavor);
    flavored
  }

  /// Name without flavors, e.g. `//lib:foo`.
  pub fn unflavored_name(&self) -> String {
    format!("//{}:{}", self.base_path, self.short_name)
  }
}

impl fmt::Display for BuildTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "//{}:{}", self.base_path, self.short_name)?;
    if !self.flavors.is_empty() {
      let flavors: Vec<&str> = self.flavors.iter().map(Flavor::as_str).collect();
      write!(f, "#{}", flavors.join(","))?;
    }
    Ok(())
  }
}

impl FromStr for BuildTarget {
  type Err = TargetError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let rest = s
      .strip_prefix("//")
      .ok_or_else(|| TargetError::MissingPrefix(s.to_string()))?;

    let (name_part, flavor_part) = match rest.split_once('#') {
      Some((name, flavors)) => (name, Some(flavors)),
      None => (rest, None),
    };

    let (base_path, short_name) = name_part
      .split_once(':')
      .filter(|(_, name)| !name.contains(':'))
      .ok_or_else(|| TargetError::MissingName(s.to_string()))?;

    if short_name.is_empty() {
      return Err(TargetError::EmptyName(s.to_string()));
    }

    let flavors = match flavor_part {
      Some(flavors) => flavors.split(',').map(Flavor::new).collect::<Result<Vec<_>, _>>()?,
      None => Vec::new(),
    };

    Ok(Self {
      base_path: base_path.to_string(),
      short_name: short_name.to_string(),
      flavors,
    })
  }
}

impl TryFrom<String> for BuildTarget {
  type Error = TargetError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<BuildTarget> for String {
  fn from(target: BuildTarget) -> Self {
    target.to_string()
  }
}
