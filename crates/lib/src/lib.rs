//! prebuild-lib: Core types and logic for prebuild
//!
//! This crate provides the fundamental types used throughout prebuild:
//! - `BuildTarget`: rule identity, with flavors naming derived rules
//! - `BuildRule`: a configured rule and the buildable behind it
//! - `BuildRuleResolver`: the shared, concurrently-filled rule index
//! - `PrebuiltArchiveDescription`: prebuilt archives and their secondary modules
//! - `configure` / `execute`: the configuration and execution phases

pub mod artifact;
pub mod configure;
pub mod consts;
pub mod description;
pub mod execute;
pub mod filesystem;
pub mod flavor;
pub mod paths;
pub mod resolver;
pub mod rule;
pub mod rule_key;
pub mod source_path;
pub mod target;
pub mod util;
