//! Crate-wide constants.

pub const APP_NAME: &str = "prebuild";

/// Flavor appended to a prebuilt archive's target to name its secondary module rule.
pub const SECONDARY_MODULE_FLAVOR: &str = "secondary-module";

/// Directory (relative to the project root) holding persisted build state.
pub const STATE_DIR: &str = ".prebuild";

pub const RULE_KEY_CACHE_FILENAME: &str = "rule_keys.json";

pub const RULE_KEY_CACHE_VERSION: u32 = 1;

/// Environment variable overriding the project root.
pub const ROOT_ENV: &str = "PREBUILD_ROOT";

/// Environment variable overriding execution parallelism.
pub const PARALLELISM_ENV: &str = "PREBUILD_PARALLELISM";
