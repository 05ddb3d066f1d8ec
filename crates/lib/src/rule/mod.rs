//! Build rules and the buildables behind them.
//!
//! A [`BuildRule`] pairs an identity and its dependencies ([`BuildRuleParams`]) with
//! a [`Buildable`] describing what the rule tracks, which steps it runs and where its
//! output lives. Rules are shared as `Arc<BuildRule>` between the rule index, their
//! dependents and the execution engine.
//!
//! # Submodules
//!
//! - [`buildable`] - the buildable capability set and build steps
//! - [`types`] - rule types, parameters and the rule itself

pub mod buildable;
mod types;

pub use buildable::{BuildContext, Buildable, Step, StepError};
pub use types::*;

#[cfg(test)]
pub(crate) mod testutil;
