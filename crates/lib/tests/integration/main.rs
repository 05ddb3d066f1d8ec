//! End-to-end tests: declared rules through configuration and execution.

mod build_tests;
mod common;
mod flavor_tests;
