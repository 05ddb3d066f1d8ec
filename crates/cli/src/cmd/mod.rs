mod build;
mod plan;
mod project;

pub use build::cmd_build;
pub use plan::cmd_plan;
pub use project::ProjectArgs;
