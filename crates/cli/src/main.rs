use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::{ProjectArgs, cmd_build, cmd_plan};
use output::{OutputFormat, print_error};

/// prebuild - prebuilt archives and their secondary modules
#[derive(Parser)]
#[command(name = "prebuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short = 'o', long, global = true, value_enum, default_value = "text")]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Configure rules and list every indexed rule without building
  Plan {
    #[command(flatten)]
    project: ProjectArgs,
  },

  /// Configure and build every rule, reporting recorded artifacts
  Build {
    #[command(flatten)]
    project: ProjectArgs,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(e) = run(cli) {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::Plan { project } => cmd_plan(&project, cli.verbose, cli.output),
    Commands::Build { project } => cmd_build(&project, cli.verbose, cli.output),
  }
}
