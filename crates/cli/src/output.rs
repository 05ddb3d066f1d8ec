//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, human-readable durations, and Unicode symbols.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Short form of a rule key for text output.
pub fn truncate_hash(hash: &str) -> &str {
  hash.get(..12).unwrap_or(hash)
}

/// Millisecond precision; anything finer is noise for a build summary.
pub fn format_duration(duration: Duration) -> String {
  let millis = Duration::from_millis(duration.as_millis() as u64);
  if millis.is_zero() {
    return "0ms".to_string();
  }
  humantime::format_duration(millis).to_string()
}

#[derive(Clone, Copy)]
enum Tone {
  Green,
  Red,
  Yellow,
  Blue,
}

fn paint<T: std::fmt::Display>(value: T, tone: Tone, stream: Stream) -> String {
  value
    .if_supports_color(stream, |v| match tone {
      Tone::Green => v.green().to_string(),
      Tone::Red => v.red().to_string(),
      Tone::Yellow => v.yellow().to_string(),
      Tone::Blue => v.blue().to_string(),
    })
    .to_string()
}

pub fn print_success(message: &str) {
  println!("{} {}", paint(symbols::SUCCESS, Tone::Green, Stream::Stdout), message);
}

/// Errors and warnings go to stderr, message included in the status color.
pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    paint(symbols::ERROR, Tone::Red, Stream::Stderr),
    paint(message, Tone::Red, Stream::Stderr)
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    paint(symbols::WARNING, Tone::Yellow, Stream::Stderr),
    paint(message, Tone::Yellow, Stream::Stderr)
  );
}

pub fn print_info(message: &str) {
  println!("{} {}", paint(symbols::INFO, Tone::Blue, Stream::Stdout), message);
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
