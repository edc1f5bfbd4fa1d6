//! Terminal rendering for kindle reports.
//!
//! Every line kindle prints is tagged with a tone: a leading symbol plus a color
//! that is only applied when the stream is a color-capable terminal.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use kindle_lib::StepStatus;
use owo_colors::{OwoColorize, Stream, Style};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
  Done,
  Broken,
  Caution,
  Note,
  Quiet,
}

impl Tone {
  fn symbol(self) -> &'static str {
    match self {
      Tone::Done => "✓",
      Tone::Broken => "✗",
      Tone::Caution => "⚠",
      Tone::Note | Tone::Quiet => "•",
    }
  }

  fn style(self) -> Style {
    match self {
      Tone::Done => Style::new().green(),
      Tone::Broken => Style::new().red(),
      Tone::Caution => Style::new().yellow(),
      Tone::Note => Style::new().blue(),
      Tone::Quiet => Style::new().dimmed(),
    }
  }

  fn of(status: Option<StepStatus>) -> Self {
    match status {
      Some(StepStatus::Successful) => Tone::Done,
      Some(StepStatus::Failed) => Tone::Broken,
      Some(StepStatus::Skipped) | None => Tone::Quiet,
    }
  }
}

/// Text shown for a step outcome; `None` means the step has no recorded run.
pub fn status_text(status: Option<StepStatus>) -> String {
  match status {
    Some(status) => status.to_string(),
    None => "never ran".to_string(),
  }
}

/// First twelve characters of a checksum.
pub fn truncate_hash(hash: &str) -> &str {
  match hash.char_indices().nth(12) {
    Some((end, _)) => &hash[..end],
    None => hash,
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

fn print_tagged(tone: Tone, message: &str) {
  let style = tone.style();
  match tone {
    Tone::Broken | Tone::Caution => eprintln!(
      "{} {}",
      tone.symbol().if_supports_color(Stream::Stderr, |s| s.style(style)),
      message.if_supports_color(Stream::Stderr, |s| s.style(style))
    ),
    _ => println!(
      "{} {}",
      tone.symbol().if_supports_color(Stream::Stdout, |s| s.style(style)),
      message
    ),
  }
}

pub fn print_success(message: &str) {
  print_tagged(Tone::Done, message);
}

pub fn print_error(message: &str) {
  print_tagged(Tone::Broken, message);
}

pub fn print_warning(message: &str) {
  print_tagged(Tone::Caution, message);
}

pub fn print_info(message: &str) {
  print_tagged(Tone::Note, message);
}

/// Prints an indented `label: value` line with a dimmed label.
pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// Prints one step outcome: successful in green, failed in red, anything else dimmed.
pub fn print_step(step: &str, status: Option<StepStatus>) {
  let style = Tone::of(status).style();
  let text = status_text(status);
  println!(
    "  {}: {}",
    step.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    text.if_supports_color(Stream::Stdout, |s| s.style(style))
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
