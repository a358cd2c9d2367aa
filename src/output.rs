//! Terminal and JSON rendering for command results.
//!
//! Results and progress go to stdout; errors and warnings go to stderr so a
//! `--json` consumer only ever sees one JSON document on stdout.

use colored::{ColoredString, Colorize};
use serde::Serialize;

/// How results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Coloured lines and tables.
    Text,
    /// One pretty-printed JSON document.
    Json,
}

impl OutputFormat {
    /// `--json` selects [`OutputFormat::Json`].
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Glyph {
    Ok,
    Fail,
    Warn,
    Note,
}

impl Glyph {
    fn paint(self) -> ColoredString {
        match self {
            Self::Ok => "✓".green().bold(),
            Self::Fail => "✗".red().bold(),
            Self::Warn => "⚠".yellow().bold(),
            Self::Note => "ℹ".blue().bold(),
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Self::Fail | Self::Warn)
    }
}

fn line(glyph: Glyph, message: &str) {
    if glyph.to_stderr() {
        eprintln!("{} {message}", glyph.paint());
    } else {
        println!("{} {message}", glyph.paint());
    }
}

/// Final line of a successful command.
pub fn success(message: &str) {
    line(Glyph::Ok, message);
}

/// Failure line, on stderr.
pub fn error(message: &str) {
    line(Glyph::Fail, message);
}

/// Warning line, on stderr.
pub fn warning(message: &str) {
    line(Glyph::Warn, message);
}

/// Informational line.
pub fn info(message: &str) {
    line(Glyph::Note, message);
}

/// Indented `key: value` line.
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {value}", key.bold());
}

/// Underlined heading preceded by a blank line.
pub fn section(title: &str) {
    println!("\n{}", title.bold().underline());
}

/// One migration step: arrow, stamp, name and a dimmed detail.
pub fn step(up: bool, stamp: &str, name: &str, detail: &str) {
    let arrow = if up { "↑".green() } else { "↓".yellow() };
    println!("  {arrow} {} {name} {}", stamp.dimmed(), detail.dimmed());
}

/// Rounded table, or a placeholder line when there are no rows.
pub fn table<T: tabled::Tabled>(rows: &[T]) {
    use tabled::{settings::Style, Table};

    if rows.is_empty() {
        println!("  (no migrations)");
    } else {
        println!("{}", Table::new(rows).with(Style::rounded()));
    }
}

/// Epoch seconds as local `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(timestamp: i64) -> String {
    use chrono::{Local, TimeZone};

    match Local.timestamp_opt(timestamp, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "unknown".to_string(),
    }
}

/// Envelope printed for every command under `--json`.
#[derive(Debug, Serialize)]
pub struct CommandResult<T: Serialize> {
    /// Whether the command succeeded.
    pub success: bool,
    /// Command payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    fn new(success: bool, data: Option<T>, error: Option<String>) -> Self {
        Self {
            success,
            data,
            error,
            message: None,
        }
    }

    /// Successful result carrying `data`.
    pub fn success(data: T) -> Self {
        Self::new(true, Some(data), None)
    }

    /// Failed result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::new(false, None, Some(error.into()))
    }

    /// Attach a human summary.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Render as JSON on stdout, or as glyph lines.
    pub fn print(&self, format: OutputFormat) -> anyhow::Result<()> {
        if format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(self)?);
            return Ok(());
        }

        if let Some(ref err) = self.error {
            error(err);
        }
        match (&self.message, self.success) {
            (Some(msg), true) => success(msg),
            (Some(msg), false) => error(msg),
            (None, _) => {}
        }
        Ok(())
    }
}
