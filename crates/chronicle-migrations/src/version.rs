//! Version stamps and run targets.
//!
//! A version is the local-time epoch second encoded by the 14-digit
//! `YYYYMMDDHHMMSS` prefix of a migration file name.

use crate::error::{MigrationError, Result};
use chrono::{LocalResult, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Length of a version stamp.
pub const STAMP_LEN: usize = 14;

/// chrono format of a version stamp.
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Display format for versions in human output.
pub const DISPLAY_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Convert a `YYYYMMDDHHMMSS` stamp to local-time epoch seconds.
pub fn parse_stamp(input: &str) -> Result<i64> {
    if input.len() != STAMP_LEN || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MigrationError::format(format!("{input:?}")));
    }

    // Every slice is ASCII digits, so the parses cannot fail.
    let field = |from: usize, to: usize| input[from..to].parse::<u32>().unwrap_or_default();
    let year = input[0..4].parse::<i32>().unwrap_or_default();

    let naive = NaiveDate::from_ymd_opt(year, field(4, 6), field(6, 8))
        .and_then(|date| date.and_hms_opt(field(8, 10), field(10, 12), field(12, 14)))
        .ok_or_else(|| MigrationError::format(format!("{input:?} is not a calendar date")))?;

    match chrono::Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.timestamp()),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.timestamp()),
        LocalResult::None => Err(MigrationError::format(format!(
            "{input:?} does not exist in local time"
        ))),
    }
}

/// Render a version back to its `YYYYMMDDHHMMSS` stamp.
#[must_use]
pub fn format_stamp(version: i64) -> String {
    format_local(version, STAMP_FORMAT)
}

/// Render a version for people.
#[must_use]
pub fn display_version(version: i64) -> String {
    format_local(version, DISPLAY_FORMAT)
}

fn format_local(version: i64, format: &str) -> String {
    chrono::Local
        .timestamp_opt(version, 0)
        .single()
        .map_or_else(|| version.to_string(), |dt| dt.format(format).to_string())
}

/// Upper bound for `up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "version")]
pub enum UpTarget {
    /// Everything up to now.
    #[default]
    Latest,
    /// Everything up to and including this version.
    Until(i64),
}

impl UpTarget {
    /// Parse an optional date argument.
    pub fn parse(date: Option<&str>) -> Result<Self> {
        date.map_or(Ok(Self::Latest), |d| parse_stamp(d).map(Self::Until))
    }

    /// Highest version this target admits.
    #[must_use]
    pub fn ceiling(self) -> i64 {
        match self {
            Self::Latest => Utc::now().timestamp(),
            Self::Until(version) => version,
        }
    }
}

/// Lower bound for `down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "version")]
pub enum DownTarget {
    /// Keep everything up to and including this version.
    Date(i64),
    /// Revert only the most recent migration.
    Last,
    /// Revert everything.
    All,
}

impl DownTarget {
    /// Versions strictly above the returned threshold get reverted.
    #[must_use]
    pub fn threshold(self, last_version: i64) -> i64 {
        match self {
            Self::Date(version) => version,
            Self::Last => last_version - 1,
            Self::All => 0,
        }
    }
}

impl FromStr for DownTarget {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("last") {
            Ok(Self::Last)
        } else if s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            parse_stamp(s).map(Self::Date)
        }
    }
}

impl fmt::Display for DownTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(version) => write!(f, "{}", format_stamp(*version)),
            Self::Last => write!(f, "last"),
            Self::All => write!(f, "all"),
        }
    }
}
