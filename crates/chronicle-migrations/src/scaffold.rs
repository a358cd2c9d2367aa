//! New migration files from a template.

use crate::error::{MigrationError, Result};
use crate::version::{display_version, format_stamp};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "\
-- {{ nice_name }}
-- Created {{ date }}

-- up

-- down
";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").expect("valid placeholder regex"));

static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_ -]*$").expect("valid name regex"));

/// Replace every `{{ key }}` in `template` with its value.
///
/// Unknown keys are an error so typos in custom templates surface early.
pub fn render(template: &str, values: &BTreeMap<&str, String>) -> Result<String> {
    let mut missing = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[1];
        values.get(key).cloned().unwrap_or_else(|| {
            missing.get_or_insert_with(|| key.to_string());
            String::new()
        })
    });

    match missing {
        Some(key) => Err(MigrationError::Template(format!("unknown placeholder {{{{ {key} }}}}"))),
        None => Ok(rendered.into_owned()),
    }
}

/// `create user table` and `CreateUserTable` both become `create_user_table`.
#[must_use]
pub fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;

    for c in name.chars() {
        if c == ' ' || c == '-' || c == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        } else if c.is_ascii_uppercase() {
            if prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit()) && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }

    out.trim_end_matches('_').to_string()
}

/// `create_user_table` becomes `CreateUserTable`.
#[must_use]
pub fn camelize(name: &str) -> String {
    underscore(name)
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}

/// Write a new migration file for `name` into `dir`.
///
/// The file is named `<stamp>_<name>.<extension>` using `now` as the stamp.
/// Creates `dir` if needed and never overwrites an existing file.
pub fn scaffold(
    dir: &Path,
    extension: &str,
    name: &str,
    template: Option<&str>,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    if !NAME.is_match(name) {
        return Err(MigrationError::Template(format!(
            "migration name {name:?} must start with a letter and use letters, digits, spaces, '-' or '_'"
        )));
    }

    let file_name = underscore(name);
    let version = now.timestamp();
    let stamp = format_stamp(version);

    let mut values = BTreeMap::new();
    values.insert("name", file_name.clone());
    values.insert("nice_name", camelize(name));
    values.insert("version", stamp.clone());
    values.insert("date", display_version(version));

    let content = render(template.unwrap_or(DEFAULT_TEMPLATE), &values)?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stamp}_{file_name}.{extension}"));
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| {
            MigrationError::Template(format!("cannot write {}: {}", path.display(), e))
        })?;
    file.write_all(content.as_bytes())?;

    info!(path = %path.display(), "Created migration");
    Ok(path)
}
