//! `+++`-delimited TOML frontmatter of markdown files.
//!
//! ```text
//! +++
//! title = "Hello"
//! date = 2024-03-01
//! tags = ["rust"]
//! +++
//! # Body
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use toml::{Table, Value};

const DELIMITER: &str = "+++";

#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("unterminated frontmatter block opened on line {0}")]
    Unterminated(usize),

    #[error("invalid frontmatter TOML")]
    Toml(#[from] toml::de::Error),

    #[error("frontmatter field `{0}` must be {1}")]
    InvalidField(&'static str, &'static str),

    #[error("missing required frontmatter field `{0}`")]
    MissingField(String),
}

/// Split a document into its frontmatter block (if any) and body.
///
/// The block opens on the first non-blank line and closes at the next
/// delimiter line.
pub fn split(source: &str) -> Result<(Option<&str>, &str), FrontmatterError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut lines = source.split_inclusive('\n').enumerate();
    let mut offset = 0;

    let mut opening_line = None;
    for (index, line) in lines.by_ref() {
        offset += line.len();
        if line.trim().is_empty() {
            continue;
        }
        if is_delimiter(line) {
            opening_line = Some(index + 1);
        }
        break;
    }

    let Some(opening_line) = opening_line else {
        return Ok((None, source));
    };

    let block_start = offset;
    for (_, line) in lines {
        let line_start = offset;
        offset += line.len();
        if is_delimiter(line) {
            return Ok((Some(&source[block_start..line_start]), &source[offset..]));
        }
    }

    Err(FrontmatterError::Unterminated(opening_line))
}

#[inline]
fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

/// Parse a frontmatter block into a raw TOML table.
pub fn parse_table(block: &str) -> Result<Table, FrontmatterError> {
    Ok(toml::from_str(block)?)
}

/// Default validation: every field in `required` must be present.
pub fn check_required(table: &Table, required: &[String]) -> Result<(), FrontmatterError> {
    match required.iter().find(|field| !table.contains_key(field.as_str())) {
        Some(field) => Err(FrontmatterError::MissingField(field.clone())),
        None => Ok(()),
    }
}

/// Typed frontmatter. Unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frontmatter {
    pub title: Option<String>,
    pub author: Option<String>,
    /// TOML strings and datetimes are both accepted.
    pub date: Option<String>,
    pub layout: Option<String>,
    pub slug: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub draft: bool,
    #[serde(skip)]
    pub extra: Table,
}

impl Frontmatter {
    pub fn from_table(mut table: Table) -> Result<Self, FrontmatterError> {
        Ok(Self {
            title: take_string(&mut table, "title")?,
            author: take_string(&mut table, "author")?,
            date: take_date(&mut table)?,
            layout: take_string(&mut table, "layout")?,
            slug: take_string(&mut table, "slug")?,
            categories: take_strings(&mut table, "categories")?,
            tags: take_strings(&mut table, "tags")?,
            draft: match table.remove("draft") {
                None => false,
                Some(Value::Boolean(draft)) => draft,
                Some(_) => return Err(FrontmatterError::InvalidField("draft", "a boolean")),
            },
            extra: table,
        })
    }

    /// `YYYY-MM-DD` when the date starts with one, else the raw value.
    pub fn display_date(&self) -> String {
        let Some(date) = &self.date else {
            return String::new();
        };
        date.get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            .map(|day| day.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| date.clone())
    }
}

fn take_string(table: &mut Table, key: &'static str) -> Result<Option<String>, FrontmatterError> {
    match table.remove(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(FrontmatterError::InvalidField(key, "a string")),
    }
}

fn take_strings(table: &mut Table, key: &'static str) -> Result<Vec<String>, FrontmatterError> {
    match table.remove(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .into_iter()
            .map(|value| match value {
                Value::String(value) => Ok(value),
                _ => Err(FrontmatterError::InvalidField(key, "a list of strings")),
            })
            .collect(),
        Some(_) => Err(FrontmatterError::InvalidField(key, "a list of strings")),
    }
}

fn take_date(table: &mut Table) -> Result<Option<String>, FrontmatterError> {
    match table.remove("date") {
        None => Ok(None),
        Some(Value::String(date)) => Ok(Some(date)),
        Some(Value::Datetime(date)) => Ok(Some(date.to_string())),
        Some(_) => Err(FrontmatterError::InvalidField("date", "a string or datetime")),
    }
}
