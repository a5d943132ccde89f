//! Cell and row values of the tabular store.
//!
//! A table is an ordered sequence of rows, each row a fixed-width vector of
//! [`Cell`]s. Cells are loosely typed the same way spreadsheet cells are: a
//! stock column may hold an integer, a numeric string, or nothing at all, and
//! the commit pipeline has to cope with every one of those.
//!
//! Two JSON encodings exist:
//!
//! - the **stored** encoding (the derived `Serialize`/`Deserialize`), adjacently
//!   tagged so that timestamps and integers survive a round trip through a
//!   backend such as `PostgreSQL` `JSONB`;
//! - the **presented** encoding ([`Cell::to_json`]), plain JSON values handed to
//!   clients in table dumps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single row: one cell per column, in column order.
pub type Row = Vec<Cell>;

/// A loosely typed cell value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Cell {
    /// No value
    #[default]
    Empty,
    /// Free text
    Text(String),
    /// Whole number
    Integer(i64),
    /// Fractional number
    Float(f64),
    /// Point in time
    Timestamp(DateTime<Utc>),
}

impl Cell {
    /// Build a text cell.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Build a text cell, or [`Cell::Empty`] when the value is absent or blank.
    #[must_use]
    pub fn optional_text(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => Self::Text(v.to_string()),
            _ => Self::Empty,
        }
    }

    /// Whether the cell holds no value.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Interpret the cell as a whole number.
    ///
    /// Integers, integral floats and numeric text are numeric. Empty cells,
    /// fractional floats and any other text are not.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // guarded by the fract/range check
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Some(*f as i64)
            },
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(|f| Self::Float(f).as_i64()))
            },
            Self::Empty | Self::Float(_) | Self::Timestamp(_) => None,
        }
    }

    /// Interpret the cell as text, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the cell as a timestamp.
    ///
    /// Text holding an RFC 3339 timestamp also counts.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            Self::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Lookup key form of the cell: its display text, `None` when empty.
    ///
    /// A reference code stored as the integer `1024` has the key `"1024"`.
    /// Text is taken as stored, without trimming.
    #[must_use]
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Compare the cell against a lookup key, as [`Cell::key`] forms it.
    #[must_use]
    pub fn matches_key(&self, key: &str) -> bool {
        match self {
            Self::Empty => false,
            Self::Text(s) => s == key,
            other => other.to_string() == key,
        }
    }

    /// Presented JSON form of the cell.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Empty => serde_json::Value::Null,
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Presented JSON form of a whole row.
#[must_use]
pub fn row_to_json(row: &[Cell]) -> serde_json::Value {
    serde_json::Value::Array(row.iter().map(Cell::to_json).collect())
}
