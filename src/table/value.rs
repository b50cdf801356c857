//! Declared column types and the tagged cell value.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Semantic type declared on a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Decimal,
    String,
    Boolean,
    Category,
    Datetime,
    Object,
    Binary,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl DataType {
    pub const ALL: [Self; 8] = [
        Self::Integer,
        Self::Decimal,
        Self::String,
        Self::Boolean,
        Self::Category,
        Self::Datetime,
        Self::Object,
        Self::Binary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Category => "category",
            Self::Datetime => "datetime",
            Self::Object => "object",
            Self::Binary => "binary",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }

    /// Target types worth offering for a column of this type.
    pub fn suggested_targets(&self) -> &'static [Self] {
        match self {
            Self::Integer | Self::Decimal => &[Self::Integer, Self::Decimal, Self::String],
            Self::String => &[Self::String, Self::Category, Self::Boolean],
            Self::Datetime => &[Self::Datetime, Self::String],
            Self::Boolean => &[Self::Boolean, Self::Integer, Self::String],
            Self::Category | Self::Object | Self::Binary => &[Self::String, Self::Object],
        }
    }
}

/// A single cell.
///
/// Category cells carry their label directly; the owning column keeps the
/// finite label set.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Decimal(f64),
    String(String),
    Boolean(bool),
    Category(Arc<str>),
    Datetime(NaiveDateTime),
    Binary(Vec<u8>),
}

impl Value {
    /// Null, or a decimal NaN (which tabular tools treat as missing).
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Decimal(x) => x.is_nan(),
            _ => false,
        }
    }

    /// The declared type this value naturally belongs to.
    pub fn kind(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(DataType::Integer),
            Self::Decimal(_) => Some(DataType::Decimal),
            Self::String(_) => Some(DataType::String),
            Self::Boolean(_) => Some(DataType::Boolean),
            Self::Category(_) => Some(DataType::Category),
            Self::Datetime(_) => Some(DataType::Datetime),
            Self::Binary(_) => Some(DataType::Binary),
        }
    }

    /// Text payload for values that are text-like.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Category(label) => Some(label),
            Self::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Natural textual representation; `None` for nulls.
    pub fn render(&self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        let text = match self {
            Self::Null => return None,
            Self::Integer(i) => i.to_string(),
            Self::Decimal(x) => render_decimal(*x),
            Self::String(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
            Self::Category(label) => label.to_string(),
            Self::Datetime(dt) => dt.format(DATETIME_DISPLAY).to_string(),
            Self::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        };
        Some(text)
    }
}

pub(crate) const DATETIME_DISPLAY: &str = "%Y-%m-%d %H:%M:%S%.f";

fn render_decimal(x: f64) -> String {
    // keep a visible fractional part so 3.0 does not read back as an integer
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}
