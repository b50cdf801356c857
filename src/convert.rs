//! Column type conversion.
//!
//! [`convert`] turns one column of a [`Table`] into a target semantic type and
//! returns a new table; the input is never touched, so snapshots held by the
//! history stay valid. Conversions are all-or-nothing:
//!
//! - a value that cannot be cast fails the whole operation with
//!   [`FastmigError::ConversionFailed`];
//! - values that parse to "missing" (unparseable dates, unknown boolean
//!   tokens, NaN) become null, and any null left in the converted column fails
//!   the operation with [`FastmigError::ConversionIntroducedNulls`]. This also
//!   applies to nulls that were already present in the source.
//!
//! The string and boolean targets are the exception: a missing cell becomes
//! the text `"nan"` or `true` respectively, so those targets never leave nulls.

use crate::error::{FastmigError, Result};
use crate::table::{Column, DataType, Table, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Requested target type as it arrives from a UI, CLI or macro file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetType {
    Supported(DataType),
    Unsupported(String),
}

impl TargetType {
    /// Parses a type token. Accepts canonical names and the short aliases
    /// `int`, `bool`, `float` and `str`.
    pub fn parse(token: &str) -> Self {
        let dtype = match token.trim().to_lowercase().as_str() {
            "integer" | "int" => DataType::Integer,
            "decimal" | "float" => DataType::Decimal,
            "string" | "str" => DataType::String,
            "boolean" | "bool" => DataType::Boolean,
            "category" => DataType::Category,
            "datetime" => DataType::Datetime,
            "object" => DataType::Object,
            "binary" => DataType::Binary,
            _ => return Self::Unsupported(token.to_owned()),
        };
        Self::Supported(dtype)
    }

    /// Canonical token for supported targets, the original text otherwise.
    /// Macro files store this form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Supported(dtype) => dtype.as_str(),
            Self::Unsupported(token) => token,
        }
    }
}

impl From<DataType> for TargetType {
    fn from(dtype: DataType) -> Self {
        Self::Supported(dtype)
    }
}

impl From<String> for TargetType {
    fn from(token: String) -> Self {
        Self::parse(&token)
    }
}

impl From<TargetType> for String {
    fn from(target: TargetType) -> Self {
        target.as_str().to_owned()
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A replayable unit of transformation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStep {
    column_name: String,
    target_type: TargetType,
    #[serde(default)]
    format_spec: Option<String>,
}

impl ConversionStep {
    /// Builds a step. Unsupported targets are accepted here and only rejected
    /// when the step is applied.
    pub fn new(
        column_name: impl Into<String>,
        target_type: impl Into<TargetType>,
        format_spec: Option<String>,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            target_type: target_type.into(),
            format_spec,
        }
    }

    /// Column the step converts.
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn target_type(&self) -> &TargetType {
        &self.target_type
    }

    /// `strftime` pattern, used by datetime targets only.
    pub fn format_spec(&self) -> Option<&str> {
        self.format_spec.as_deref()
    }

    /// Applies this step to `table`.
    ///
    /// # Errors
    ///
    /// Same as [`convert`].
    pub fn apply(&self, table: &Table) -> Result<Table> {
        convert(table, &self.column_name, &self.target_type, self.format_spec())
    }
}

/// Converts `column_name` in `table` to `target`.
///
/// `format_spec` is a chrono `strftime` pattern and only matters for
/// datetime targets.
///
/// # Errors
///
/// - [`FastmigError::ColumnNotFound`] if the column does not exist
/// - [`FastmigError::UnsupportedTargetType`] for an unknown target token
/// - [`FastmigError::ConversionFailed`] if any value cannot be cast
/// - [`FastmigError::ConversionIntroducedNulls`] if the result holds a null
pub fn convert(
    table: &Table,
    column_name: &str,
    target: &TargetType,
    format_spec: Option<&str>,
) -> Result<Table> {
    let source = table.column(column_name)?;

    let dtype = match target {
        TargetType::Supported(dtype) => *dtype,
        TargetType::Unsupported(token) => {
            return Err(FastmigError::UnsupportedTargetType(token.clone()));
        }
    };

    let converted = match dtype {
        DataType::Integer => cast_each(source, dtype, to_integer)?,
        DataType::Decimal => cast_each(source, dtype, to_decimal)?,
        DataType::Boolean => cast_all(source, dtype, to_boolean)?,
        DataType::String => cast_all(source, dtype, |v| {
            Ok(Value::String(v.render().unwrap_or_else(|| MISSING_TEXT.to_owned())))
        })?,
        DataType::Binary => cast_each(source, dtype, to_binary)?,
        DataType::Object => cast_each(source, dtype, to_object)?,
        DataType::Datetime => cast_each(source, dtype, |v| Ok(to_datetime(v, format_spec)))?,
        DataType::Category => to_category(source),
    };

    if converted.has_nulls() {
        return Err(FastmigError::ConversionIntroducedNulls {
            column: column_name.to_owned(),
            target: dtype.to_string(),
        });
    }

    log::debug!(
        "Converted column '{column_name}' from {} to {dtype} ({} rows)",
        source.dtype(),
        converted.len()
    );

    table.with_column(converted)
}

/// Text a missing cell becomes when converted to string.
pub const MISSING_TEXT: &str = "nan";

/// Casts every non-null value; the first failure rejects the column.
fn cast_each<F>(source: &Column, dtype: DataType, cast: F) -> Result<Column>
where
    F: Fn(&Value) -> std::result::Result<Value, String>,
{
    cast_all(source, dtype, |value| {
        if value.is_null() {
            Ok(Value::Null)
        } else {
            cast(value)
        }
    })
}

/// Casts every value, nulls included.
fn cast_all<F>(source: &Column, dtype: DataType, cast: F) -> Result<Column>
where
    F: Fn(&Value) -> std::result::Result<Value, String>,
{
    let values = source
        .values()
        .iter()
        .enumerate()
        .map(|(row, value)| {
            cast(value).map_err(|cause| {
                FastmigError::conversion_failed(source.name(), dtype, format!("row {row}: {cause}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Column::new(source.name(), dtype, values))
}

fn text_of(value: &Value) -> std::result::Result<&str, String> {
    value.as_text().ok_or_else(|| match value {
        Value::Binary(_) => "binary value is not valid UTF-8".to_owned(),
        other => format!("unexpected {other:?}"),
    })
}

fn to_integer(value: &Value) -> std::result::Result<Value, String> {
    let int = match value {
        Value::Integer(i) => *i,
        Value::Decimal(x) => {
            if !x.is_finite() {
                return Err(format!("cannot convert non-finite value {x} to integer"));
            }
            let truncated = x.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(format!("{x} is out of integer range"));
            }
            truncated as i64
        }
        Value::Boolean(b) => i64::from(*b),
        Value::Datetime(dt) => dt
            .and_utc()
            .timestamp_nanos_opt()
            .ok_or_else(|| format!("{dt} is out of nanosecond range"))?,
        Value::Null => return Ok(Value::Null),
        text => {
            let text = text_of(text)?;
            text.trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid literal for integer: '{text}'"))?
        }
    };
    Ok(Value::Integer(int))
}

fn to_decimal(value: &Value) -> std::result::Result<Value, String> {
    let x = match value {
        Value::Integer(i) => *i as f64,
        Value::Decimal(x) => *x,
        Value::Boolean(b) => f64::from(u8::from(*b)),
        Value::Datetime(dt) => dt
            .and_utc()
            .timestamp_nanos_opt()
            .ok_or_else(|| format!("{dt} is out of nanosecond range"))? as f64,
        Value::Null => return Ok(Value::Null),
        text => {
            let text = text_of(text)?;
            text.trim()
                .parse::<f64>()
                .map_err(|_| format!("could not convert string to decimal: '{text}'"))?
        }
    };
    Ok(Value::Decimal(x))
}

/// Recognised boolean spellings; anything else is missing.
pub fn parse_bool_token(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn to_boolean(value: &Value) -> std::result::Result<Value, String> {
    let b = match value {
        Value::Integer(i) => *i != 0,
        Value::Decimal(x) => *x != 0.0,
        Value::Boolean(b) => *b,
        Value::Datetime(_) | Value::Null => true,
        text => match parse_bool_token(text_of(text)?) {
            Some(b) => b,
            None => return Ok(Value::Null),
        },
    };
    Ok(Value::Boolean(b))
}

fn to_binary(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::String(s) => Ok(Value::Binary(s.as_bytes().to_vec())),
        Value::Category(label) => Ok(Value::Binary(label.as_bytes().to_vec())),
        Value::Binary(bytes) => Ok(Value::Binary(bytes.clone())),
        Value::Null => Ok(Value::Null),
        other => Err(format!(
            "{} value is not text-encodable",
            other.kind().map_or("null", |k| k.as_str())
        )),
    }
}

fn to_object(value: &Value) -> std::result::Result<Value, String> {
    Ok(match value {
        Value::Category(label) => Value::String(label.to_string()),
        other => other.clone(),
    })
}

const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d %B %Y", "%B %d, %Y"];

/// Parses `text` with `format` if given, otherwise tries common layouts.
pub fn parse_datetime(text: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let text = text.trim();
    match format {
        Some(fmt) => parse_with(text, fmt),
        None => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.naive_utc())
            .ok()
            .or_else(|| {
                DATETIME_LAYOUTS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            })
            .or_else(|| {
                DATE_LAYOUTS
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }),
    }
}

fn parse_with(text: &str, fmt: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, fmt).ok().or_else(|| {
        NaiveDate::parse_from_str(text, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

fn from_epoch_nanos(nanos: i64) -> Option<NaiveDateTime> {
    let secs = nanos.div_euclid(1_000_000_000);
    let subsec = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
    DateTime::from_timestamp(secs, subsec).map(|dt| dt.naive_utc())
}

// Unparseable input becomes null; the post-check turns that into an error.
fn to_datetime(value: &Value, format: Option<&str>) -> Value {
    let parsed = match (value, format) {
        (Value::Datetime(dt), _) => Some(*dt),
        (Value::Integer(i), None) => from_epoch_nanos(*i),
        (Value::Decimal(x), None) if x.is_finite() => from_epoch_nanos(x.trunc() as i64),
        (Value::Boolean(_) | Value::Null, _) => None,
        (other, fmt) => other
            .render()
            .and_then(|text| parse_datetime(&text, fmt)),
    };
    parsed.map_or(Value::Null, Value::Datetime)
}

fn to_category(source: &Column) -> Column {
    let labels: BTreeSet<String> = source.values().iter().filter_map(Value::render).collect();
    let labels: Vec<Arc<str>> = labels.into_iter().map(Arc::from).collect();
    let lookup: HashMap<&str, &Arc<str>> = labels.iter().map(|l| (l.as_ref(), l)).collect();

    let values = source
        .values()
        .iter()
        .map(|value| {
            value
                .render()
                .and_then(|text| lookup.get(text.as_str()).map(|l| Value::Category(Arc::clone(l))))
                .unwrap_or(Value::Null)
        })
        .collect();

    Column::categorical(source.name(), labels, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike as _;

    fn strings(name: &str, values: &[&str]) -> Column {
        Column::new(
            name,
            DataType::String,
            values.iter().map(|s| Value::String((*s).to_owned())).collect(),
        )
    }

    fn table_of(columns: Vec<Column>) -> Table {
        Table::new(columns).expect("valid table")
    }

    #[test]
    fn test_string_to_integer() -> Result<()> {
        let table = table_of(vec![strings("age", &["1", " 2", "30"])]);
        let out = convert(&table, "age", &DataType::Integer.into(), None)?;
        let col = out.column("age")?;
        assert_eq!(col.dtype(), DataType::Integer);
        assert_eq!(
            col.values(),
            &[Value::Integer(1), Value::Integer(2), Value::Integer(30)]
        );
        // source untouched
        assert_eq!(table.column("age")?.dtype(), DataType::String);
        Ok(())
    }

    #[test]
    fn test_non_numeric_integer_fails_whole_column() {
        let table = table_of(vec![strings("age", &["1", "2", "x"])]);
        let err = convert(&table, "age", &TargetType::parse("int"), None).unwrap_err();
        match err {
            FastmigError::ConversionFailed {
                column,
                target,
                cause,
            } => {
                assert_eq!(column, "age");
                assert_eq!(target, "integer");
                assert!(cause.contains("row 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decimal_truncates_to_integer() -> Result<()> {
        let table = table_of(vec![Column::new(
            "x",
            DataType::Decimal,
            vec![Value::Decimal(3.7), Value::Decimal(-1.2)],
        )]);
        let out = convert(&table, "x", &DataType::Integer.into(), None)?;
        assert_eq!(
            out.column("x")?.values(),
            &[Value::Integer(3), Value::Integer(-1)]
        );
        Ok(())
    }

    #[test]
    fn test_all_null_column_is_rejected() {
        let table = table_of(vec![Column::new(
            "empty",
            DataType::Decimal,
            vec![Value::Null, Value::Decimal(f64::NAN)],
        )]);
        let err = convert(&table, "empty", &DataType::Integer.into(), None).unwrap_err();
        assert!(matches!(
            err,
            FastmigError::ConversionIntroducedNulls { ref column, ref target }
                if column == "empty" && target == "integer"
        ));
    }

    #[test]
    fn test_category_label_set() -> Result<()> {
        let table = table_of(vec![strings("score", &["A", "B", "A", "C"])]);
        let out = convert(&table, "score", &TargetType::parse("category"), None)?;
        let col = out.column("score")?;

        let labels: Vec<&str> = col
            .categories()
            .unwrap_or_default()
            .iter()
            .map(|label| &**label)
            .collect();
        assert_eq!(labels, vec!["A", "B", "C"]);

        let rendered: Vec<String> = col.rendered().into_iter().flatten().collect();
        assert_eq!(rendered, vec!["A", "B", "A", "C"]);
        Ok(())
    }

    #[test]
    fn test_datetime_with_format_and_inference() -> Result<()> {
        let table = table_of(vec![
            strings("d", &["01/02/2024", "15/03/2024"]),
            strings("ts", &["2024-01-02 10:30:00", "2024-03-15T08:00:00Z"]),
        ]);

        let out = convert(&table, "d", &DataType::Datetime.into(), Some("%d/%m/%Y"))?;
        let first = out.column("d")?.get(0).cloned();
        let expected = NaiveDate::from_ymd_opt(2024, 2, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        assert_eq!(first, expected.map(Value::Datetime));

        let out = convert(&out, "ts", &DataType::Datetime.into(), None)?;
        match out.column("ts")?.get(1) {
            Some(Value::Datetime(dt)) => assert_eq!(dt.hour(), 8),
            other => panic!("expected datetime, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_unparseable_datetime_reports_nulls() {
        let table = table_of(vec![strings("d", &["2024-01-01", "not a date"])]);
        let err = convert(&table, "d", &DataType::Datetime.into(), None).unwrap_err();
        assert!(matches!(err, FastmigError::ConversionIntroducedNulls { .. }));
    }

    #[test]
    fn test_boolean_tokens() -> Result<()> {
        let table = table_of(vec![strings("flag", &["Yes", "no", "TRUE", "0"])]);
        let out = convert(&table, "flag", &TargetType::parse("bool"), None)?;
        assert_eq!(
            out.column("flag")?.values(),
            &[
                Value::Boolean(true),
                Value::Boolean(false),
                Value::Boolean(true),
                Value::Boolean(false)
            ]
        );

        let bad = table_of(vec![strings("bad", &["yes", "maybe"])]);
        assert!(matches!(
            convert(&bad, "bad", &DataType::Boolean.into(), None),
            Err(FastmigError::ConversionIntroducedNulls { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_binary_requires_text() -> Result<()> {
        let table = table_of(vec![
            strings("s", &["hé"]),
            Column::new("n", DataType::Integer, vec![Value::Integer(5)]),
        ]);
        let out = convert(&table, "s", &DataType::Binary.into(), None)?;
        assert_eq!(
            out.column("s")?.values(),
            &[Value::Binary("hé".as_bytes().to_vec())]
        );

        assert!(matches!(
            convert(&table, "n", &DataType::Binary.into(), None),
            Err(FastmigError::ConversionFailed { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_object_retags_without_changing_values() -> Result<()> {
        let table = table_of(vec![Column::new(
            "mixed",
            DataType::Integer,
            vec![Value::Integer(1), Value::Integer(2)],
        )]);
        let out = convert(&table, "mixed", &DataType::Object.into(), None)?;
        let col = out.column("mixed")?;
        assert_eq!(col.dtype(), DataType::Object);
        assert_eq!(col.values(), table.column("mixed")?.values());
        Ok(())
    }

    #[test]
    fn test_numeric_to_string_and_back() -> Result<()> {
        let table = table_of(vec![Column::new(
            "price",
            DataType::Decimal,
            vec![Value::Decimal(1.5), Value::Decimal(2.0)],
        )]);
        let as_text = convert(&table, "price", &DataType::String.into(), None)?;
        assert_eq!(
            as_text.column("price")?.values(),
            &[Value::String("1.5".to_owned()), Value::String("2.0".to_owned())]
        );

        let back = convert(&as_text, "price", &DataType::Decimal.into(), None)?;
        assert_eq!(back, table);
        Ok(())
    }

    #[test]
    fn test_missing_cells_fill_string_and_boolean_targets() -> Result<()> {
        let table = table_of(vec![
            Column::new("n", DataType::Integer, vec![Value::Integer(1), Value::Null]),
            Column::new(
                "note",
                DataType::String,
                vec![Value::String("yes".to_owned()), Value::Null],
            ),
        ]);

        let as_text = convert(&table, "n", &DataType::String.into(), None)?;
        assert_eq!(
            as_text.column("n")?.values(),
            &[Value::String("1".to_owned()), Value::String("nan".to_owned())]
        );

        let as_bool = convert(&table, "note", &DataType::Boolean.into(), None)?;
        assert_eq!(
            as_bool.column("note")?.values(),
            &[Value::Boolean(true), Value::Boolean(true)]
        );

        for target in [DataType::Integer, DataType::Decimal, DataType::Category] {
            assert!(
                matches!(
                    convert(&table, "n", &target.into(), None),
                    Err(FastmigError::ConversionIntroducedNulls { .. })
                ),
                "{target} must still reject missing cells"
            );
        }
        Ok(())
    }

    #[test]
    fn test_blank_csv_cell_converts_to_text() -> Result<()> {
        let table = crate::io::read_csv("name,note\nann,hi\nbob,\n".as_bytes(), b',')?;
        let out = convert(&table, "note", &TargetType::parse("str"), None)?;
        assert_eq!(
            out.column("note")?.values(),
            &[Value::String("hi".to_owned()), Value::String("nan".to_owned())]
        );
        Ok(())
    }

    #[test]
    fn test_preconditions() {
        let table = table_of(vec![strings("a", &["1"])]);
        assert!(matches!(
            convert(&table, "missing", &DataType::Integer.into(), None),
            Err(FastmigError::ColumnNotFound(name)) if name == "missing"
        ));
        assert!(matches!(
            convert(&table, "a", &TargetType::parse("unix"), None),
            Err(FastmigError::UnsupportedTargetType(token)) if token == "unix"
        ));
    }

    #[test]
    fn test_target_type_serde_tokens() -> Result<()> {
        let step = ConversionStep::new("age", TargetType::parse("int"), None);
        let json = serde_json::to_string(&step)
            .map_err(|e| FastmigError::WriteFailure(e.to_string()))?;
        assert_eq!(
            json,
            r#"{"column_name":"age","target_type":"integer","format_spec":null}"#
        );

        let parsed: ConversionStep = serde_json::from_str(r#"{"column_name":"d","target_type":"unix"}"#)
            .map_err(|e| FastmigError::MalformedMacro(e.to_string()))?;
        assert_eq!(parsed.target_type(), &TargetType::Unsupported("unix".to_owned()));
        assert_eq!(parsed.format_spec(), None);
        Ok(())
    }
}
