//! Reading and writing tables as CSV or Excel files.
//!
//! The format is chosen from the file extension. CSV columns get their type
//! inferred from the text (integer, decimal, boolean, otherwise string, with
//! the usual NA spellings read as null). Excel columns take the cell types
//! from the first worksheet; mixed columns come back as `object`.

use crate::convert::parse_datetime;
use crate::error::{FastmigError, Result};
use crate::table::{Column, DataType, Table, Value};
use calamine::{Data, Reader as _, open_workbook_auto};
use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashSet;
use std::path::Path;

/// Cell spellings read as missing values.
const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "#N/A", "NaN", "nan", "-NaN", "NULL", "null", "None", "<NA>",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    /// Picks the format from the lowercase file extension.
    ///
    /// # Errors
    ///
    /// [`FastmigError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "xls" | "xlsx" | "xlsm" => Ok(Self::Excel),
            _ => Err(FastmigError::UnsupportedFormat(ext)),
        }
    }
}

/// Table reader/writer settings.
#[derive(Clone, Copy, Debug)]
pub struct TableIo {
    delimiter: u8,
}

impl Default for TableIo {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl TableIo {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Reads `path` as CSV or Excel depending on its extension.
    ///
    /// # Errors
    ///
    /// - [`FastmigError::UnsupportedFormat`] for an unknown extension, checked
    ///   before the file is looked up
    /// - [`FastmigError::FileNotFound`] if the path does not exist
    /// - [`FastmigError::ReadFailure`] if the file cannot be opened or parsed
    pub fn load(&self, path: &Path) -> Result<Table> {
        let format = FileFormat::from_path(path)?;
        if !path.exists() {
            return Err(FastmigError::FileNotFound(path.to_path_buf()));
        }

        let table = match format {
            FileFormat::Csv => {
                let file = std::fs::File::open(path).map_err(read_failure)?;
                read_csv(file, self.delimiter)?
            }
            FileFormat::Excel => read_excel(path)?,
        };

        log::info!(
            "Loaded {} ({} rows, {} columns)",
            path.display(),
            table.height(),
            table.width()
        );
        Ok(table)
    }

    /// Writes `table` to `path`, overwriting any existing file.
    ///
    /// # Errors
    ///
    /// [`FastmigError::UnsupportedFormat`] for an unknown extension, or
    /// [`FastmigError::WriteFailure`] if the file cannot be written. Legacy
    /// `.xls` output is a write failure.
    pub fn save(&self, table: &Table, path: &Path) -> Result<()> {
        match FileFormat::from_path(path)? {
            FileFormat::Csv => {
                let file = std::fs::File::create(path).map_err(write_failure)?;
                write_csv(table, file, self.delimiter)?;
            }
            FileFormat::Excel => write_excel(table, path)?,
        }

        log::info!("Saved {} rows to {}", table.height(), path.display());
        Ok(())
    }
}

/// Loads `path` with default settings.
///
/// # Errors
///
/// Same as [`TableIo::load`].
pub fn load(path: impl AsRef<Path>) -> Result<Table> {
    TableIo::default().load(path.as_ref())
}

/// Saves `table` to `path` with default settings, overwriting any existing file.
///
/// # Errors
///
/// Same as [`TableIo::save`].
pub fn save(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    TableIo::default().save(table, path.as_ref())
}

fn read_failure(err: impl std::fmt::Display) -> FastmigError {
    FastmigError::ReadFailure(err.to_string())
}

fn write_failure(err: impl std::fmt::Display) -> FastmigError {
    FastmigError::WriteFailure(err.to_string())
}

/// Repeated header names get `.1`, `.2`, ... suffixes.
fn dedupe_headers(headers: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{name}.{n}");
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Reads CSV with a header row, inferring one type per column.
///
/// # Errors
///
/// [`FastmigError::ReadFailure`] on malformed CSV or a read error.
pub fn read_csv<R: std::io::Read>(reader: R, delimiter: u8) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(reader);

    let headers = dedupe_headers(
        rdr.headers()
            .map_err(read_failure)?
            .iter()
            .map(str::to_owned),
    );

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record.map_err(read_failure)?;
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push(field.to_owned());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| infer_text_column(name, raw))
        .collect();
    Table::new(columns)
}

fn infer_text_column(name: String, raw: Vec<String>) -> Column {
    let present: Vec<&str> = raw
        .iter()
        .map(|s| s.trim())
        .filter(|s| !is_na(s))
        .collect();

    let (dtype, parse): (DataType, fn(&str) -> Value) =
        if !present.is_empty() && present.iter().all(|s| s.parse::<i64>().is_ok()) {
            (DataType::Integer, integer_cell)
        } else if present.iter().all(|s| s.parse::<f64>().is_ok()) {
            (DataType::Decimal, decimal_cell)
        } else if present
            .iter()
            .all(|s| s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false"))
        {
            (DataType::Boolean, boolean_cell)
        } else {
            (DataType::String, string_cell)
        };

    let values = raw
        .iter()
        .map(|s| if is_na(s) { Value::Null } else { parse(s) })
        .collect();
    Column::new(name, dtype, values)
}

fn is_na(s: &str) -> bool {
    NA_TOKENS.contains(&s.trim())
}

fn integer_cell(s: &str) -> Value {
    s.trim().parse().map_or(Value::Null, Value::Integer)
}

fn decimal_cell(s: &str) -> Value {
    s.trim().parse().map_or(Value::Null, Value::Decimal)
}

fn boolean_cell(s: &str) -> Value {
    Value::Boolean(s.trim().eq_ignore_ascii_case("true"))
}

fn string_cell(s: &str) -> Value {
    Value::String(s.to_owned())
}

/// Writes `table` as CSV with a header row. Nulls become empty fields.
///
/// # Errors
///
/// [`FastmigError::WriteFailure`] if the writer fails.
pub fn write_csv<W: std::io::Write>(table: &Table, writer: W, delimiter: u8) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    wtr.write_record(table.column_names())
        .map_err(write_failure)?;

    for idx in 0..table.height() {
        let record: Vec<String> = table
            .row(idx)
            .unwrap_or_default()
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        wtr.write_record(&record).map_err(write_failure)?;
    }

    wtr.flush().map_err(write_failure)?;
    Ok(())
}

fn read_excel(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(read_failure)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FastmigError::ReadFailure("workbook has no worksheets".to_owned()))?
        .map_err(read_failure)?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::default());
    };
    let headers = dedupe_headers(header_row.iter().enumerate().map(|(idx, cell)| {
        excel_value(cell)
            .render()
            .unwrap_or_else(|| format!("Unnamed: {idx}"))
    }));

    let mut cells: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (idx, column) in cells.iter_mut().enumerate() {
            column.push(row.get(idx).map_or(Value::Null, excel_value));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| unify_cell_column(name, values))
        .collect();
    Table::new(columns)
}

fn excel_value(cell: &Data) -> Value {
    match cell {
        Data::Int(i) => Value::Integer(*i),
        Data::Float(x) => Value::Decimal(*x),
        Data::Bool(b) => Value::Boolean(*b),
        Data::String(s) if is_na(s) => Value::Null,
        Data::String(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::DateTime(dt) => dt.as_datetime().map_or(Value::Null, Value::Datetime),
        Data::DateTimeIso(s) => parse_datetime(s, None).map_or(Value::Null, Value::Datetime),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

// Picks one declared type for a column of typed cells.
fn unify_cell_column(name: String, values: Vec<Value>) -> Column {
    let kinds: HashSet<DataType> = values.iter().filter_map(Value::kind).collect();
    let numeric = kinds.iter().all(DataType::is_numeric);

    let dtype = if kinds.is_empty() {
        DataType::Decimal
    } else if numeric && values.iter().all(is_integral_or_null) {
        DataType::Integer
    } else if numeric {
        DataType::Decimal
    } else if kinds.len() == 1 {
        kinds.into_iter().next().unwrap_or(DataType::Object)
    } else {
        DataType::Object
    };

    let values = match dtype {
        DataType::Integer => values
            .into_iter()
            .map(|v| match v {
                Value::Decimal(x) if x.is_nan() => Value::Null,
                Value::Decimal(x) => Value::Integer(x as i64),
                other => other,
            })
            .collect(),
        DataType::Decimal => values
            .into_iter()
            .map(|v| match v {
                Value::Integer(i) => Value::Decimal(i as f64),
                other => other,
            })
            .collect(),
        _ => values,
    };
    Column::new(name, dtype, values)
}

fn is_integral_or_null(value: &Value) -> bool {
    match value {
        Value::Integer(_) | Value::Null => true,
        Value::Decimal(x) => x.is_nan() || (x.fract() == 0.0 && x.abs() < 9.0e15),
        _ => false,
    }
}

/// Number format for datetime cells, so Excel (and calamine) read them as dates.
const EXCEL_DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

fn write_excel(table: &Table, path: &Path) -> Result<()> {
    let is_legacy = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xls"));
    if is_legacy {
        return Err(FastmigError::WriteFailure(
            "legacy .xls workbooks can be read but not written; save as .xlsx".to_owned(),
        ));
    }

    let datetime_format = Format::new().set_num_format(EXCEL_DATETIME_FORMAT);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col_idx, column) in table.columns().enumerate() {
        let col = u16::try_from(col_idx).map_err(write_failure)?;
        worksheet
            .write_string(0, col, column.name())
            .map_err(write_failure)?;

        for (row_idx, value) in column.values().iter().enumerate() {
            let row = u32::try_from(row_idx + 1).map_err(write_failure)?;
            match value {
                Value::Integer(i) => worksheet.write_number(row, col, *i as f64),
                Value::Decimal(x) if x.is_finite() => worksheet.write_number(row, col, *x),
                Value::Boolean(b) => worksheet.write_boolean(row, col, *b),
                Value::Datetime(dt) => {
                    worksheet.write_datetime_with_format(row, col, dt, &datetime_format)
                }
                other => match other.render() {
                    Some(text) => worksheet.write_string(row, col, text.as_str()),
                    None => continue,
                },
            }
            .map_err(write_failure)?;
        }
    }

    workbook.save(path).map_err(write_failure)?;
    Ok(())
}
