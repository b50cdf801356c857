//! In-memory table model.
//!
//! A [`Table`] is an ordered list of uniquely named [`Column`]s of equal
//! length. Columns sit behind `Arc`, so cloning a table copies pointers, not
//! cell data: replacing one column produces a new table that still shares
//! every other column buffer with the original. History snapshots rely on this
//! to stay cheap.

pub mod value;

pub use value::{DataType, Value};

use crate::error::{FastmigError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One named, typed attribute of every row.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    dtype: DataType,
    values: Vec<Value>,
    categories: Option<Vec<Arc<str>>>,
}

impl Column {
    /// Plain column. Category columns go through [`Column::categorical`].
    pub fn new(name: impl Into<String>, dtype: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
            categories: None,
        }
    }

    /// Category column over a fixed label set.
    pub fn categorical(
        name: impl Into<String>,
        labels: Vec<Arc<str>>,
        values: Vec<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            dtype: DataType::Category,
            values,
            categories: Some(labels),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Cells in row order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Label set of a category column.
    pub fn categories(&self) -> Option<&[Arc<str>]> {
        self.categories.as_deref()
    }

    /// Missing cells, NaN included.
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    pub fn has_nulls(&self) -> bool {
        self.values.iter().any(Value::is_null)
    }

    /// Rendered text of every row, nulls as `None`.
    pub fn rendered(&self) -> Vec<Option<String>> {
        self.values.iter().map(Value::render).collect()
    }

    fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..self.clone()
        }
    }
}

/// Ordered set of named columns with a uniform row count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<Arc<Column>>,
}

impl Table {
    /// Builds a table, rejecting duplicate names and ragged columns.
    ///
    /// # Errors
    ///
    /// [`FastmigError::DuplicateColumn`] or [`FastmigError::RaggedColumns`].
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        Self::from_shared(columns.into_iter().map(Arc::new).collect())
    }

    fn from_shared(columns: Vec<Arc<Column>>) -> Result<Self> {
        let mut seen = HashSet::new();
        let expected = columns.first().map_or(0, |c| c.len());

        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(FastmigError::DuplicateColumn(column.name().to_owned()));
            }
            if column.len() != expected {
                return Err(FastmigError::RaggedColumns {
                    column: column.name().to_owned(),
                    expected,
                    found: column.len(),
                });
            }
        }

        Ok(Self { columns })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().map(Arc::as_ref)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Looks a column up by name.
    ///
    /// # Errors
    ///
    /// [`FastmigError::ColumnNotFound`] if no column has that name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .map(Arc::as_ref)
            .ok_or_else(|| FastmigError::ColumnNotFound(name.to_owned()))
    }

    /// New table with the same-named column swapped for `column`.
    ///
    /// Every other column buffer is shared with `self`.
    ///
    /// # Errors
    ///
    /// [`FastmigError::ColumnNotFound`] if no column has that name, or
    /// [`FastmigError::RaggedColumns`] if the length differs from the table height.
    pub fn with_column(&self, column: Column) -> Result<Self> {
        let idx = self
            .column_index(column.name())
            .ok_or_else(|| FastmigError::ColumnNotFound(column.name().to_owned()))?;

        if column.len() != self.height() {
            return Err(FastmigError::RaggedColumns {
                column: column.name().to_owned(),
                expected: self.height(),
                found: column.len(),
            });
        }

        let mut columns = self.columns.clone();
        if let Some(slot) = columns.get_mut(idx) {
            *slot = Arc::new(column);
        }
        Ok(Self { columns })
    }

    /// True when both tables point at the same buffer for `name`.
    pub fn shares_column(&self, other: &Self, name: &str) -> bool {
        let find = |t: &Self| t.columns.iter().find(|c| c.name() == name).cloned();
        match (find(self), find(other)) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    /// First `n` rows, for previews.
    pub fn head(&self, n: usize) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = c.values().iter().take(n).cloned().collect();
                Arc::new(Column {
                    values,
                    ..Column::clone(c)
                })
            })
            .collect();
        Self { columns }
    }

    /// Rendered cells of one row in column order.
    pub fn row(&self, row: usize) -> Option<Vec<Option<String>>> {
        if row >= self.height() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| c.get(row).and_then(Value::render))
                .collect(),
        )
    }

    /// Renames columns according to `mapping` (old name to new name).
    ///
    /// # Errors
    ///
    /// [`FastmigError::ColumnNotFound`] for a source name not in the table, or
    /// [`FastmigError::DuplicateColumn`] if two columns end up with one name.
    pub fn rename_columns(&self, mapping: &HashMap<String, String>) -> Result<Self> {
        let mut sources: Vec<&String> = mapping.keys().collect();
        sources.sort();
        for source in sources {
            if self.column_index(source).is_none() {
                return Err(FastmigError::ColumnNotFound(source.clone()));
            }
        }

        let columns = self
            .columns
            .iter()
            .map(|c| match mapping.get(c.name()) {
                Some(new_name) if new_name != c.name() => Arc::new(c.renamed(new_name)),
                _ => Arc::clone(c),
            })
            .collect();

        Self::from_shared(columns)
    }
}
