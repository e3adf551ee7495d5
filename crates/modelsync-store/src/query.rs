//! Typed parameters and rows for the [`QueryEngine`](crate::QueryEngine) contract.

use crate::error::{Result, StoreError};

/// A single SQL parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Rows returned by a query, with their column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows with by-name column access.
    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |values| RowRef {
            columns: &self.columns,
            values,
        })
    }

    pub fn first(&self) -> Option<RowRef<'_>> {
        self.iter().next()
    }
}

/// A borrowed row. Accessors fail with [`StoreError::InvalidData`] on a
/// missing column or a value of the wrong type.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [SqlValue],
}

impl<'a> RowRef<'a> {
    pub fn get(&self, column: &str) -> Result<&'a SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| StoreError::InvalidData(format!("missing column: {}", column)))
    }

    pub fn text(&self, column: &str) -> Result<&'a str> {
        match self.get(column)? {
            SqlValue::Text(s) => Ok(s),
            other => Err(mistyped(column, "text", other)),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64> {
        match self.get(column)? {
            SqlValue::Integer(v) => Ok(*v),
            other => Err(mistyped(column, "integer", other)),
        }
    }

    /// Integer column that may be NULL (e.g. an aggregate over no rows).
    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>> {
        match self.get(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(v) => Ok(Some(*v)),
            other => Err(mistyped(column, "integer", other)),
        }
    }
}

fn mistyped(column: &str, expected: &str, got: &SqlValue) -> StoreError {
    StoreError::InvalidData(format!(
        "column {} expected {}, got {}",
        column,
        expected,
        got.type_name()
    ))
}
