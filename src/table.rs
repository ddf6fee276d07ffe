//! Best-effort conversion of JSON bodies into row/column tables.
//!
//! Only flat shapes tabularize: an object of scalars (one row), an array of such
//! objects, or an array of scalars (one `value` column). Anything nested or mixed is
//! rejected and the dispatcher falls back to handing the caller the raw response.

use serde_json::{Map, Value};
use std::fmt;

/// Column name used when an array of scalars becomes a table.
pub const VALUE_COLUMN: &str = "value";

/// A rectangular table of JSON scalars. Missing cells are `Value::Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum TableError {
    Nested { column: String },
    MixedArray,
    NotTabular(&'static str),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Nested { column } => write!(f, "column [{}] holds a nested value", column),
            TableError::MixedArray => write!(f, "array mixes objects and scalars"),
            TableError::NotTabular(kind) => write!(f, "a JSON {} is not tabular", kind),
        }
    }
}

fn is_scalar(v: &Value) -> bool {
    !matches!(v, Value::Array(_) | Value::Object(_))
}

/// Converts a JSON value into a table, forcing singleton objects into one-row tables.
///
/// `{}` is one row with no columns; `[]` is no rows and no columns.
pub(crate) fn tabularize(value: &Value) -> Result<Table, TableError> {
    match value {
        Value::Object(obj) => from_objects(std::iter::once(obj)),
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(Table::default());
            }
            if items.iter().all(Value::is_object) {
                from_objects(items.iter().filter_map(Value::as_object))
            } else if items.iter().all(is_scalar) {
                Ok(Table {
                    columns: vec![VALUE_COLUMN.to_string()],
                    rows: items.iter().map(|v| vec![v.clone()]).collect(),
                })
            } else if items.iter().any(Value::is_object) {
                Err(TableError::MixedArray)
            } else {
                Err(TableError::NotTabular("array of arrays"))
            }
        }
        Value::Null => Err(TableError::NotTabular("null")),
        _ => Err(TableError::NotTabular("scalar")),
    }
}

fn from_objects<'a>(objects: impl Iterator<Item = &'a Map<String, Value>>) -> Result<Table, TableError> {
    let mut columns: Vec<String> = Vec::new();
    let mut records: Vec<&Map<String, Value>> = Vec::new();

    for obj in objects {
        for (key, v) in obj {
            if !is_scalar(v) {
                return Err(TableError::Nested { column: key.clone() });
            }
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
        records.push(obj);
    }

    let rows = records
        .into_iter()
        .map(|obj| {
            columns
                .iter()
                .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(Table { columns, rows })
}
