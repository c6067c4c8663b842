use chrono::NaiveDate;
use serde::Serialize;

use super::error::LibraryError;
use super::value::Value;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub const fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    fn cell(&self, idx: usize) -> Result<&Value, LibraryError> {
        self.values
            .get(idx)
            .ok_or_else(|| LibraryError::Decode(format!("row has no column {idx}")))
    }

    pub fn int(&self, idx: usize) -> Result<i64, LibraryError> {
        self.opt_int(idx)?
            .ok_or_else(|| LibraryError::Decode(format!("column {idx} is NULL")))
    }

    pub fn opt_int(&self, idx: usize) -> Result<Option<i64>, LibraryError> {
        match self.cell(idx)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            other => Err(LibraryError::Decode(format!(
                "column {idx}: expected integer, got {other:?}"
            ))),
        }
    }

    /// Integer column that must fit an `INTEGER` / `SERIAL` (int4).
    pub fn int4(&self, idx: usize) -> Result<i32, LibraryError> {
        let v = self.int(idx)?;
        i32::try_from(v).map_err(|_| LibraryError::Decode(format!("column {idx}: {v} out of range")))
    }

    pub fn opt_int4(&self, idx: usize) -> Result<Option<i32>, LibraryError> {
        self.opt_int(idx)?
            .map(|v| {
                i32::try_from(v)
                    .map_err(|_| LibraryError::Decode(format!("column {idx}: {v} out of range")))
            })
            .transpose()
    }

    pub fn text(&self, idx: usize) -> Result<String, LibraryError> {
        self.opt_text(idx)?
            .ok_or_else(|| LibraryError::Decode(format!("column {idx} is NULL")))
    }

    pub fn opt_text(&self, idx: usize) -> Result<Option<String>, LibraryError> {
        match self.cell(idx)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            other => Err(LibraryError::Decode(format!(
                "column {idx}: expected text, got {other:?}"
            ))),
        }
    }

    pub fn date(&self, idx: usize) -> Result<NaiveDate, LibraryError> {
        self.opt_date(idx)?
            .ok_or_else(|| LibraryError::Decode(format!("column {idx} is NULL")))
    }

    pub fn opt_date(&self, idx: usize) -> Result<Option<NaiveDate>, LibraryError> {
        match self.cell(idx)? {
            Value::Null => Ok(None),
            Value::Date(d) => Ok(Some(*d)),
            other => Err(LibraryError::Decode(format!(
                "column {idx}: expected date, got {other:?}"
            ))),
        }
    }
}

/// Column names plus rows, as returned by an ad-hoc SELECT.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub const fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Rows as `column -> value` objects, the shape used for `--json` output.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .zip(&row.values)
                    .map(|(name, value)| {
                        (
                            name.clone(),
                            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}
