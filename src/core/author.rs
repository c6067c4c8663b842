use serde::{Deserialize, Serialize};

use super::error::LibraryError;
use super::row::Row;
use super::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: i32,
    pub last_name: String,
    pub first_name: String,
    pub patronymic: Option<String>,
    pub birth_year: Option<i32>,
    pub country: Option<String>,
}

/// Column values for inserting or updating an author.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAuthor {
    pub last_name: String,
    pub first_name: String,
    pub patronymic: Option<String>,
    pub birth_year: Option<i32>,
    pub country: Option<String>,
}

impl Author {
    pub fn from_row(row: &Row) -> Result<Self, LibraryError> {
        Ok(Self {
            id: row.int4(0)?,
            last_name: row.text(1)?,
            first_name: row.text(2)?,
            patronymic: row.opt_text(3)?,
            birth_year: row.opt_int4(4)?,
            country: row.opt_text(5)?,
        })
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        match self.patronymic.as_deref() {
            Some(p) if !p.is_empty() => format!("{} {} {}", self.last_name, self.first_name, p),
            _ => format!("{} {}", self.last_name, self.first_name),
        }
    }
}

impl NewAuthor {
    pub fn new(
        last_name: impl Into<String>,
        first_name: impl Into<String>,
        patronymic: Option<&str>,
        birth_year: Option<i32>,
        country: Option<&str>,
    ) -> Self {
        Self {
            last_name: last_name.into(),
            first_name: first_name.into(),
            patronymic: patronymic.map(str::to_string),
            birth_year,
            country: country.map(str::to_string),
        }
    }

    /// Parameters in `last_name, first_name, patronymic, birth_year, country` order.
    #[must_use]
    pub fn params(&self) -> Vec<Value> {
        vec![
            Value::from(&self.last_name),
            Value::from(&self.first_name),
            Value::from(self.patronymic.clone()),
            Value::from(self.birth_year),
            Value::from(self.country.clone()),
        ]
    }
}
