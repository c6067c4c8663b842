use serde::{Deserialize, Serialize};

use super::error::LibraryError;
use super::row::Row;
use super::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    pub isbn: Option<String>,
    pub available_copies: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    pub isbn: Option<String>,
    pub available_copies: i32,
}

impl Default for NewBook {
    fn default() -> Self {
        Self {
            title: String::new(),
            publication_year: None,
            genre: None,
            isbn: None,
            available_copies: 1,
        }
    }
}

impl Book {
    pub fn from_row(row: &Row) -> Result<Self, LibraryError> {
        Ok(Self {
            id: row.int4(0)?,
            title: row.text(1)?,
            publication_year: row.opt_int4(2)?,
            genre: row.opt_text(3)?,
            isbn: row.opt_text(4)?,
            available_copies: row.int4(5)?,
        })
    }
}

impl NewBook {
    pub fn new(
        title: impl Into<String>,
        publication_year: Option<i32>,
        genre: Option<&str>,
        isbn: Option<&str>,
        available_copies: i32,
    ) -> Self {
        Self {
            title: title.into(),
            publication_year,
            genre: genre.map(str::to_string),
            isbn: isbn.map(str::to_string),
            available_copies,
        }
    }

    /// Parameters in `title, publication_year, genre, isbn, available_copies` order.
    #[must_use]
    pub fn params(&self) -> Vec<Value> {
        vec![
            Value::from(&self.title),
            Value::from(self.publication_year),
            Value::from(self.genre.clone()),
            Value::from(self.isbn.clone()),
            Value::from(self.available_copies),
        ]
    }
}
