use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::LibraryError;
use super::row::Row;
use super::value::Value;

/// A loan record: one book lent to one reader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub id: i32,
    pub book_id: i32,
    pub reader_id: i32,
    pub issue_date: NaiveDate,
    /// NULL while the book is still checked out.
    pub return_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewIssue {
    pub book_id: i32,
    pub reader_id: i32,
    pub issue_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

impl Issue {
    pub fn from_row(row: &Row) -> Result<Self, LibraryError> {
        Ok(Self {
            id: row.int4(0)?,
            book_id: row.int4(1)?,
            reader_id: row.int4(2)?,
            issue_date: row.date(3)?,
            return_date: row.opt_date(4)?,
        })
    }

    #[must_use]
    pub const fn is_returned(&self) -> bool {
        self.return_date.is_some()
    }
}

impl NewIssue {
    pub const fn new(
        book_id: i32,
        reader_id: i32,
        issue_date: NaiveDate,
        return_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            book_id,
            reader_id,
            issue_date,
            return_date,
        }
    }

    /// Parameters in `book_id, reader_id, issue_date, return_date` order.
    #[must_use]
    pub fn params(&self) -> Vec<Value> {
        vec![
            Value::from(self.book_id),
            Value::from(self.reader_id),
            Value::from(self.issue_date),
            Value::from(self.return_date),
        ]
    }
}
