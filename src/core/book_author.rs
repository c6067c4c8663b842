use serde::{Deserialize, Serialize};

use super::error::LibraryError;
use super::row::Row;

/// Link row of the many-to-many `book_authors` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BookAuthor {
    pub book_id: i32,
    pub author_id: i32,
}

impl BookAuthor {
    pub const fn new(book_id: i32, author_id: i32) -> Self {
        Self { book_id, author_id }
    }

    pub fn from_row(row: &Row) -> Result<Self, LibraryError> {
        Ok(Self {
            book_id: row.int4(0)?,
            author_id: row.int4(1)?,
        })
    }
}

impl std::fmt::Display for BookAuthor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "book {} / author {}", self.book_id, self.author_id)
    }
}
