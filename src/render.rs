//! Text output for result sets and entity lists.

use comfy_table::{Cell, Table, presets::UTF8_FULL};
use serde::Serialize;

use crate::core::{Author, Book, BookAuthor, ColumnInfo, ConstraintInfo, Issue, LibraryError, Reader, ResultSet};

fn opt<T: ToString>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

/// Something that renders as one table row.
pub trait Record {
    const HEADERS: &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

impl Record for Author {
    const HEADERS: &'static [&'static str] =
        &["author_id", "last_name", "first_name", "patronymic", "birth_year", "country"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.last_name.clone(),
            self.first_name.clone(),
            opt(self.patronymic.as_ref()),
            opt(self.birth_year.as_ref()),
            opt(self.country.as_ref()),
        ]
    }
}

impl Record for Book {
    const HEADERS: &'static [&'static str] =
        &["book_id", "title", "publication_year", "genre", "isbn", "available_copies"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            opt(self.publication_year.as_ref()),
            opt(self.genre.as_ref()),
            opt(self.isbn.as_ref()),
            self.available_copies.to_string(),
        ]
    }
}

impl Record for Reader {
    const HEADERS: &'static [&'static str] =
        &["reader_id", "last_name", "first_name", "patronymic", "ticket_number", "registration_date"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.last_name.clone(),
            self.first_name.clone(),
            opt(self.patronymic.as_ref()),
            self.ticket_number.clone(),
            opt(self.registration_date.as_ref()),
        ]
    }
}

impl Record for Issue {
    const HEADERS: &'static [&'static str] =
        &["issue_id", "book_id", "reader_id", "issue_date", "return_date"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.book_id.to_string(),
            self.reader_id.to_string(),
            self.issue_date.to_string(),
            opt(self.return_date.as_ref()),
        ]
    }
}

impl Record for BookAuthor {
    const HEADERS: &'static [&'static str] = &["book_id", "author_id"];

    fn cells(&self) -> Vec<String> {
        vec![self.book_id.to_string(), self.author_id.to_string()]
    }
}

impl Record for ColumnInfo {
    const HEADERS: &'static [&'static str] = &["column_name", "data_type", "nullable", "default"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.data_type.clone(),
            if self.nullable { "YES" } else { "NO" }.to_string(),
            opt(self.default.as_ref()),
        ]
    }
}

impl Record for ConstraintInfo {
    const HEADERS: &'static [&'static str] = &["constraint_name", "constraint_type"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), self.constraint_type.clone()]
    }
}

fn grid<H, R>(headers: H, rows: R, count: usize) -> String
where
    H: IntoIterator,
    H::Item: Into<Cell>,
    R: IntoIterator<Item = Vec<String>>,
{
    if count == 0 {
        return "(0 rows)".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(headers);
    for row in rows {
        table.add_row(row);
    }
    let noun = if count == 1 { "row" } else { "rows" };
    format!("{table}\n({count} {noun})")
}

#[must_use]
pub fn records<T: Record>(items: &[T]) -> String {
    grid(
        T::HEADERS.iter().copied(),
        items.iter().map(Record::cells),
        items.len(),
    )
}

/// Grid of an ad-hoc result; NULL cells are blank.
#[must_use]
pub fn result_set(rs: &ResultSet) -> String {
    grid(
        rs.columns.iter().map(String::as_str),
        rs.rows
            .iter()
            .map(|row| row.values.iter().map(|v| v.display_cell()).collect()),
        rs.len(),
    )
}

pub fn result_set_json(rs: &ResultSet) -> Result<String, LibraryError> {
    Ok(serde_json::to_string_pretty(&rs.to_json())?)
}

pub fn records_json<T: Serialize>(items: &[T]) -> Result<String, LibraryError> {
    Ok(serde_json::to_string_pretty(items)?)
}
