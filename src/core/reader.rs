use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::LibraryError;
use super::row::Row;
use super::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reader {
    pub id: i32,
    pub last_name: String,
    pub first_name: String,
    pub patronymic: Option<String>,
    pub ticket_number: String,
    pub registration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewReader {
    pub last_name: String,
    pub first_name: String,
    pub patronymic: Option<String>,
    pub ticket_number: String,
    /// `None` lets the database default (`CURRENT_DATE`) apply on insert.
    pub registration_date: Option<NaiveDate>,
}

impl Reader {
    pub fn from_row(row: &Row) -> Result<Self, LibraryError> {
        Ok(Self {
            id: row.int4(0)?,
            last_name: row.text(1)?,
            first_name: row.text(2)?,
            patronymic: row.opt_text(3)?,
            ticket_number: row.text(4)?,
            registration_date: row.opt_date(5)?,
        })
    }
}

/// Letters (Latin or Cyrillic), digits and spaces.
fn is_plain_text(text: &str) -> bool {
    text.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || c.is_whitespace()
            || matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
    })
}

impl NewReader {
    pub fn new(
        last_name: impl Into<String>,
        first_name: impl Into<String>,
        patronymic: Option<&str>,
        ticket_number: impl Into<String>,
        registration_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            last_name: last_name.into(),
            first_name: first_name.into(),
            patronymic: patronymic.map(str::to_string),
            ticket_number: ticket_number.into(),
            registration_date,
        }
    }

    /// Names and the ticket number hold only letters, digits and spaces.
    pub fn validate(&self) -> Result<(), LibraryError> {
        let fields = [
            ("last name", self.last_name.as_str()),
            ("first name", self.first_name.as_str()),
            ("patronymic", self.patronymic.as_deref().unwrap_or_default()),
            ("ticket number", self.ticket_number.as_str()),
        ];
        match fields.iter().find(|(_, text)| !is_plain_text(text)) {
            Some((field, text)) => Err(LibraryError::InvalidInput(format!(
                "reader {field} '{text}' may contain only letters, digits and spaces"
            ))),
            None => Ok(()),
        }
    }

    /// Parameters in `last_name, first_name, patronymic, ticket_number, registration_date` order.
    #[must_use]
    pub fn params(&self) -> Vec<Value> {
        vec![
            Value::from(&self.last_name),
            Value::from(&self.first_name),
            Value::from(self.patronymic.clone()),
            Value::from(&self.ticket_number),
            Value::from(self.registration_date),
        ]
    }
}
