//! Row search over listed entities and result sets.
//!
//! Matching happens on the displayed cell text, so it works the same for
//! every column type. An invalid regular expression matches no row.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::core::{LibraryError, ResultSet};
use crate::render::Record;
use crate::schema::validate::validate_identifier;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchOperator {
    /// Case-insensitive substring.
    #[default]
    Like,
    /// `~`
    Matches,
    /// `~*`
    MatchesInsensitive,
    /// `!~`
    NotMatches,
    /// `!~*`
    NotMatchesInsensitive,
}

impl FromStr for SearchOperator {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LIKE" => Ok(Self::Like),
            "~" => Ok(Self::Matches),
            "~*" => Ok(Self::MatchesInsensitive),
            "!~" => Ok(Self::NotMatches),
            "!~*" => Ok(Self::NotMatchesInsensitive),
            other => Err(LibraryError::InvalidInput(format!(
                "unknown search operator '{other}' (LIKE, ~, ~*, !~, !~*)"
            ))),
        }
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Like => "LIKE",
            Self::Matches => "~",
            Self::MatchesInsensitive => "~*",
            Self::NotMatches => "!~",
            Self::NotMatchesInsensitive => "!~*",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub column: String,
    pub operator: SearchOperator,
    pub pattern: String,
}

enum Matcher {
    All,
    Nothing,
    Substring(String),
    Regex { regex: Regex, negated: bool },
}

impl Matcher {
    fn is_match(&self, text: &str) -> bool {
        match self {
            Self::All => true,
            Self::Nothing => false,
            Self::Substring(needle) => text.to_lowercase().contains(needle.as_str()),
            Self::Regex { regex, negated } => regex.is_match(text) != *negated,
        }
    }
}

impl Search {
    pub fn new(
        column: &str,
        operator: SearchOperator,
        pattern: impl Into<String>,
    ) -> Result<Self, LibraryError> {
        Ok(Self {
            column: validate_identifier(column)?.to_string(),
            operator,
            pattern: pattern.into(),
        })
    }

    fn matcher(&self) -> Matcher {
        if self.pattern.is_empty() {
            return Matcher::All;
        }
        let (insensitive, negated) = match self.operator {
            SearchOperator::Like => return Matcher::Substring(self.pattern.to_lowercase()),
            SearchOperator::Matches => (false, false),
            SearchOperator::MatchesInsensitive => (true, false),
            SearchOperator::NotMatches => (false, true),
            SearchOperator::NotMatchesInsensitive => (true, true),
        };
        match RegexBuilder::new(&self.pattern)
            .case_insensitive(insensitive)
            .build()
        {
            Ok(regex) => Matcher::Regex { regex, negated },
            Err(e) => {
                warn!("Invalid search pattern '{}': {e}", self.pattern);
                Matcher::Nothing
            }
        }
    }

    /// Whether one cell's text passes. An empty pattern passes everything.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.matcher().is_match(text)
    }

    fn position<'a>(&self, mut headers: impl Iterator<Item = &'a str>) -> Result<usize, LibraryError> {
        headers
            .position(|h| h.eq_ignore_ascii_case(&self.column))
            .ok_or_else(|| LibraryError::InvalidInput(format!("no column '{}' to search", self.column)))
    }

    pub fn filter_records<T: Record>(&self, items: Vec<T>) -> Result<Vec<T>, LibraryError> {
        let idx = self.position(T::HEADERS.iter().copied())?;
        let matcher = self.matcher();
        Ok(items
            .into_iter()
            .filter(|item| item.cells().get(idx).is_some_and(|cell| matcher.is_match(cell)))
            .collect())
    }

    pub fn filter_result_set(&self, rs: &ResultSet) -> Result<ResultSet, LibraryError> {
        let idx = self.position(rs.columns.iter().map(String::as_str))?;
        let matcher = self.matcher();
        let rows = rs
            .rows
            .iter()
            .filter(|row| {
                row.get(idx)
                    .is_some_and(|value| matcher.is_match(&value.display_cell()))
            })
            .cloned()
            .collect();
        Ok(ResultSet::new(rs.columns.clone(), rows))
    }
}

impl fmt::Display for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.column, self.operator, self.pattern)
    }
}
