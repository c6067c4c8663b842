//! SELECT statement assembly from accumulated clause fragments.
//!
//! Fragments are raw SQL text and are not validated here; `Condition`,
//! `Subquery` and `validate_having` produce and check them.

use std::fmt;
use std::str::FromStr;

use crate::core::LibraryError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(LibraryError::InvalidInput(format!("unknown sort direction '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub const ALL: [Self; 5] = [Self::Count, Self::Sum, Self::Avg, Self::Min, Self::Max];
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => write!(f, "COUNT"),
            Self::Sum => write!(f, "SUM"),
            Self::Avg => write!(f, "AVG"),
            Self::Min => write!(f, "MIN"),
            Self::Max => write!(f, "MAX"),
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "COUNT" => Ok(Self::Count),
            "SUM" => Ok(Self::Sum),
            "AVG" => Ok(Self::Avg),
            "MIN" => Ok(Self::Min),
            "MAX" => Ok(Self::Max),
            other => Err(LibraryError::InvalidInput(format!("unknown aggregate function '{other}'"))),
        }
    }
}

/// One aggregate expression, e.g. `AVG(publication_year) AS avg_year`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    /// Empty or `*` means every row.
    pub column: String,
    pub alias: Option<String>,
}

impl Aggregate {
    #[must_use]
    pub fn count_all() -> Self {
        Self {
            function: AggregateFunction::Count,
            column: "*".to_string(),
            alias: None,
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column = match self.column.trim() {
            "" => "*",
            column => column,
        };
        write!(f, "{}({column})", self.function)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

/// Accumulates clause fragments and renders them as one SELECT.
///
/// `build` leaves the state untouched, so the same builder can render
/// repeatedly; call `reset` before composing a different query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestBuilder {
    columns: Vec<String>,
    table: String,
    conditions: Vec<String>,
    group_by: Vec<String>,
    having: Vec<String>,
    order_by: Vec<String>,
    aggregate: Option<Aggregate>,
}

impl RequestBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the projection. An empty list renders as `*`.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = table.into();
        self
    }

    /// Add a predicate; predicates are AND-joined.
    pub fn where_(&mut self, predicate: impl Into<String>) -> &mut Self {
        self.conditions.push(predicate.into());
        self
    }

    pub fn group_by(&mut self, column: impl Into<String>) -> &mut Self {
        self.group_by.push(column.into());
        self
    }

    /// Add a group predicate; predicates are AND-joined.
    pub fn having(&mut self, predicate: impl Into<String>) -> &mut Self {
        self.having.push(predicate.into());
        self
    }

    pub fn order_by(&mut self, column: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.order_by.push(format!("{} {direction}", column.into()));
        self
    }

    /// Set the single aggregate expression, replacing any earlier one.
    pub fn aggregate(&mut self, function: AggregateFunction, column: impl Into<String>) -> &mut Self {
        self.aggregate = Some(Aggregate {
            function,
            column: column.into(),
            alias: None,
        });
        self
    }

    pub fn aggregate_as(
        &mut self,
        function: AggregateFunction,
        column: impl Into<String>,
        alias: impl Into<String>,
    ) -> &mut Self {
        self.aggregate = Some(Aggregate {
            function,
            column: column.into(),
            alias: Some(alias.into()),
        });
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// The aggregate that will be rendered: the explicit one, or `COUNT(*)`
    /// when grouping and no projected column already aggregates.
    fn effective_aggregate(&self) -> Option<Aggregate> {
        if self.aggregate.is_some() {
            return self.aggregate.clone();
        }
        let projects_aggregate = self.columns.iter().any(|c| contains_aggregate(c));
        (self.is_grouped() && !projects_aggregate).then(Aggregate::count_all)
    }

    fn projection(&self) -> String {
        let mut items = if !self.columns.is_empty() {
            self.columns.clone()
        } else if self.is_grouped() {
            self.group_by.clone()
        } else {
            Vec::new()
        };
        if let Some(aggregate) = self.effective_aggregate() {
            items.push(aggregate.to_string());
        }
        if items.is_empty() {
            "*".to_string()
        } else {
            items.join(", ")
        }
    }

    /// Render SELECT, FROM, WHERE, GROUP BY, HAVING and ORDER BY in that
    /// order, skipping empty clauses.
    #[must_use]
    pub fn build(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.projection(), self.table);
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.having.join(" AND "));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        sql
    }
}

impl fmt::Display for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Whether `text` calls COUNT, SUM, AVG, MIN or MAX (case-insensitive,
/// whitespace allowed before the parenthesis).
#[must_use]
pub fn contains_aggregate(text: &str) -> bool {
    let upper = text.to_uppercase();
    AggregateFunction::ALL.iter().any(|function| {
        let name = function.to_string();
        upper.match_indices(&name).any(|(pos, _)| {
            let before_ok = upper[..pos]
                .chars()
                .next_back()
                .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
            let after_ok = upper[pos + name.len()..].trim_start().starts_with('(');
            before_ok && after_ok
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_from() {
        let mut builder = RequestBuilder::new();
        builder.select(["a", "b"]).from_table("t");
        assert_eq!(builder.build(), "SELECT a, b FROM t");
    }

    #[test]
    fn test_where_joined_with_and_once() {
        let mut builder = RequestBuilder::new();
        builder
            .from_table("books")
            .where_("genre = 'Novel'")
            .where_("available_copies > '2'");
        assert_eq!(
            builder.build(),
            "SELECT * FROM books WHERE genre = 'Novel' AND available_copies > '2'"
        );
        assert_eq!(builder.build().matches(" WHERE ").count(), 1);
    }

    #[test]
    fn test_group_by_defaults_to_count() {
        let mut builder = RequestBuilder::new();
        builder.from_table("books").group_by("genre");
        assert_eq!(builder.build(), "SELECT genre, COUNT(*) FROM books GROUP BY genre");
    }

    #[test]
    fn test_group_by_keeps_projected_aggregate() {
        let mut builder = RequestBuilder::new();
        builder
            .select(["genre", "COUNT(*) AS total"])
            .from_table("books")
            .group_by("genre");
        assert_eq!(
            builder.build(),
            "SELECT genre, COUNT(*) AS total FROM books GROUP BY genre"
        );
    }

    #[test]
    fn test_explicit_aggregate_with_alias() {
        let mut builder = RequestBuilder::new();
        builder
            .select(["genre"])
            .from_table("books")
            .group_by("genre")
            .aggregate_as(AggregateFunction::Avg, "publication_year", "avg_year")
            .having("COUNT(*) > 1");
        assert_eq!(
            builder.build(),
            "SELECT genre, AVG(publication_year) AS avg_year FROM books GROUP BY genre HAVING COUNT(*) > 1"
        );
    }

    #[test]
    fn test_aggregate_alone() {
        let mut builder = RequestBuilder::new();
        builder.from_table("issues").aggregate(AggregateFunction::Count, "");
        assert_eq!(builder.build(), "SELECT COUNT(*) FROM issues");
    }

    #[test]
    fn test_reset_after_build() {
        let mut builder = RequestBuilder::new();
        builder
            .select(["title"])
            .from_table("books")
            .where_("isbn IS NULL")
            .group_by("title")
            .having("COUNT(*) > 1")
            .order_by("title", SortDirection::Desc);
        let first = builder.build();
        assert_eq!(builder.build(), first);

        builder.reset();
        assert_eq!(builder.build(), "SELECT * FROM ");
        assert_eq!(builder, RequestBuilder::default());
    }

    #[test]
    fn test_clause_order_ignores_call_order() {
        let mut builder = RequestBuilder::new();
        builder
            .order_by("total", SortDirection::Desc)
            .having("COUNT(*) >= 1")
            .group_by("reader_id")
            .where_("return_date IS NULL")
            .from_table("issues")
            .select(["reader_id", "COUNT(*) AS total"])
            .order_by("reader_id", SortDirection::Asc);
        assert_eq!(
            builder.build(),
            "SELECT reader_id, COUNT(*) AS total FROM issues WHERE return_date IS NULL \
             GROUP BY reader_id HAVING COUNT(*) >= 1 ORDER BY total DESC, reader_id ASC"
        );
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("down".parse::<SortDirection>().is_err());
        assert_eq!(" avg ".parse::<AggregateFunction>().unwrap(), AggregateFunction::Avg);
        assert!("median".parse::<AggregateFunction>().is_err());
    }

    #[test]
    fn test_contains_aggregate() {
        assert!(contains_aggregate("count(*) > 5"));
        assert!(contains_aggregate("AVG (rating) > 4.0"));
        assert!(!contains_aggregate("discount > 5"));
        assert!(!contains_aggregate("maximum = 3"));
        assert!(!contains_aggregate("genre = 'Novel'"));
    }
}
