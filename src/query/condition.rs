//! WHERE and HAVING fragments for the request builder.

use std::fmt;
use std::str::FromStr;

use super::builder::contains_aggregate;
use crate::core::LibraryError;
use crate::schema::validate::{quote_literal, validate_column_ref, validate_identifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
}

impl ComparisonOperator {
    /// Operators offered by the query form, in display order.
    pub const ALL: [Self; 13] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Lt,
        Self::Ge,
        Self::Le,
        Self::Like,
        Self::NotLike,
        Self::In,
        Self::NotIn,
        Self::Between,
        Self::IsNull,
        Self::IsNotNull,
    ];

    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        };
        f.write_str(text)
    }
}

impl FromStr for ComparisonOperator {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        match normalized.as_str() {
            "<>" => Ok(Self::Ne),
            other => Self::ALL
                .into_iter()
                .find(|op| op.to_string() == other)
                .ok_or_else(|| LibraryError::InvalidInput(format!("unknown operator '{s}'"))),
        }
    }
}

/// `column op value` with the value quoted as a string literal.
///
/// IN / NOT IN split the value on commas; BETWEEN expects `low AND high`;
/// IS [NOT] NULL ignore the value.
pub fn condition(column: &str, operator: ComparisonOperator, value: &str) -> Result<String, LibraryError> {
    let column = validate_column_ref(column)?;
    if !operator.takes_value() {
        return Ok(format!("{column} {operator}"));
    }

    let value = value.trim();
    if value.is_empty() {
        return Err(LibraryError::InvalidInput(format!("{operator} needs a value")));
    }
    let rendered = match operator {
        ComparisonOperator::In | ComparisonOperator::NotIn => quoted_list(value),
        ComparisonOperator::Between => {
            let (low, high) = split_between(value).ok_or_else(|| {
                LibraryError::InvalidInput("BETWEEN expects 'value1 AND value2'".to_string())
            })?;
            format!("{} AND {}", quote_literal(low), quote_literal(high))
        }
        _ => quote_literal(value),
    };
    Ok(format!("{column} {operator} {rendered}"))
}

/// `('a', 'b', 'c')` from `a, b, c`.
#[must_use]
pub fn quoted_list(value: &str) -> String {
    let items = value
        .split(',')
        .map(|v| quote_literal(v.trim()))
        .collect::<Vec<_>>();
    format!("({})", items.join(", "))
}

fn split_between(value: &str) -> Option<(&str, &str)> {
    let upper = value.to_ascii_uppercase();
    let mut parts = upper.match_indices(" AND ");
    let (pos, sep) = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let low = value[..pos].trim();
    let high = value[pos + sep.len()..].trim();
    (!low.is_empty() && !high.is_empty()).then_some((low, high))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryOperator {
    In,
    NotIn,
    Exists,
    NotExists,
    /// `outer <op> ANY (...)`
    Any(ComparisonOperator),
    /// `outer <op> ALL (...)`
    All(ComparisonOperator),
    Compare(ComparisonOperator),
}

impl SubqueryOperator {
    #[must_use]
    pub const fn is_exists(self) -> bool {
        matches!(self, Self::Exists | Self::NotExists)
    }
}

impl fmt::Display for SubqueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::NotIn => write!(f, "NOT IN"),
            Self::Exists => write!(f, "EXISTS"),
            Self::NotExists => write!(f, "NOT EXISTS"),
            Self::Any(op) => write!(f, "{op} ANY"),
            Self::All(op) => write!(f, "{op} ALL"),
            Self::Compare(op) => write!(f, "{op}"),
        }
    }
}

impl FromStr for SubqueryOperator {
    type Err = LibraryError;

    /// Accepts `IN`, `NOT IN`, `EXISTS`, `NOT EXISTS`, `ANY`, `ALL`,
    /// `> ANY`, `<= ALL`, and the scalar comparisons `= != > < >= <=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        let scalar = |op: &str| -> Result<ComparisonOperator, LibraryError> {
            match op.parse::<ComparisonOperator>()? {
                op @ (ComparisonOperator::Eq
                | ComparisonOperator::Ne
                | ComparisonOperator::Gt
                | ComparisonOperator::Lt
                | ComparisonOperator::Ge
                | ComparisonOperator::Le) => Ok(op),
                other => Err(LibraryError::InvalidInput(format!(
                    "'{other}' cannot compare against a subquery"
                ))),
            }
        };
        match normalized.as_str() {
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            "EXISTS" => Ok(Self::Exists),
            "NOT EXISTS" => Ok(Self::NotExists),
            "ANY" => Ok(Self::Any(ComparisonOperator::Eq)),
            "ALL" => Ok(Self::All(ComparisonOperator::Eq)),
            other => {
                if let Some(op) = other.strip_suffix(" ANY") {
                    Ok(Self::Any(scalar(op)?))
                } else if let Some(op) = other.strip_suffix(" ALL") {
                    Ok(Self::All(scalar(op)?))
                } else {
                    Ok(Self::Compare(scalar(other)?))
                }
            }
        }
    }
}

/// A nested SELECT used as a WHERE predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subquery {
    pub operator: SubqueryOperator,
    /// Left-hand side; required by everything except EXISTS / NOT EXISTS.
    pub outer: Option<String>,
    pub table: String,
    pub column: String,
    /// Inner WHERE text. A correlated subquery references outer columns here.
    pub condition: Option<String>,
    pub correlated: bool,
}

impl Subquery {
    pub fn new(operator: SubqueryOperator, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            operator,
            outer: None,
            table: table.into(),
            column: column.into(),
            condition: None,
            correlated: false,
        }
    }

    #[must_use]
    pub fn outer(mut self, outer: impl Into<String>) -> Self {
        self.outer = Some(outer.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into()).filter(|c: &String| !c.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn correlated(mut self, correlated: bool) -> Self {
        self.correlated = correlated;
        self
    }

    pub fn render(&self) -> Result<String, LibraryError> {
        let table = validate_identifier(&self.table)?;
        let inner_select = if self.operator.is_exists() {
            "1"
        } else {
            validate_column_ref(&self.column)?
        };

        let mut inner = format!("SELECT {inner_select} FROM {table}");
        if let Some(condition) = &self.condition {
            inner.push_str(" WHERE ");
            inner.push_str(condition.trim());
        }

        if self.operator.is_exists() {
            return Ok(format!("{} ({inner})", self.operator));
        }
        let outer = self
            .outer
            .as_deref()
            .ok_or_else(|| LibraryError::InvalidInput(format!("{} needs a left-hand column", self.operator)))
            .and_then(validate_column_ref)?;
        Ok(format!("{outer} {} ({inner})", self.operator))
    }
}

/// Reject HAVING text without an aggregate call or with statement keywords.
pub fn validate_having(condition: &str) -> Result<&str, LibraryError> {
    const FORBIDDEN: [&str; 6] = ["DROP", "DELETE", "UPDATE", "INSERT", "CREATE", "ALTER"];

    let condition = condition.trim();
    if condition.is_empty() {
        return Err(LibraryError::InvalidInput("HAVING condition is empty".to_string()));
    }
    if !contains_aggregate(condition) {
        return Err(LibraryError::InvalidInput(
            "HAVING condition must use COUNT, SUM, AVG, MIN or MAX".to_string(),
        ));
    }
    let upper = condition.to_uppercase();
    if let Some(word) = FORBIDDEN.iter().find(|w| upper.contains(*w)) {
        return Err(LibraryError::InvalidInput(format!(
            "HAVING condition may not contain {word}"
        )));
    }
    Ok(condition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conditions() {
        assert_eq!(
            condition("genre", ComparisonOperator::Eq, "Novel").unwrap(),
            "genre = 'Novel'"
        );
        assert_eq!(
            condition("authors.last_name", ComparisonOperator::Like, "O'%").unwrap(),
            "authors.last_name LIKE 'O''%'"
        );
        assert_eq!(
            condition("return_date", ComparisonOperator::IsNull, "ignored").unwrap(),
            "return_date IS NULL"
        );
        assert_eq!(
            condition("return_date", ComparisonOperator::IsNotNull, "").unwrap(),
            "return_date IS NOT NULL"
        );
    }

    #[test]
    fn test_list_and_range_conditions() {
        assert_eq!(
            condition("genre", ComparisonOperator::In, "Novel, Fantasy").unwrap(),
            "genre IN ('Novel', 'Fantasy')"
        );
        assert_eq!(
            condition("genre", ComparisonOperator::NotIn, "Dystopia").unwrap(),
            "genre NOT IN ('Dystopia')"
        );
        assert_eq!(
            condition("publication_year", ComparisonOperator::Between, "1800 and 1900").unwrap(),
            "publication_year BETWEEN '1800' AND '1900'"
        );
        assert!(condition("publication_year", ComparisonOperator::Between, "1800").is_err());
        assert!(condition("publication_year", ComparisonOperator::Between, "1 AND 2 AND 3").is_err());
    }

    #[test]
    fn test_condition_requires_value_and_column() {
        assert!(condition("genre", ComparisonOperator::Eq, "  ").is_err());
        assert!(condition("genre; DROP TABLE books", ComparisonOperator::Eq, "x").is_err());
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!("not  in".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::NotIn);
        assert_eq!("<>".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::Ne);
        assert_eq!("is not null".parse::<ComparisonOperator>().unwrap(), ComparisonOperator::IsNotNull);
        assert!("~".parse::<ComparisonOperator>().is_err());
    }

    #[test]
    fn test_exists_subquery_selects_one() {
        let sub = Subquery::new(SubqueryOperator::Exists, "issues", "issue_id")
            .filter("issues.book_id = books.book_id")
            .correlated(true);
        assert_eq!(
            sub.render().unwrap(),
            "EXISTS (SELECT 1 FROM issues WHERE issues.book_id = books.book_id)"
        );
        let sub = Subquery::new(SubqueryOperator::NotExists, "issues", "");
        assert_eq!(sub.render().unwrap(), "NOT EXISTS (SELECT 1 FROM issues)");
    }

    #[test]
    fn test_value_subqueries() {
        let sub = Subquery::new(SubqueryOperator::In, "book_authors", "book_id").outer("book_id");
        assert_eq!(
            sub.render().unwrap(),
            "book_id IN (SELECT book_id FROM book_authors)"
        );

        let op: SubqueryOperator = "> all".parse().unwrap();
        let sub = Subquery::new(op, "books", "available_copies")
            .outer("available_copies")
            .filter("genre = 'Novel'");
        assert_eq!(
            sub.render().unwrap(),
            "available_copies > ALL (SELECT available_copies FROM books WHERE genre = 'Novel')"
        );

        assert!(Subquery::new(SubqueryOperator::In, "books", "book_id").render().is_err());
        assert!("LIKE ANY".parse::<SubqueryOperator>().is_err());
    }

    #[test]
    fn test_validate_having() {
        assert!(validate_having("COUNT(*) > 5 OR AVG(rating) > 4.0").is_ok());
        assert!(validate_having("genre = 'Novel'").is_err());
        assert!(validate_having("COUNT(*) > 1; DROP TABLE books").is_err());
        assert!(validate_having("sum(x) > 0 AND (delete)").is_err());
        assert!(validate_having("").is_err());
    }
}
