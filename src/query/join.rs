//! Two-table join queries.

use std::fmt;
use std::str::FromStr;

use super::condition::{ComparisonOperator, condition};
use crate::core::LibraryError;
use crate::schema::validate::{quote_literal, validate_column_ref, validate_identifier};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER JOIN"),
            Self::Left => write!(f, "LEFT JOIN"),
            Self::Right => write!(f, "RIGHT JOIN"),
            Self::Full => write!(f, "FULL JOIN"),
        }
    }
}

impl FromStr for JoinType {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        match upper.strip_suffix(" JOIN").unwrap_or(&upper).trim() {
            "INNER" => Ok(Self::Inner),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            "FULL" => Ok(Self::Full),
            _ => Err(LibraryError::InvalidInput(format!("unknown join type '{s}'"))),
        }
    }
}

/// Optional single WHERE filter of a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinFilter {
    pub column: String,
    pub operator: ComparisonOperator,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinQuery {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    pub join_type: JoinType,
    /// Qualified columns to show; empty selects `*`.
    pub columns: Vec<String>,
    pub filter: Option<JoinFilter>,
}

impl JoinQuery {
    pub fn new(
        left_table: impl Into<String>,
        left_column: impl Into<String>,
        right_table: impl Into<String>,
        right_column: impl Into<String>,
    ) -> Self {
        Self {
            left_table: left_table.into(),
            left_column: left_column.into(),
            right_table: right_table.into(),
            right_column: right_column.into(),
            join_type: JoinType::Inner,
            columns: Vec::new(),
            filter: None,
        }
    }

    #[must_use]
    pub const fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn filter(
        mut self,
        column: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<String>,
    ) -> Self {
        self.filter = Some(JoinFilter {
            column: column.into(),
            operator,
            value: value.into(),
        });
        self
    }

    /// Render the join. A filter whose operator needs a value but has none
    /// is left out.
    pub fn build(&self) -> Result<String, LibraryError> {
        let left = validate_identifier(&self.left_table)?;
        let right = validate_identifier(&self.right_table)?;
        let left_column = validate_identifier(&self.left_column)?;
        let right_column = validate_identifier(&self.right_column)?;

        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| validate_column_ref(c))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ")
        };

        let mut sql = format!(
            "SELECT {projection} FROM {left} {} {right} ON {left}.{left_column} = {right}.{right_column}",
            self.join_type
        );
        if let Some(predicate) = self.filter.as_ref().map(render_filter).transpose()?.flatten() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        Ok(sql)
    }
}

fn render_filter(filter: &JoinFilter) -> Result<Option<String>, LibraryError> {
    let value = filter.value.trim();
    if filter.operator.takes_value() && value.is_empty() {
        return Ok(None);
    }
    let predicate = match filter.operator {
        ComparisonOperator::Like | ComparisonOperator::NotLike => {
            let column = validate_column_ref(&filter.column)?;
            format!("{column} {} {}", filter.operator, quote_literal(&format!("%{value}%")))
        }
        operator => condition(&filter.column, operator, value)?,
    };
    Ok(Some(predicate))
}
