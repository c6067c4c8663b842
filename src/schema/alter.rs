//! ALTER TABLE operations and live schema introspection.

use serde::Serialize;
use tracing::{error, info, warn};

use super::validate::{parse_data_type, parse_default, validate_identifier};
use crate::core::{ColumnInfo, ConstraintInfo, ConstraintKind, ForeignKey, LibraryError, Value};
use crate::db::session::{SqlSession, finish};

pub const SUCCESS_MESSAGE: &str = "Operation completed successfully";

const LIST_TABLES: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = 'public' ORDER BY table_name";

const LIST_COLUMNS: &str = "SELECT column_name::text, data_type::text, \
     is_nullable::text = 'YES' AS nullable, column_default::text \
     FROM information_schema.columns \
     WHERE table_schema = 'public' AND table_name::text = $1 ORDER BY ordinal_position";

const LIST_CONSTRAINTS: &str = "SELECT constraint_name::text, constraint_type::text \
     FROM information_schema.table_constraints \
     WHERE table_schema = 'public' AND table_name::text = $1 ORDER BY constraint_name";

/// Result of one schema change, shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlterOutcome {
    pub success: bool,
    pub message: String,
}

impl AlterOutcome {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AlterOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Runs schema changes on a borrowed session, one transaction per change.
pub struct AlterTableManager<'a> {
    session: &'a mut dyn SqlSession,
}

impl<'a> AlterTableManager<'a> {
    pub fn new(session: &'a mut dyn SqlSession) -> Self {
        Self { session }
    }

    /// Run `sql` in its own transaction: commit on success, roll back and
    /// report the driver message on failure.
    pub async fn execute_safe(&mut self, sql: &str) -> AlterOutcome {
        info!("Executing schema change: {sql}");
        let result = async {
            self.session.begin().await?;
            let result = self.session.batch_execute(sql).await;
            finish(&mut *self.session, result).await
        }
        .await;

        match result {
            Ok(()) => AlterOutcome::ok(),
            Err(e) => {
                error!("Schema change failed: {e}");
                AlterOutcome::failed(e.to_string())
            }
        }
    }

    async fn run(&mut self, statement: Result<String, LibraryError>) -> AlterOutcome {
        match statement {
            Ok(sql) => self.execute_safe(&sql).await,
            Err(e) => {
                warn!("Schema change rejected: {e}");
                AlterOutcome::failed(e.to_string())
            }
        }
    }

    pub async fn add_column(
        &mut self,
        table: &str,
        column: &str,
        data_type: &str,
        nullable: bool,
        default: Option<&str>,
    ) -> AlterOutcome {
        self.run(add_column_sql(table, column, data_type, nullable, default))
            .await
    }

    /// Dependent views and constraints go with the column (`CASCADE`).
    pub async fn drop_column(&mut self, table: &str, column: &str) -> AlterOutcome {
        let sql = validate_identifier(table).and_then(|table| {
            let column = validate_identifier(column)?;
            Ok(format!("ALTER TABLE {table} DROP COLUMN {column} CASCADE"))
        });
        self.run(sql).await
    }

    pub async fn rename_table(&mut self, old_name: &str, new_name: &str) -> AlterOutcome {
        let sql = validate_identifier(old_name).and_then(|old| {
            let new = validate_identifier(new_name)?;
            Ok(format!("ALTER TABLE {old} RENAME TO {new}"))
        });
        self.run(sql).await
    }

    pub async fn rename_column(&mut self, table: &str, old_name: &str, new_name: &str) -> AlterOutcome {
        let sql = validate_identifier(table).and_then(|table| {
            let old = validate_identifier(old_name)?;
            let new = validate_identifier(new_name)?;
            Ok(format!("ALTER TABLE {table} RENAME COLUMN {old} TO {new}"))
        });
        self.run(sql).await
    }

    pub async fn modify_column_type(&mut self, table: &str, column: &str, new_type: &str) -> AlterOutcome {
        let sql = validate_identifier(table).and_then(|table| {
            let column = validate_identifier(column)?;
            let new_type = parse_data_type(new_type)?;
            Ok(format!("ALTER TABLE {table} ALTER COLUMN {column} TYPE {new_type}"))
        });
        self.run(sql).await
    }

    pub async fn add_constraint(
        &mut self,
        table: &str,
        kind: ConstraintKind,
        name: &str,
        definition: &str,
    ) -> AlterOutcome {
        self.run(add_constraint_sql(table, kind, name, definition)).await
    }

    pub async fn drop_constraint(&mut self, table: &str, name: &str) -> AlterOutcome {
        let sql = validate_identifier(table).and_then(|table| {
            let name = validate_identifier(name)?;
            Ok(format!("ALTER TABLE {table} DROP CONSTRAINT {name}"))
        });
        self.run(sql).await
    }

    pub async fn set_column_nullable(&mut self, table: &str, column: &str, nullable: bool) -> AlterOutcome {
        let action = if nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        let sql = validate_identifier(table).and_then(|table| {
            let column = validate_identifier(column)?;
            Ok(format!("ALTER TABLE {table} ALTER COLUMN {column} {action}"))
        });
        self.run(sql).await
    }

    /// `name` defaults to `fk_<table>_<column>`.
    pub async fn add_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        reference: &ForeignKey,
        name: Option<&str>,
    ) -> AlterOutcome {
        self.run(add_foreign_key_sql(table, column, reference, name)).await
    }

    /// Tables of the `public` schema, sorted by name.
    pub async fn get_tables(&mut self) -> Vec<String> {
        let result = async {
            let rs = self.session.query(LIST_TABLES, &[]).await?;
            rs.rows.iter().map(|row| row.text(0)).collect::<Result<Vec<_>, LibraryError>>()
        }
        .await;
        result.unwrap_or_else(|e| {
            error!("Error listing tables: {e}");
            Vec::new()
        })
    }

    /// Columns of `table` in definition order; empty when the table is unknown.
    pub async fn get_table_columns(&mut self, table: &str) -> Vec<ColumnInfo> {
        let result = async {
            let rs = self.session.query(LIST_COLUMNS, &[Value::from(table)]).await?;
            rs.rows
                .iter()
                .map(|row| {
                    Ok(ColumnInfo {
                        name: row.text(0)?,
                        data_type: row.text(1)?,
                        nullable: matches!(row.get(2), Some(Value::Boolean(true))),
                        default: row.opt_text(3)?,
                    })
                })
                .collect::<Result<Vec<_>, LibraryError>>()
        }
        .await;
        result.unwrap_or_else(|e| {
            error!("Error listing columns of {table}: {e}");
            Vec::new()
        })
    }

    pub async fn get_table_constraints(&mut self, table: &str) -> Vec<ConstraintInfo> {
        let result = async {
            let rs = self.session.query(LIST_CONSTRAINTS, &[Value::from(table)]).await?;
            rs.rows
                .iter()
                .map(|row| {
                    Ok(ConstraintInfo {
                        name: row.text(0)?,
                        constraint_type: row.text(1)?,
                    })
                })
                .collect::<Result<Vec<_>, LibraryError>>()
        }
        .await;
        result.unwrap_or_else(|e| {
            error!("Error listing constraints of {table}: {e}");
            Vec::new()
        })
    }
}

fn add_column_sql(
    table: &str,
    column: &str,
    data_type: &str,
    nullable: bool,
    default: Option<&str>,
) -> Result<String, LibraryError> {
    let table = validate_identifier(table)?;
    let column = validate_identifier(column)?;
    let data_type = parse_data_type(data_type)?;

    let mut sql = format!("ALTER TABLE {table} ADD COLUMN {column} {data_type}");
    if !nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = default.map(str::trim).filter(|d| !d.is_empty()) {
        sql.push_str(" DEFAULT ");
        sql.push_str(&parse_default(default)?);
    }
    Ok(sql)
}

fn add_constraint_sql(
    table: &str,
    kind: ConstraintKind,
    name: &str,
    definition: &str,
) -> Result<String, LibraryError> {
    let table = validate_identifier(table)?;
    let name = validate_identifier(name)?;
    let definition = match kind {
        ConstraintKind::Unique | ConstraintKind::PrimaryKey => column_list(definition)?,
        ConstraintKind::Check => check_expression(definition)?.to_string(),
    };
    Ok(format!("ALTER TABLE {table} ADD CONSTRAINT {name} {kind} ({definition})"))
}

fn add_foreign_key_sql(
    table: &str,
    column: &str,
    reference: &ForeignKey,
    name: Option<&str>,
) -> Result<String, LibraryError> {
    let table = validate_identifier(table)?;
    let column = validate_identifier(column)?;
    let ref_table = validate_identifier(&reference.referenced_table)?;
    let ref_column = validate_identifier(&reference.referenced_column)?;
    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => validate_identifier(name)?.to_string(),
        None => format!("fk_{table}_{column}"),
    };
    Ok(format!(
        "ALTER TABLE {table} ADD CONSTRAINT {name} FOREIGN KEY ({column}) REFERENCES {ref_table}({ref_column})"
    ))
}

/// `a, b, c` for UNIQUE and PRIMARY KEY.
fn column_list(definition: &str) -> Result<String, LibraryError> {
    let columns = definition
        .split(',')
        .map(|c| validate_identifier(c.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns.join(", "))
}

/// A CHECK body: a single expression with balanced parentheses, no
/// statement separators and no comments.
fn check_expression(definition: &str) -> Result<&str, LibraryError> {
    let expr = definition.trim();
    let reject = |why: &str| LibraryError::InvalidInput(format!("CHECK expression {why}: '{expr}'"));

    if expr.is_empty() {
        return Err(reject("is empty"));
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut prev = '\0';
    for c in expr.chars() {
        if in_string {
            if c == '\'' {
                in_string = false;
            }
        } else {
            match c {
                '\'' => in_string = true,
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(reject("has unbalanced parentheses"));
                    }
                }
                ';' => return Err(reject("contains ';'")),
                '-' if prev == '-' => return Err(reject("contains a comment")),
                '*' if prev == '/' => return Err(reject("contains a comment")),
                _ => {}
            }
        }
        prev = c;
    }
    if in_string {
        return Err(reject("has an unterminated string"));
    }
    if depth != 0 {
        return Err(reject("has unbalanced parentheses"));
    }
    Ok(expr)
}
