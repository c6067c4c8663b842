//! The single database connection, used serially.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::{LibraryError, ResultSet, Value};

/// One connection with explicit transaction control.
///
/// Statements outside `begin`/`commit` run in autocommit mode. Parameters
/// are bound positionally to `$1`, `$2`, ...
#[async_trait]
pub trait SqlSession: Send {
    async fn begin(&mut self) -> Result<(), LibraryError>;
    async fn commit(&mut self) -> Result<(), LibraryError>;
    async fn rollback(&mut self) -> Result<(), LibraryError>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, LibraryError>;

    /// Run a statement that produces rows (SELECT, or DML with RETURNING).
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, LibraryError>;

    /// Run one or more unparameterized statements.
    async fn batch_execute(&mut self, sql: &str) -> Result<(), LibraryError>;

    async fn close(&mut self) -> Result<(), LibraryError> {
        Ok(())
    }
}

/// Commit after a successful statement, roll back after a failed one.
///
/// The statement's own error wins over a rollback error.
pub async fn finish<T>(
    session: &mut dyn SqlSession,
    result: Result<T, LibraryError>,
) -> Result<T, LibraryError> {
    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                warn!("Rollback failed: {rollback_err}");
            } else {
                debug!("Transaction rolled back");
            }
            Err(err)
        }
    }
}

/// First column of the first row as an `INTEGER` id (`RETURNING x_id`).
pub fn returned_id(rs: &ResultSet) -> Result<Option<i32>, LibraryError> {
    rs.first().map(|row| row.int4(0)).transpose()
}
