//! Connection lifecycle and ad-hoc statements.
//!
//! CRUD for each table lives in its own module as further `impl
//! DatabaseManager` blocks; schema creation and sample data in `schema`.

use tracing::{error, info};

use super::pg::PgSession;
use super::session::{SqlSession, finish, returned_id};
use crate::config::ConnectionParams;
use crate::core::{LibraryError, ResultSet, Value};
use crate::schema::AlterTableManager;

/// Owns the connection parameters and the one live session.
#[derive(Default)]
pub struct DatabaseManager {
    params: Option<ConnectionParams>,
    session: Option<Box<dyn SqlSession>>,
}

impl DatabaseManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager over an already open session.
    #[must_use]
    pub fn with_session(session: Box<dyn SqlSession>) -> Self {
        Self {
            params: None,
            session: Some(session),
        }
    }

    pub fn set_connection_params(&mut self, params: ConnectionParams) {
        info!("Connection parameters set: {params}");
        self.params = Some(params);
    }

    #[must_use]
    pub const fn connection_params(&self) -> Option<&ConnectionParams> {
        self.params.as_ref()
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub async fn connect(&mut self) -> Result<(), LibraryError> {
        let Some(params) = &self.params else {
            error!("Connection parameters are not set");
            return Err(LibraryError::MissingConnectionParams);
        };

        match PgSession::connect(params).await {
            Ok(session) => {
                info!("Connected to database {}", params.database);
                self.session = Some(Box::new(session));
                Ok(())
            }
            Err(e) => {
                error!("Failed to connect to database: {e}");
                Err(e)
            }
        }
    }

    pub async fn disconnect(&mut self) -> Result<(), LibraryError> {
        if let Some(mut session) = self.session.take() {
            session.close().await?;
            info!("Database connection closed");
        }
        Ok(())
    }

    pub(crate) fn session(&mut self) -> Result<&mut dyn SqlSession, LibraryError> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(LibraryError::NotConnected),
        }
    }

    /// Schema-mutation manager sharing this connection.
    pub fn alter(&mut self) -> Result<AlterTableManager<'_>, LibraryError> {
        Ok(AlterTableManager::new(self.session()?))
    }

    /// Run SELECT text produced by the request builder or the join wizard.
    pub async fn execute_custom_request(&mut self, sql: &str) -> Result<ResultSet, LibraryError> {
        info!("Executing query: {sql}");
        match self.session()?.query(sql, &[]).await {
            Ok(rs) => {
                info!("Query returned {} rows", rs.len());
                Ok(rs)
            }
            Err(e) => {
                error!("Query failed: {e}");
                Err(e)
            }
        }
    }

    /// Column names of `table`, in definition order.
    pub async fn get_table_columns(&mut self, table: &str) -> Result<Vec<String>, LibraryError> {
        let columns = self.alter()?.get_table_columns(table).await;
        Ok(columns.into_iter().map(|c| c.name).collect())
    }

    /// `INSERT ... RETURNING <id>` as one transaction.
    pub(crate) async fn insert_returning_id(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> Result<i32, LibraryError> {
        let session = self.session()?;
        session.begin().await?;
        let result = match session.query(sql, params).await {
            Ok(rs) => returned_id(&rs)
                .and_then(|id| id.ok_or_else(|| LibraryError::Decode("INSERT returned no id".into()))),
            Err(e) => Err(e),
        };
        finish(session, result).await
    }

    /// `UPDATE ... RETURNING` as one transaction. No row back means the
    /// target does not exist.
    pub(crate) async fn update_one(
        &mut self,
        sql: &str,
        params: &[Value],
        entity: &'static str,
        id: impl ToString,
    ) -> Result<(), LibraryError> {
        let session = self.session()?;
        session.begin().await?;
        let result = match session.query(sql, params).await {
            Ok(rs) if rs.is_empty() => Err(LibraryError::not_found(entity, id)),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        finish(session, result).await
    }

    /// `DELETE` as one transaction; zero affected rows is `NotFound`.
    pub(crate) async fn delete_one(
        &mut self,
        sql: &str,
        params: &[Value],
        entity: &'static str,
        id: impl ToString,
    ) -> Result<(), LibraryError> {
        let session = self.session()?;
        session.begin().await?;
        let result = match session.execute(sql, params).await {
            Ok(0) => Err(LibraryError::not_found(entity, id)),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        finish(session, result).await
    }
}

/// Log the failure of `action` and pass the result through.
pub(crate) fn report<T>(result: Result<T, LibraryError>, action: &str) -> Result<T, LibraryError> {
    if let Err(e) = &result {
        error!("Error {action}: {e}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{Call, ScriptedSession};

    #[tokio::test]
    async fn test_not_connected() {
        let mut db = DatabaseManager::new();
        assert!(!db.is_connected());
        let err = db.execute_custom_request("SELECT 1").await.unwrap_err();
        assert!(matches!(err, LibraryError::NotConnected));
    }

    #[tokio::test]
    async fn test_connect_without_params() {
        let mut db = DatabaseManager::new();
        let err = db.connect().await.unwrap_err();
        assert!(matches!(err, LibraryError::MissingConnectionParams));
    }

    #[tokio::test]
    async fn test_custom_request_runs_outside_transaction() {
        let session = ScriptedSession::new();
        session.push_rows(&["title"], vec![vec![Value::from("1984")]]);
        let mut db = DatabaseManager::with_session(session.boxed());

        let rs = db.execute_custom_request("SELECT title FROM books").await.unwrap();

        assert_eq!(rs.len(), 1);
        assert_eq!(
            session.calls(),
            vec![Call::Query("SELECT title FROM books".to_string(), vec![])]
        );
    }

    #[tokio::test]
    async fn test_disconnect_closes_session() {
        let session = ScriptedSession::new();
        let mut db = DatabaseManager::with_session(session.boxed());
        db.disconnect().await.unwrap();
        assert!(!db.is_connected());
        assert_eq!(session.calls(), vec![Call::Close]);
    }

    #[tokio::test]
    async fn test_get_table_columns() {
        let session = ScriptedSession::new();
        session.push_rows(
            &["column_name", "data_type", "nullable", "column_default"],
            vec![
                vec![Value::from("book_id"), Value::from("integer"), Value::Boolean(false), Value::Null],
                vec![Value::from("title"), Value::from("character varying"), Value::Boolean(false), Value::Null],
            ],
        );
        let mut db = DatabaseManager::with_session(session.boxed());

        let columns = db.get_table_columns("books").await.unwrap();

        assert_eq!(columns, vec!["book_id", "title"]);
    }
}
