use tracing::info;

use super::manager::{DatabaseManager, report};
use crate::core::{Author, LibraryError, NewAuthor, Value};

const SELECT_AUTHORS: &str =
    "SELECT author_id, last_name, first_name, patronymic, birth_year, country \
     FROM authors ORDER BY author_id";

const INSERT_AUTHOR: &str =
    "INSERT INTO authors (last_name, first_name, patronymic, birth_year, country) \
     VALUES ($1, $2, $3, $4, $5) RETURNING author_id";

const UPDATE_AUTHOR: &str =
    "UPDATE authors SET last_name = $1, first_name = $2, patronymic = $3, \
     birth_year = $4, country = $5 WHERE author_id = $6 RETURNING author_id";

const DELETE_AUTHOR: &str = "DELETE FROM authors WHERE author_id = $1";

impl DatabaseManager {
    pub async fn get_authors(&mut self) -> Result<Vec<Author>, LibraryError> {
        let result = async {
            let rs = self.session()?.query(SELECT_AUTHORS, &[]).await?;
            rs.rows.iter().map(Author::from_row).collect()
        }
        .await;
        report(result, "loading authors")
    }

    pub async fn add_author(&mut self, author: &NewAuthor) -> Result<i32, LibraryError> {
        let result = self.insert_returning_id(INSERT_AUTHOR, &author.params()).await;
        let id = report(result, "adding author")?;
        info!("Added author with ID {id}");
        Ok(id)
    }

    pub async fn update_author(&mut self, id: i32, author: &NewAuthor) -> Result<(), LibraryError> {
        let mut params = author.params();
        params.push(Value::from(id));
        let result = self.update_one(UPDATE_AUTHOR, &params, "Author", id).await;
        report(result, "updating author")?;
        info!("Updated author with ID {id}");
        Ok(())
    }

    pub async fn delete_author(&mut self, id: i32) -> Result<(), LibraryError> {
        let result = self
            .delete_one(DELETE_AUTHOR, &[Value::from(id)], "Author", id)
            .await;
        report(result, "deleting author")?;
        info!("Deleted author with ID {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{Call, Reply, ScriptedSession};

    fn tolkien() -> NewAuthor {
        NewAuthor::new("Tolkien", "J.R.R.", Some(""), Some(1892), Some("UK"))
    }

    #[tokio::test]
    async fn test_add_author_commits_and_returns_id() {
        let session = ScriptedSession::new();
        session.push_id(6);
        let mut db = DatabaseManager::with_session(session.boxed());

        let id = db.add_author(&tolkien()).await.unwrap();

        assert_eq!(id, 6);
        let calls = session.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Call::Begin);
        match &calls[1] {
            Call::Query(sql, params) => {
                assert_eq!(sql, INSERT_AUTHOR);
                assert_eq!(params[0], Value::from("Tolkien"));
                assert_eq!(params[3], Value::Integer(1892));
                assert_eq!(params[4], Value::from("UK"));
            }
            other => panic!("unexpected call {other:?}"),
        }
        assert_eq!(calls[2], Call::Commit);
    }

    #[tokio::test]
    async fn test_add_author_rolls_back_on_unique_violation() {
        let session = ScriptedSession::new();
        session.push_error("duplicate key value violates unique constraint");
        let mut db = DatabaseManager::with_session(session.boxed());

        let err = db.add_author(&tolkien()).await.unwrap_err();

        assert!(err.to_string().contains("duplicate key"));
        assert_eq!(session.calls().last(), Some(&Call::Rollback));
    }

    #[tokio::test]
    async fn test_get_authors_decodes_rows() {
        let session = ScriptedSession::new();
        session.push_rows(
            &["author_id", "last_name", "first_name", "patronymic", "birth_year", "country"],
            vec![vec![
                Value::Integer(1),
                Value::from("Tolkien"),
                Value::from("J.R.R."),
                Value::from(""),
                Value::Integer(1892),
                Value::from("UK"),
            ]],
        );
        let mut db = DatabaseManager::with_session(session.boxed());

        let authors = db.get_authors().await.unwrap();

        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].birth_year, Some(1892));
        assert_eq!(session.statements(), vec![SELECT_AUTHORS.to_string()]);
    }

    #[tokio::test]
    async fn test_update_missing_author_is_not_found() {
        let session = ScriptedSession::new();
        session.push_rows(&["author_id"], vec![]);
        let mut db = DatabaseManager::with_session(session.boxed());

        let err = db.update_author(42, &tolkien()).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Author with ID 42 not found");
        match &session.calls()[1] {
            Call::Query(_, params) => assert_eq!(params.last(), Some(&Value::Integer(42))),
            other => panic!("unexpected call {other:?}"),
        }
        assert_eq!(session.calls().last(), Some(&Call::Rollback));
    }

    #[tokio::test]
    async fn test_delete_author() {
        let session = ScriptedSession::new();
        session.push(Reply::Affected(1));
        let mut db = DatabaseManager::with_session(session.boxed());

        db.delete_author(3).await.unwrap();

        assert_eq!(
            session.calls(),
            vec![
                Call::Begin,
                Call::Execute(DELETE_AUTHOR.to_string(), vec![Value::Integer(3)]),
                Call::Commit,
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_author_is_not_found() {
        let session = ScriptedSession::new();
        session.push(Reply::Affected(0));
        let mut db = DatabaseManager::with_session(session.boxed());

        assert!(db.delete_author(3).await.unwrap_err().is_not_found());
        assert_eq!(session.calls().last(), Some(&Call::Rollback));
    }
}
