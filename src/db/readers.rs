use tracing::info;

use super::manager::{DatabaseManager, report};
use crate::core::{LibraryError, NewReader, Reader, Value};

const SELECT_READERS: &str =
    "SELECT reader_id, last_name, first_name, patronymic, ticket_number, registration_date \
     FROM readers ORDER BY reader_id";

const INSERT_READER: &str =
    "INSERT INTO readers (last_name, first_name, patronymic, ticket_number, registration_date) \
     VALUES ($1, $2, $3, $4, COALESCE($5, CURRENT_DATE)) RETURNING reader_id";

const UPDATE_READER: &str =
    "UPDATE readers SET last_name = $1, first_name = $2, patronymic = $3, ticket_number = $4, \
     registration_date = COALESCE($5, registration_date) WHERE reader_id = $6 RETURNING reader_id";

const DELETE_READER: &str = "DELETE FROM readers WHERE reader_id = $1";

impl DatabaseManager {
    pub async fn get_readers(&mut self) -> Result<Vec<Reader>, LibraryError> {
        let result = async {
            let rs = self.session()?.query(SELECT_READERS, &[]).await?;
            rs.rows.iter().map(Reader::from_row).collect()
        }
        .await;
        report(result, "loading readers")
    }

    /// A missing registration date is filled with today's date by the server.
    pub async fn add_reader(&mut self, reader: &NewReader) -> Result<i32, LibraryError> {
        let result = async {
            reader.validate()?;
            self.insert_returning_id(INSERT_READER, &reader.params()).await
        }
        .await;
        let id = report(result, "adding reader")?;
        info!("Added reader with ticket {} and ID {id}", reader.ticket_number);
        Ok(id)
    }

    /// A missing registration date keeps the stored one.
    pub async fn update_reader(&mut self, id: i32, reader: &NewReader) -> Result<(), LibraryError> {
        let result = async {
            reader.validate()?;
            let mut params = reader.params();
            params.push(Value::from(id));
            self.update_one(UPDATE_READER, &params, "Reader", id).await
        }
        .await;
        report(result, "updating reader")?;
        info!("Updated reader with ID {id}");
        Ok(())
    }

    pub async fn delete_reader(&mut self, id: i32) -> Result<(), LibraryError> {
        let result = self
            .delete_one(DELETE_READER, &[Value::from(id)], "Reader", id)
            .await;
        report(result, "deleting reader")?;
        info!("Deleted reader with ID {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{Call, Reply, ScriptedSession};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_get_readers_with_null_date() {
        let session = ScriptedSession::new();
        session.push_rows(
            &["reader_id", "last_name", "first_name", "patronymic", "ticket_number", "registration_date"],
            vec![vec![
                Value::Integer(1),
                Value::from("Ivanov"),
                Value::from("Ivan"),
                Value::Null,
                Value::from("1001"),
                Value::Date(NaiveDate::from_ymd_opt(2022, 9, 1).unwrap()),
            ]],
        );
        let mut db = DatabaseManager::with_session(session.boxed());

        let readers = db.get_readers().await.unwrap();

        assert_eq!(readers[0].ticket_number, "1001");
        assert_eq!(readers[0].patronymic, None);
        assert_eq!(readers[0].registration_date, NaiveDate::from_ymd_opt(2022, 9, 1));
    }

    #[tokio::test]
    async fn test_add_reader_without_date_sends_null() {
        let session = ScriptedSession::new();
        session.push_id(4);
        let mut db = DatabaseManager::with_session(session.boxed());

        let reader = NewReader::new("Smirnova", "Anna", None, "1004", None);
        assert_eq!(db.add_reader(&reader).await.unwrap(), 4);

        match &session.calls()[1] {
            Call::Query(sql, params) => {
                assert!(sql.contains("COALESCE($5, CURRENT_DATE)"));
                assert_eq!(params[4], Value::Null);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_ticket_rolls_back() {
        let session = ScriptedSession::new();
        session.push_error("duplicate key value violates unique constraint \"readers_ticket_number_key\"");
        let mut db = DatabaseManager::with_session(session.boxed());

        let reader = NewReader::new("Ivanov", "Ivan", None, "1001", None);
        let err = db.add_reader(&reader).await.unwrap_err();

        assert!(err.to_string().contains("readers_ticket_number_key"));
        assert_eq!(
            session.calls().iter().filter(|c| **c == Call::Rollback).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_reader_never_reaches_database() {
        let session = ScriptedSession::new();
        let mut db = DatabaseManager::with_session(session.boxed());

        let reader = NewReader::new("Ivanov!", "Ivan", None, "1001", None);
        let err = db.add_reader(&reader).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput(_)));

        let reader = NewReader::new("Ivanov", "Ivan", None, "10-01", None);
        let err = db.update_reader(1, &reader).await.unwrap_err();
        assert!(err.to_string().contains("ticket number"));

        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_reader() {
        let session = ScriptedSession::new();
        session.push(Reply::Affected(1));
        let mut db = DatabaseManager::with_session(session.boxed());

        db.delete_reader(2).await.unwrap();
        assert_eq!(session.statements(), vec![DELETE_READER.to_string()]);
        assert_eq!(session.calls().last(), Some(&Call::Commit));
    }
}
