use tracing::info;

use super::manager::{DatabaseManager, report};
use crate::core::{Issue, LibraryError, NewIssue, Value};

const SELECT_ISSUES: &str =
    "SELECT issue_id, book_id, reader_id, issue_date, return_date FROM issues ORDER BY issue_id";

const INSERT_ISSUE: &str =
    "INSERT INTO issues (book_id, reader_id, issue_date, return_date) \
     VALUES ($1, $2, $3, $4) RETURNING issue_id";

const UPDATE_ISSUE: &str =
    "UPDATE issues SET book_id = $1, reader_id = $2, issue_date = $3, return_date = $4 \
     WHERE issue_id = $5 RETURNING issue_id";

const DELETE_ISSUE: &str = "DELETE FROM issues WHERE issue_id = $1";

impl DatabaseManager {
    pub async fn get_issues(&mut self) -> Result<Vec<Issue>, LibraryError> {
        let result = async {
            let rs = self.session()?.query(SELECT_ISSUES, &[]).await?;
            rs.rows.iter().map(Issue::from_row).collect()
        }
        .await;
        report(result, "loading issues")
    }

    /// Record a loan. `available_copies` of the book is left untouched.
    pub async fn add_issue(&mut self, issue: &NewIssue) -> Result<i32, LibraryError> {
        let result = self.insert_returning_id(INSERT_ISSUE, &issue.params()).await;
        let id = report(result, "adding issue")?;
        info!(
            "Added issue with ID {id}: book {} to reader {}",
            issue.book_id, issue.reader_id
        );
        Ok(id)
    }

    pub async fn update_issue(&mut self, id: i32, issue: &NewIssue) -> Result<(), LibraryError> {
        let mut params = issue.params();
        params.push(Value::from(id));
        let result = self.update_one(UPDATE_ISSUE, &params, "Issue", id).await;
        report(result, "updating issue")?;
        info!("Updated issue with ID {id}");
        Ok(())
    }

    pub async fn delete_issue(&mut self, id: i32) -> Result<(), LibraryError> {
        let result = self
            .delete_one(DELETE_ISSUE, &[Value::from(id)], "Issue", id)
            .await;
        report(result, "deleting issue")?;
        info!("Deleted issue with ID {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{Call, ScriptedSession};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[tokio::test]
    async fn test_add_open_issue() {
        let session = ScriptedSession::new();
        session.push_id(5);
        let mut db = DatabaseManager::with_session(session.boxed());

        let id = db.add_issue(&NewIssue::new(2, 3, day(20), None)).await.unwrap();

        assert_eq!(id, 5);
        assert_eq!(
            session.calls(),
            vec![
                Call::Begin,
                Call::Query(
                    INSERT_ISSUE.to_string(),
                    vec![Value::Integer(2), Value::Integer(3), Value::Date(day(20)), Value::Null]
                ),
                Call::Commit,
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_reader_rolls_back() {
        let session = ScriptedSession::new();
        session.push_error("insert or update on table \"issues\" violates foreign key constraint");
        let mut db = DatabaseManager::with_session(session.boxed());

        let err = db.add_issue(&NewIssue::new(1, 999, day(1), None)).await.unwrap_err();

        assert!(err.to_string().contains("foreign key"));
        assert_eq!(session.calls().last(), Some(&Call::Rollback));
    }

    #[tokio::test]
    async fn test_return_book_by_update() {
        let session = ScriptedSession::new();
        session.push_id(2);
        let mut db = DatabaseManager::with_session(session.boxed());

        db.update_issue(2, &NewIssue::new(2, 2, day(3), Some(day(17))))
            .await
            .unwrap();

        match &session.calls()[1] {
            Call::Query(sql, params) => {
                assert_eq!(sql, UPDATE_ISSUE);
                assert_eq!(params[3], Value::Date(day(17)));
                assert_eq!(params[4], Value::Integer(2));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_issues() {
        let session = ScriptedSession::new();
        session.push_rows(
            &["issue_id", "book_id", "reader_id", "issue_date", "return_date"],
            vec![
                vec![
                    Value::Integer(1),
                    Value::Integer(1),
                    Value::Integer(1),
                    Value::Date(day(1)),
                    Value::Date(day(15)),
                ],
                vec![
                    Value::Integer(2),
                    Value::Integer(2),
                    Value::Integer(2),
                    Value::Date(day(3)),
                    Value::Null,
                ],
            ],
        );
        let mut db = DatabaseManager::with_session(session.boxed());

        let issues = db.get_issues().await.unwrap();

        assert!(issues[0].is_returned());
        assert!(!issues[1].is_returned());
    }
}
