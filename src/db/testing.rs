//! Scripted [`SqlSession`] for unit tests: records every call and replays
//! queued responses.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::session::SqlSession;
use crate::core::{LibraryError, ResultSet, Row, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin,
    Commit,
    Rollback,
    Execute(String, Vec<Value>),
    Query(String, Vec<Value>),
    Batch(String),
    Close,
}

#[derive(Debug, Clone)]
pub enum Reply {
    Rows(ResultSet),
    Affected(u64),
    Fail(String),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    replies: VecDeque<Reply>,
}

/// Clones share state, so a test keeps one handle and gives the other away.
#[derive(Clone, Default)]
pub struct ScriptedSession {
    state: Arc<Mutex<State>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Reply) -> &Self {
        self.state.lock().unwrap().replies.push_back(reply);
        self
    }

    /// Queue a single-row, single-column result (e.g. `RETURNING id`).
    pub fn push_id(&self, id: i64) -> &Self {
        self.push(Reply::Rows(ResultSet::new(
            vec!["id".to_string()],
            vec![Row::new(vec![Value::Integer(id)])],
        )))
    }

    pub fn push_rows(&self, columns: &[&str], rows: Vec<Vec<Value>>) -> &Self {
        self.push(Reply::Rows(ResultSet::new(
            columns.iter().map(|c| (*c).to_string()).collect(),
            rows.into_iter().map(Row::new).collect(),
        )))
    }

    pub fn push_error(&self, message: &str) -> &Self {
        self.push(Reply::Fail(message.to_string()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// SQL text of every statement sent, in order.
    pub fn statements(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Execute(sql, _) | Call::Query(sql, _) | Call::Batch(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn boxed(&self) -> Box<dyn SqlSession> {
        Box::new(self.clone())
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn next_reply(&self) -> Option<Reply> {
        self.state.lock().unwrap().replies.pop_front()
    }
}

#[async_trait]
impl SqlSession for ScriptedSession {
    async fn begin(&mut self) -> Result<(), LibraryError> {
        self.record(Call::Begin);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), LibraryError> {
        self.record(Call::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), LibraryError> {
        self.record(Call::Rollback);
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, LibraryError> {
        self.record(Call::Execute(sql.to_string(), params.to_vec()));
        match self.next_reply() {
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Rows(rs)) => Ok(rs.len() as u64),
            Some(Reply::Fail(msg)) => Err(LibraryError::Database(msg)),
            None => Ok(0),
        }
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, LibraryError> {
        self.record(Call::Query(sql.to_string(), params.to_vec()));
        match self.next_reply() {
            Some(Reply::Rows(rs)) => Ok(rs),
            Some(Reply::Affected(_)) | None => Ok(ResultSet::default()),
            Some(Reply::Fail(msg)) => Err(LibraryError::Database(msg)),
        }
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), LibraryError> {
        self.record(Call::Batch(sql.to_string()));
        match self.next_reply() {
            Some(Reply::Fail(msg)) => Err(LibraryError::Database(msg)),
            _ => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<(), LibraryError> {
        self.record(Call::Close);
        Ok(())
    }
}
