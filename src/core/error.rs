use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Not connected to the database")]
    NotConnected,
    #[error("Connection parameters are not set")]
    MissingConnectionParams,
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unexpected column value: {0}")]
    Decode(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LibraryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Server-side errors carry the message PostgreSQL sent; the driver's own
/// `Display` only says "db error", so prefer the server text when present.
impl From<tokio_postgres::Error> for LibraryError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) => Self::Database(db.to_string()),
            None => Self::Database(err.to_string()),
        }
    }
}
