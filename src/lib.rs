// libris - library catalogue client for PostgreSQL
// Data access, ad-hoc query building and schema changes over one connection

// Clippy configuration - allow non-critical warnings
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

// Domain types (values, rows, entities, errors)
pub mod core;

// Layered configuration (file, environment, flags)
pub mod config;

// Event log and tracing bridge
pub mod logging;

// Data access layer (session, CRUD, schema bootstrap)
pub mod db;

// SELECT builder, conditions, joins, text operations
pub mod query;

// ALTER TABLE manager and input validation
pub mod schema;

// Tables and JSON for terminal output
pub mod render;

// Command grammar of the interactive shell
pub mod shell;

// Re-export commonly used types for convenience
pub use config::{AppConfig, ConnectionParams};
pub use core::{Author, Book, BookAuthor, Issue, LibraryError, Reader, ResultSet, Row, Value};
pub use db::{DatabaseManager, PgSession, SqlSession};
pub use query::{JoinQuery, RequestBuilder};
pub use schema::{AlterOutcome, AlterTableManager};
