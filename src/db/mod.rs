//! Data access layer over a single PostgreSQL connection.

pub mod manager;
pub mod pg;
pub mod schema;
pub mod session;

mod authors;
mod book_authors;
mod books;
mod issues;
mod readers;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::DatabaseManager;
pub use pg::PgSession;
pub use session::SqlSession;
