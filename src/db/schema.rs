//! Table definitions, sample data and the reset operations.

use tracing::info;

use super::manager::{DatabaseManager, report};
use super::pg::PgSession;
use super::session::{SqlSession, finish};
use crate::core::{LibraryError, Value};
use crate::schema::validate::quote_ident;

/// Maintenance database used to create the library database.
pub const MAINTENANCE_DATABASE: &str = "postgres";

/// Tables in creation order; dropping and truncating go the other way.
pub const TABLES: [&str; 5] = ["readers", "authors", "books", "book_authors", "issues"];

const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS readers (
    reader_id SERIAL PRIMARY KEY,
    last_name VARCHAR(100) NOT NULL,
    first_name VARCHAR(100) NOT NULL,
    patronymic VARCHAR(100),
    ticket_number VARCHAR(20) UNIQUE NOT NULL,
    registration_date DATE DEFAULT CURRENT_DATE
);
CREATE TABLE IF NOT EXISTS authors (
    author_id SERIAL PRIMARY KEY,
    last_name VARCHAR(100) NOT NULL,
    first_name VARCHAR(100) NOT NULL,
    patronymic VARCHAR(100),
    birth_year INTEGER,
    country VARCHAR(100),
    UNIQUE (last_name, first_name, patronymic)
);
CREATE TABLE IF NOT EXISTS books (
    book_id SERIAL PRIMARY KEY,
    title VARCHAR(200) NOT NULL,
    publication_year INTEGER,
    genre VARCHAR(100),
    isbn VARCHAR(30) UNIQUE,
    available_copies INTEGER NOT NULL DEFAULT 1 CHECK (available_copies >= 0)
);
CREATE TABLE IF NOT EXISTS book_authors (
    book_id INTEGER NOT NULL REFERENCES books(book_id) ON DELETE CASCADE,
    author_id INTEGER NOT NULL REFERENCES authors(author_id) ON DELETE CASCADE,
    PRIMARY KEY (book_id, author_id)
);
CREATE TABLE IF NOT EXISTS issues (
    issue_id SERIAL PRIMARY KEY,
    reader_id INTEGER NOT NULL REFERENCES readers(reader_id) ON DELETE CASCADE,
    book_id INTEGER NOT NULL REFERENCES books(book_id) ON DELETE CASCADE,
    issue_date DATE NOT NULL DEFAULT CURRENT_DATE,
    return_date DATE
);
";

const DROP_SCHEMA: &str = "
DROP TABLE IF EXISTS issues CASCADE;
DROP TABLE IF EXISTS book_authors CASCADE;
DROP TABLE IF EXISTS books CASCADE;
DROP TABLE IF EXISTS authors CASCADE;
DROP TABLE IF EXISTS readers CASCADE;
";

const TRUNCATE_ALL: &str =
    "TRUNCATE TABLE issues, book_authors, books, authors, readers RESTART IDENTITY CASCADE";

// Links and loans are resolved through natural keys (ISBN, surname, ticket
// number) so seeding works whatever ids the rows received.
const SAMPLE_DATA: &str = "
INSERT INTO authors (last_name, first_name, patronymic, birth_year, country) VALUES
    ('Pushkin', 'Alexander', 'Sergeyevich', 1799, 'Russia'),
    ('Tolstoy', 'Leo', 'Nikolayevich', 1828, 'Russia'),
    ('Dostoevsky', 'Fyodor', 'Mikhailovich', 1821, 'Russia'),
    ('Orwell', 'George', '', 1903, 'United Kingdom'),
    ('Rowling', 'Joanne', '', 1965, 'United Kingdom')
ON CONFLICT (last_name, first_name, patronymic) DO NOTHING;

INSERT INTO books (title, publication_year, genre, isbn, available_copies) VALUES
    ('Eugene Onegin', 1833, 'Novel in verse', '978-5-17-088433-8', 3),
    ('War and Peace', 1869, 'Novel', '978-5-389-07453-2', 2),
    ('Crime and Punishment', 1866, 'Novel', '978-5-699-12014-9', 4),
    ('Nineteen Eighty-Four', 1949, 'Dystopia', '978-0-452-28423-4', 5),
    ('Harry Potter and the Philosopher''s Stone', 1997, 'Fantasy', '978-5-353-02452-7', 7)
ON CONFLICT (isbn) DO NOTHING;

INSERT INTO readers (last_name, first_name, patronymic, ticket_number, registration_date) VALUES
    ('Ivanov', 'Ivan', 'Ivanovich', '1001', '2022-09-01'),
    ('Petrova', 'Maria', 'Sergeyevna', '1002', '2023-01-15'),
    ('Sidorov', 'Pavel', 'Alekseyevich', '1003', '2024-02-10')
ON CONFLICT (ticket_number) DO NOTHING;

INSERT INTO book_authors (book_id, author_id)
SELECT b.book_id, a.author_id
FROM (VALUES
    ('978-5-17-088433-8', 'Pushkin'),
    ('978-5-389-07453-2', 'Tolstoy'),
    ('978-5-699-12014-9', 'Dostoevsky'),
    ('978-0-452-28423-4', 'Orwell'),
    ('978-5-353-02452-7', 'Rowling')
) AS v(isbn, last_name)
JOIN books b ON b.isbn = v.isbn
JOIN authors a ON a.last_name = v.last_name
ON CONFLICT DO NOTHING;

INSERT INTO issues (book_id, reader_id, issue_date, return_date)
SELECT b.book_id, r.reader_id, v.issue_date::date, v.return_date::date
FROM (VALUES
    ('978-5-17-088433-8', '1001', '2024-06-01', '2024-06-15'),
    ('978-5-389-07453-2', '1002', '2024-06-03', NULL),
    ('978-5-699-12014-9', '1003', '2024-06-04', '2024-06-20'),
    ('978-0-452-28423-4', '1001', '2024-06-10', NULL)
) AS v(isbn, ticket_number, issue_date, return_date)
JOIN books b ON b.isbn = v.isbn
JOIN readers r ON r.ticket_number = v.ticket_number
WHERE NOT EXISTS (
    SELECT 1 FROM issues i
    WHERE i.book_id = b.book_id
      AND i.reader_id = r.reader_id
      AND i.issue_date = v.issue_date::date
);
";

impl DatabaseManager {
    /// Create the configured database through the maintenance database.
    /// Returns `false` when it already existed.
    pub async fn create_database(&self) -> Result<bool, LibraryError> {
        let params = self
            .connection_params()
            .ok_or(LibraryError::MissingConnectionParams)?;
        let name = params.database.clone();

        let mut session = PgSession::connect(&params.with_database(MAINTENANCE_DATABASE)).await?;
        let result = ensure_database(&mut session, &name).await;
        session.close().await?;
        report(result, "creating database")
    }

    pub async fn create_schema(&mut self) -> Result<(), LibraryError> {
        let result = self.in_transaction(CREATE_SCHEMA).await;
        report(result, "creating schema")?;
        info!("Database schema created");
        Ok(())
    }

    /// Insert the sample catalogue. Rows that already exist are skipped.
    pub async fn init_sample_data(&mut self) -> Result<(), LibraryError> {
        let result = self.in_transaction(SAMPLE_DATA).await;
        report(result, "adding sample data")?;
        info!("Sample data added");
        Ok(())
    }

    /// Empty every table, restart the id sequences and reseed, as one unit.
    pub async fn reset_database(&mut self) -> Result<(), LibraryError> {
        let sql = format!("{TRUNCATE_ALL};\n{SAMPLE_DATA}");
        let result = self.in_transaction(&sql).await;
        report(result, "resetting database")?;
        info!("Database reset to sample data");
        Ok(())
    }

    /// Drop every table and create the schema again (empty).
    pub async fn reset_schema(&mut self) -> Result<(), LibraryError> {
        let sql = format!("{DROP_SCHEMA}{CREATE_SCHEMA}");
        let result = self.in_transaction(&sql).await;
        report(result, "resetting schema")?;
        info!("Database schema recreated");
        Ok(())
    }

    async fn in_transaction(&mut self, sql: &str) -> Result<(), LibraryError> {
        let session = self.session()?;
        session.begin().await?;
        let result = session.batch_execute(sql).await;
        finish(session, result).await
    }
}

async fn ensure_database(session: &mut dyn SqlSession, name: &str) -> Result<bool, LibraryError> {
    let exists = session
        .query(
            "SELECT 1 FROM pg_database WHERE datname = $1",
            &[Value::from(name)],
        )
        .await?;
    if !exists.is_empty() {
        info!("Database {name} already exists");
        return Ok(false);
    }
    // CREATE DATABASE cannot run inside a transaction block.
    session
        .batch_execute(&format!("CREATE DATABASE {}", quote_ident(name)))
        .await?;
    info!("Database {name} created");
    Ok(true)
}
