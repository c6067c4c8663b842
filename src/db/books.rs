use tracing::info;

use super::manager::{DatabaseManager, report};
use crate::core::{Book, LibraryError, NewBook, Value};

const SELECT_BOOKS: &str =
    "SELECT book_id, title, publication_year, genre, isbn, available_copies \
     FROM books ORDER BY book_id";

const INSERT_BOOK: &str =
    "INSERT INTO books (title, publication_year, genre, isbn, available_copies) \
     VALUES ($1, $2, $3, $4, $5) RETURNING book_id";

const UPDATE_BOOK: &str =
    "UPDATE books SET title = $1, publication_year = $2, genre = $3, isbn = $4, \
     available_copies = $5 WHERE book_id = $6 RETURNING book_id";

const DELETE_BOOK: &str = "DELETE FROM books WHERE book_id = $1";

impl DatabaseManager {
    pub async fn get_books(&mut self) -> Result<Vec<Book>, LibraryError> {
        let result = async {
            let rs = self.session()?.query(SELECT_BOOKS, &[]).await?;
            rs.rows.iter().map(Book::from_row).collect()
        }
        .await;
        report(result, "loading books")
    }

    pub async fn add_book(&mut self, book: &NewBook) -> Result<i32, LibraryError> {
        let result = self.insert_returning_id(INSERT_BOOK, &book.params()).await;
        let id = report(result, "adding book")?;
        info!("Added book '{}' with ID {id}", book.title);
        Ok(id)
    }

    pub async fn update_book(&mut self, id: i32, book: &NewBook) -> Result<(), LibraryError> {
        let mut params = book.params();
        params.push(Value::from(id));
        let result = self.update_one(UPDATE_BOOK, &params, "Book", id).await;
        report(result, "updating book")?;
        info!("Updated book with ID {id}");
        Ok(())
    }

    /// Deleting a book cascades to its author links and loan records.
    pub async fn delete_book(&mut self, id: i32) -> Result<(), LibraryError> {
        let result = self
            .delete_one(DELETE_BOOK, &[Value::from(id)], "Book", id)
            .await;
        report(result, "deleting book")?;
        info!("Deleted book with ID {id}");
        Ok(())
    }
}
