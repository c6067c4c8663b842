use tracing::info;

use super::manager::{DatabaseManager, report};
use super::session::finish;
use crate::core::{BookAuthor, LibraryError, Value};

const SELECT_BOOK_AUTHORS: &str =
    "SELECT book_id, author_id FROM book_authors ORDER BY book_id, author_id";

const INSERT_BOOK_AUTHOR: &str =
    "INSERT INTO book_authors (book_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING";

const UPDATE_BOOK_AUTHOR: &str =
    "UPDATE book_authors SET book_id = $1, author_id = $2 \
     WHERE book_id = $3 AND author_id = $4 RETURNING book_id";

const DELETE_BOOK_AUTHOR: &str = "DELETE FROM book_authors WHERE book_id = $1 AND author_id = $2";

impl DatabaseManager {
    pub async fn get_book_authors(&mut self) -> Result<Vec<BookAuthor>, LibraryError> {
        let result = async {
            let rs = self.session()?.query(SELECT_BOOK_AUTHORS, &[]).await?;
            rs.rows.iter().map(BookAuthor::from_row).collect()
        }
        .await;
        report(result, "loading book/author links")
    }

    /// Link a book to an author. Returns `false` when the link already existed.
    pub async fn add_book_author(&mut self, link: BookAuthor) -> Result<bool, LibraryError> {
        let params = [Value::from(link.book_id), Value::from(link.author_id)];
        let result = async {
            let session = self.session()?;
            session.begin().await?;
            let inserted = session.execute(INSERT_BOOK_AUTHOR, &params).await;
            finish(session, inserted).await
        }
        .await;
        let inserted = report(result, "adding book/author link")? > 0;
        if inserted {
            info!("Linked {link}");
        } else {
            info!("Link {link} already exists");
        }
        Ok(inserted)
    }

    /// Replace the `old` pair with `new`.
    pub async fn update_book_author(
        &mut self,
        old: BookAuthor,
        new: BookAuthor,
    ) -> Result<(), LibraryError> {
        let params = [
            Value::from(new.book_id),
            Value::from(new.author_id),
            Value::from(old.book_id),
            Value::from(old.author_id),
        ];
        let result = self
            .update_one(UPDATE_BOOK_AUTHOR, &params, "Book/author link", old)
            .await;
        report(result, "updating book/author link")?;
        info!("Updated link: {old} -> {new}");
        Ok(())
    }

    pub async fn delete_book_author(&mut self, link: BookAuthor) -> Result<(), LibraryError> {
        let params = [Value::from(link.book_id), Value::from(link.author_id)];
        let result = self
            .delete_one(DELETE_BOOK_AUTHOR, &params, "Book/author link", link)
            .await;
        report(result, "deleting book/author link")?;
        info!("Removed link {link}");
        Ok(())
    }
}
