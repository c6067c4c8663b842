// Module declarations
pub mod error;
pub mod value;
pub mod row;
pub mod data_type;
pub mod column;
pub mod constraints;
pub mod author;
pub mod book;
pub mod reader;
pub mod issue;
pub mod book_author;

// Re-exports for convenience
pub use error::LibraryError;
pub use value::Value;
pub use row::{ResultSet, Row};
pub use data_type::DataType;
pub use column::ColumnInfo;
pub use constraints::{ConstraintInfo, ConstraintKind, ForeignKey};
pub use author::{Author, NewAuthor};
pub use book::{Book, NewBook};
pub use reader::{NewReader, Reader};
pub use issue::{Issue, NewIssue};
pub use book_author::BookAuthor;
