//! Schema mutation (ALTER TABLE) and the validators guarding it.

pub mod alter;
pub mod validate;

pub use alter::{AlterOutcome, AlterTableManager};
