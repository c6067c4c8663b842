//! Ad-hoc SELECT composition: the request builder, its WHERE/HAVING
//! helpers, the join wizard, row search and cell text operations.

pub mod builder;
pub mod condition;
pub mod join;
pub mod search;
pub mod text_ops;

pub use builder::{Aggregate, AggregateFunction, RequestBuilder, SortDirection};
pub use condition::{ComparisonOperator, Subquery, SubqueryOperator, condition, validate_having};
pub use join::{JoinFilter, JoinQuery, JoinType};
pub use search::{Search, SearchOperator};
pub use text_ops::TextOperation;
