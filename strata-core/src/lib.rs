//! Strata Core - a segment-based SQL query builder
//!
//! Builders collect SQL fragments ("segments") with their bound values and
//! compile them into one statement, a type-tag string and a parameter list.
//! A compiled builder can be rebound and executed again without rebuilding
//! its SQL, which makes it cheap to keep hot statements around.
//!
//! ```
//! use strata_core::prelude::*;
//! use strata_core::ConditionQuery;
//!
//! let mut group = ConditionQuery::new("or")
//!     .add_segment_ids(["low"])
//!     .cond_op("score", "<", 'i', 10)
//!     .cond("flagged", 'i', 1);
//! group.compile();
//! assert_eq!(group.compiled_sql(), "score < ? OR flagged = ?");
//!
//! group.set_segment_input("low", [5]);
//! assert_eq!(group.compiled_values()[0], Value::from(5));
//! ```

pub mod builder;
pub mod connection;
pub mod database;
pub mod error;
pub mod executor;
pub mod operator;
pub mod segment;
pub mod value;

#[cfg(test)]
mod testing;

// Re-export main types
pub use builder::{
    ConditionQuery, DeleteQuery, InsertQuery, IntoColumns, JoinType, QueryBuilder, SelectQuery,
    UpdateQuery, WhereConnector,
};
pub use connection::{escape_value, BufferedResult, Connection, QueryResult, QuoteStyle, Row};
pub use database::Database;
pub use error::{Error, Result};
pub use executor::{Enquirable, Executable};
pub use operator::{op, IntoOperator, Operator};
pub use segment::{Compiled, Group, IdAllocator, Segment, SegmentId, SegmentStore};
pub use value::{typed_params, TypeTag, Value};

/// Traits needed to call builder methods, plus the [`Database`] handle
pub mod prelude {
    pub use crate::builder::{
        ChangeableFields, Conditional, Join, QueryBuilder, SelectableFields, TableExtended,
    };
    pub use crate::executor::{Enquirable, Executable};
    pub use crate::{op, Database, Operator, Value};
}
