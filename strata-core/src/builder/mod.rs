//! Query builder module

pub mod common;
pub mod condition;
pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

use std::fmt;

use crate::segment::{SegmentId, SegmentStore};
use crate::Value;

pub use common::{ChangeableFields, Conditional, Join, SelectableFields, TableExtended};
pub use condition::ConditionQuery;
pub use delete::DeleteQuery;
pub use insert::InsertQuery;
pub use select::SelectQuery;
pub use update::UpdateQuery;

/// Core trait for all query builders.
///
/// Every builder owns a [`SegmentStore`]; the trait only adds the
/// statement-specific `compile` step on top of it. The trait is object safe
/// so that builders can be nested inside each other as sub-queries.
pub trait QueryBuilder: fmt::Debug + Send {
    fn store(&self) -> &SegmentStore;

    fn store_mut(&mut self) -> &mut SegmentStore;

    /// Regenerate the statement text, types and values from the segments
    fn compile(&mut self);

    fn is_compiled(&self) -> bool {
        self.store().is_compiled()
    }

    fn compiled_sql(&self) -> &str {
        &self.store().compiled().sql
    }

    fn compiled_types(&self) -> &str {
        &self.store().compiled().types
    }

    fn compiled_values(&self) -> &[Value] {
        &self.store().compiled().values
    }

    /// Id of the most recently added segment
    fn last_segment_id(&self) -> Option<&SegmentId> {
        self.store().last_segment_id()
    }

    /// Ids recorded since `enable_segment_id(true)`
    fn segment_ids(&self) -> &[SegmentId] {
        self.store().segment_ids()
    }

    /// Reserve ids for the next segments, consumed first-in first-out
    fn add_segment_ids<I, S>(mut self, ids: I) -> Self
    where
        Self: Sized,
        I: IntoIterator<Item = S>,
        S: Into<SegmentId>,
    {
        self.store_mut().reserve_segment_ids(ids);
        self
    }

    fn enable_segment_id(mut self, enable: bool) -> Self
    where
        Self: Sized,
    {
        self.store_mut().enable_segment_id(enable);
        self
    }

    /// Rebind the values of the segment(s) with the given id.
    ///
    /// The compiled statement stays valid; only its values change.
    fn set_segment_input<I, V>(&mut self, id: &str, values: I) -> &mut Self
    where
        Self: Sized,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.store_mut().set_segment_input(id, &values);
        self
    }

    fn clear_segment_input(&mut self) -> &mut Self
    where
        Self: Sized,
    {
        self.store_mut().clear_segment_input();
        self
    }
}

/// How conditions of one builder are connected
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WhereConnector {
    #[default]
    And,
    Or,
}

/// `"or"` in any case selects [`WhereConnector::Or`], anything else is AND
impl From<&str> for WhereConnector {
    fn from(connector: &str) -> Self {
        if connector.trim().eq_ignore_ascii_case("or") {
            WhereConnector::Or
        } else {
            WhereConnector::And
        }
    }
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
            JoinType::Right => write!(f, "RIGHT"),
        }
    }
}

/// Trait to convert various types into columns
pub trait IntoColumns {
    fn into_columns(self) -> Vec<String>;
}

impl IntoColumns for &str {
    fn into_columns(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoColumns for String {
    fn into_columns(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoColumns for Vec<String> {
    fn into_columns(self) -> Vec<String> {
        self
    }
}

impl IntoColumns for Vec<&str> {
    fn into_columns(self) -> Vec<String> {
        self.into_iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> IntoColumns for [&str; N] {
    fn into_columns(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoColumns for (&str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string()]
    }
}

impl IntoColumns for (&str, &str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string(), self.2.to_string()]
    }
}
