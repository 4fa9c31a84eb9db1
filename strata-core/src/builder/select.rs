//! SELECT query builder implementation

use std::sync::Arc;

use super::common::{Conditional, Join, SelectableFields, TableExtended};
use super::{IntoColumns, QueryBuilder};
use crate::connection::Connection;
use crate::executor::Enquirable;
use crate::segment::{Group, SegmentStore};

/// Builder for `SELECT` statements
///
/// ```
/// use std::sync::Arc;
/// use strata_core::prelude::*;
/// # use strata_core::{BufferedResult, Connection, QueryResult, Value};
/// # #[derive(Debug)]
/// # struct NoConnection;
/// # impl Connection for NoConnection {
/// #     fn enquire(&self, _: &str, _: &str, _: &[Value]) -> strata_core::Result<Option<Box<dyn QueryResult>>> {
/// #         Ok(Some(Box::new(BufferedResult::default())))
/// #     }
/// #     fn execute(&self, _: &str, _: &str, _: &[Value]) -> strata_core::Result<u64> { Ok(0) }
/// #     fn is_connected(&self) -> bool { true }
/// #     fn connect_error(&self) -> Option<String> { None }
/// #     fn connect_errno(&self) -> i32 { 0 }
/// #     fn query_error(&self) -> Option<String> { None }
/// #     fn query_errno(&self) -> i32 { 0 }
/// #     fn platform(&self) -> &str { "none" }
/// #     fn driver(&self) -> &str { "none" }
/// #     fn close(&self) {}
/// # }
/// let db = Database::new(Arc::new(NoConnection));
/// let mut query = db.select("users").field("id").cond("name", 's', "alice");
/// query.compile();
///
/// assert_eq!(query.compiled_sql(), "SELECT id FROM users WHERE name = ?");
/// assert_eq!(query.compiled_types(), "s");
/// ```
#[derive(Debug)]
pub struct SelectQuery {
    store: SegmentStore,
    connection: Arc<dyn Connection>,
    sort: Option<String>,
    limit: Option<String>,
    distinct: bool,
    count: bool,
}

impl SelectQuery {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self::with_store(SegmentStore::default(), connection)
    }

    pub(crate) fn with_store(store: SegmentStore, connection: Arc<dyn Connection>) -> Self {
        Self {
            store,
            connection,
            sort: None,
            limit: None,
            distinct: false,
            count: false,
        }
    }

    fn sort(mut self, fields: Vec<String>, direction: &str) -> Self {
        self.sort = Some(format!("ORDER BY {} {}", fields.join(", "), direction));
        self.store.invalidate();
        self
    }

    /// `ORDER BY ... ASC`, replacing any earlier ordering
    pub fn sort_asc<C: IntoColumns>(self, fields: C) -> Self {
        self.sort(fields.into_columns(), "ASC")
    }

    /// `ORDER BY ... DESC`, replacing any earlier ordering
    pub fn sort_desc<C: IntoColumns>(self, fields: C) -> Self {
        self.sort(fields.into_columns(), "DESC")
    }

    /// `LIMIT max OFFSET offset`
    pub fn range(mut self, max: u64, offset: u64) -> Self {
        self.limit = Some(format!("LIMIT {} OFFSET {}", max, offset));
        self.store.invalidate();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self.store.invalidate();
        self
    }

    /// Wrap the statement in `SELECT COUNT(*) FROM (...)`
    pub fn count(mut self) -> Self {
        self.count = true;
        self.store.invalidate();
        self
    }
}

impl QueryBuilder for SelectQuery {
    fn store(&self) -> &SegmentStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut SegmentStore {
        &mut self.store
    }

    fn compile(&mut self) {
        let store = &mut self.store;
        store.begin_compile(if self.count {
            "SELECT COUNT(*) FROM (SELECT"
        } else {
            "SELECT"
        });

        if self.distinct {
            store.push_sql(" DISTINCT");
        }
        if store.count(Group::Field) > 0 {
            store.compile_group(Group::Field);
        } else {
            store.push_sql(" *");
        }
        if store.count(Group::Table) > 0 {
            store.push_sql(" FROM");
            store.compile_group(Group::Table);
        }
        store.compile_group(Group::Join);
        if store.count(Group::Conditional) > 0 {
            store.push_sql(" WHERE");
            store.compile_group(Group::Conditional);
        }
        for clause in [&self.sort, &self.limit].into_iter().flatten() {
            store.push_sql(" ");
            store.push_sql(clause);
        }
        if self.count {
            store.push_sql(")");
        }
        store.finish_compile();
    }
}

impl Enquirable for SelectQuery {
    fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}

impl Conditional for SelectQuery {}
impl Join for SelectQuery {}
impl SelectableFields for SelectQuery {}
impl TableExtended for SelectQuery {}
