//! DELETE query builder implementation

use std::sync::Arc;

use super::common::{Conditional, Join};
use super::QueryBuilder;
use crate::connection::Connection;
use crate::executor::Executable;
use crate::segment::{Group, SegmentStore};

/// Builder for `DELETE` statements.
///
/// The master table (its alias when one was given) names the delete target:
/// `DELETE u FROM users u ...`.
#[derive(Debug)]
pub struct DeleteQuery {
    store: SegmentStore,
    connection: Arc<dyn Connection>,
}

impl DeleteQuery {
    pub fn new(connection: Arc<dyn Connection>, table: &str, alias: Option<&str>) -> Self {
        Self::with_store(SegmentStore::default(), connection, table, alias)
    }

    pub(crate) fn with_store(
        mut store: SegmentStore,
        connection: Arc<dyn Connection>,
        table: &str,
        alias: Option<&str>,
    ) -> Self {
        store.push_table(table, alias);
        Self { store, connection }
    }
}

impl QueryBuilder for DeleteQuery {
    fn store(&self) -> &SegmentStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut SegmentStore {
        &mut self.store
    }

    fn compile(&mut self) {
        let head = format!("DELETE {} FROM", self.store.master_table().unwrap_or_default());
        let store = &mut self.store;
        store.begin_compile(head);
        store.compile_group(Group::Table);
        store.compile_group(Group::Join);
        if store.count(Group::Conditional) > 0 {
            store.push_sql(" WHERE");
            store.compile_group(Group::Conditional);
        }
        store.finish_compile();
    }
}

impl Conditional for DeleteQuery {}
impl Join for DeleteQuery {}

impl Executable for DeleteQuery {
    fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}
