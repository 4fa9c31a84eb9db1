//! Builder factory bound to one connection

use std::sync::Arc;

use crate::builder::{
    ConditionQuery, DeleteQuery, InsertQuery, SelectQuery, TableExtended, UpdateQuery,
    WhereConnector,
};
use crate::connection::{Connection, QueryResult};
use crate::segment::{IdAllocator, SegmentStore};
use crate::{Result, Value};

/// Handle that creates query builders for a single [`Connection`].
///
/// Cloning is cheap; clones share the connection and the id allocator.
#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<dyn Connection>,
    allocator: Arc<IdAllocator>,
}

impl Database {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self::with_allocator(connection, IdAllocator::shared())
    }

    /// Use a private id allocator instead of the process-wide one
    pub fn with_allocator(connection: Arc<dyn Connection>, allocator: Arc<IdAllocator>) -> Self {
        Self {
            connection,
            allocator,
        }
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    fn store(&self) -> SegmentStore {
        SegmentStore::new(Arc::clone(&self.allocator))
    }

    pub fn condition(&self, connector: impl Into<WhereConnector>) -> ConditionQuery {
        ConditionQuery::with_store(self.store(), connector.into())
    }

    pub fn select(&self, table: &str) -> SelectQuery {
        self.select_bare().table(table)
    }

    pub fn select_as(&self, table: &str, alias: &str) -> SelectQuery {
        self.select_bare().table_as(table, alias)
    }

    /// A SELECT with no table, for `SELECT 1` style queries or derived tables
    pub fn select_bare(&self) -> SelectQuery {
        SelectQuery::with_store(self.store(), Arc::clone(&self.connection))
    }

    pub fn insert(&self, table: &str) -> InsertQuery {
        InsertQuery::with_store(self.store(), Arc::clone(&self.connection), table, None)
    }

    pub fn insert_as(&self, table: &str, alias: &str) -> InsertQuery {
        InsertQuery::with_store(self.store(), Arc::clone(&self.connection), table, Some(alias))
    }

    pub fn update(&self, table: &str) -> UpdateQuery {
        UpdateQuery::with_store(self.store(), Arc::clone(&self.connection), table, None)
    }

    pub fn update_as(&self, table: &str, alias: &str) -> UpdateQuery {
        UpdateQuery::with_store(self.store(), Arc::clone(&self.connection), table, Some(alias))
    }

    pub fn delete(&self, table: &str) -> DeleteQuery {
        DeleteQuery::with_store(self.store(), Arc::clone(&self.connection), table, None)
    }

    pub fn delete_as(&self, table: &str, alias: &str) -> DeleteQuery {
        DeleteQuery::with_store(self.store(), Arc::clone(&self.connection), table, Some(alias))
    }

    /// Run raw SQL that produces rows
    pub fn enquire(&self, sql: &str, types: &str, values: &[Value]) -> Result<Option<Box<dyn QueryResult>>> {
        self.connection.enquire(sql, types, values)
    }

    /// Run raw SQL and return the affected-row count
    pub fn execute(&self, sql: &str, types: &str, values: &[Value]) -> Result<u64> {
        self.connection.execute(sql, types, values)
    }

    pub fn escape(&self, value: impl Into<Value>) -> String {
        self.connection.escape(&value.into())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connect_error(&self) -> Option<String> {
        self.connection.connect_error()
    }

    pub fn connect_errno(&self) -> i32 {
        self.connection.connect_errno()
    }

    pub fn query_error(&self) -> Option<String> {
        self.connection.query_error()
    }

    pub fn query_errno(&self) -> i32 {
        self.connection.query_errno()
    }

    pub fn platform(&self) -> &str {
        self.connection.platform()
    }

    pub fn driver(&self) -> &str {
        self.connection.driver()
    }

    pub fn close(&self) {
        self.connection.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Conditional, QueryBuilder};
    use crate::testing::RecordingConnection;

    #[test]
    fn test_private_allocator() {
        let allocator = Arc::new(IdAllocator::new());
        let db = Database::with_allocator(RecordingConnection::new(), Arc::clone(&allocator));

        let first = db.select("a").cond("x", 'i', 1);
        let second = db.condition("or").cond("y", 'i', 2);
        assert_eq!(first.last_segment_id().unwrap(), "1_2");
        assert_eq!(second.last_segment_id().unwrap(), "2_1");
        assert_eq!(allocator.issued(), 2);
    }

    #[test]
    fn test_pass_through() {
        let conn = RecordingConnection::new();
        let db = Database::new(conn.clone());

        assert_eq!(db.execute("DELETE FROM t WHERE a = ?", "i", &[Value::from(1)]).unwrap(), 1);
        assert!(db.enquire("SELECT 1", "", &[]).unwrap().is_some());
        assert_eq!(conn.calls().len(), 2);

        assert_eq!(db.escape("it's"), "'it\\'s'");
        assert_eq!(db.escape(3), "3");
        assert!(db.is_connected());
        assert_eq!(db.platform(), "Recording");
        assert_eq!(db.driver(), "recording");
        assert_eq!(db.query_errno(), 0);

        db.close();
        assert!(!db.is_connected());
    }

    #[test]
    fn test_select_variants() {
        let db = Database::new(RecordingConnection::new());

        let mut query = db.select_as("users", "u");
        query.compile();
        assert_eq!(query.compiled_sql(), "SELECT * FROM users u");
        assert_eq!(query.store().master_table(), Some("u"));

        let mut query = db.select_bare();
        query.compile();
        assert_eq!(query.compiled_sql(), "SELECT *");
    }
}
