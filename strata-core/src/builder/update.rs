//! UPDATE query builder implementation

use std::sync::Arc;

use tracing::debug;

use super::common::{ChangeableFields, Conditional, Join};
use super::QueryBuilder;
use crate::connection::Connection;
use crate::executor::{execute_compiled, Executable};
use crate::segment::{Group, SegmentStore};
use crate::Result;

/// Builder for `UPDATE` statements
#[derive(Debug)]
pub struct UpdateQuery {
    store: SegmentStore,
    connection: Arc<dyn Connection>,
    ignore: bool,
    resolve: Option<Box<dyn Executable>>,
}

impl UpdateQuery {
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
        Self {
            store,
            connection,
            ignore: false,
            resolve: None,
        }
    }

    /// `UPDATE OR IGNORE`
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self.store.invalidate();
        self
    }

    /// Ignore conflicts and run `fallback` whenever the update touches no
    /// row, typically an insert of the same data
    pub fn resolve<E>(mut self, fallback: E) -> Self
    where
        E: Executable + 'static,
    {
        self.resolve = Some(Box::new(fallback));
        self.ignore()
    }

    pub fn fallback(&self) -> Option<&(dyn Executable + 'static)> {
        self.resolve.as_deref()
    }
}

impl QueryBuilder for UpdateQuery {
    fn store(&self) -> &SegmentStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut SegmentStore {
        &mut self.store
    }

    fn compile(&mut self) {
        let store = &mut self.store;
        store.begin_compile(if self.ignore {
            "UPDATE OR IGNORE"
        } else {
            "UPDATE"
        });
        store.compile_group(Group::Table);
        store.compile_group(Group::Join);
        if store.count(Group::Field) > 0 {
            store.push_sql(" SET");
            store.compile_group(Group::Field);
        }
        if store.count(Group::Conditional) > 0 {
            store.push_sql(" WHERE");
            store.compile_group(Group::Conditional);
        }
        if let Some(fallback) = self.resolve.as_mut() {
            fallback.compile();
        }
        store.finish_compile();
    }
}

impl ChangeableFields for UpdateQuery {
    fn assignment_prefix(&mut self, column: &str) -> String {
        format!("{} = ", column)
    }
}

impl Conditional for UpdateQuery {}
impl Join for UpdateQuery {}

impl Executable for UpdateQuery {
    fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    fn execute(&mut self) -> Result<u64> {
        let affected = execute_compiled(self)?;
        match self.resolve.as_mut() {
            Some(fallback) if affected == 0 => {
                debug!("update touched no row, running fallback");
                fallback.execute()
            }
            _ => Ok(affected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SelectableFields;
    use crate::testing::RecordingConnection;
    use crate::{Database, Value};

    #[test]
    fn test_basic_update() {
        let db = Database::new(RecordingConnection::new());
        let mut query = db
            .update("users")
            .field("name", 's', "ann")
            .field("age", 'i', 30)
            .cond("id", 'i', 7);
        query.compile();

        assert_eq!(
            query.compiled_sql(),
            "UPDATE users SET name = ?, age = ? WHERE id = ?"
        );
        assert_eq!(query.compiled_types(), "sii");
        assert_eq!(
            query.compiled_values(),
            &[Value::from("ann"), Value::from(30), Value::from(7)]
        );
    }

    #[test]
    fn test_update_with_join_and_expr() {
        let db = Database::new(RecordingConnection::new());
        let mut query = db
            .update_as("users", "u")
            .join("profiles", "p", "user_id", Some("u.id"))
            .field_expr("u.score", "u.score + ?", "i", [5])
            .unwrap()
            .cond("p.verified", 'i', 1);
        query.compile();

        assert_eq!(
            query.compiled_sql(),
            "UPDATE users u INNER JOIN profiles p ON user_id = u.id SET u.score = u.score + ? WHERE p.verified = ?"
        );
    }

    #[test]
    fn test_field_query() {
        let db = Database::new(RecordingConnection::new());
        let total = db
            .select("orders")
            .field("COUNT(*)")
            .cond("user_id", 'i', 3);
        let mut query = db
            .update("users")
            .field_query("orders", total)
            .cond("id", 'i', 3);
        query.compile();

        assert_eq!(
            query.compiled_sql(),
            "UPDATE users SET orders = (SELECT COUNT(*) FROM orders WHERE user_id = ?) WHERE id = ?"
        );
        assert_eq!(query.compiled_types(), "ii");
    }

    #[test]
    fn test_update_fallback_to_insert() {
        let conn = RecordingConnection::with_affected([0, 1]);
        let db = Database::new(conn.clone());
        let insert = db.insert("cache").field("k", 's', "a").field("v", 's', "1");
        let mut query = db
            .update("cache")
            .field("v", 's', "1")
            .cond("k", 's', "a")
            .resolve(insert);

        assert_eq!(query.execute().unwrap(), 1);
        let calls = conn.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].sql,
            "UPDATE OR IGNORE cache SET v = ? WHERE k = ?"
        );
        assert_eq!(calls[1].sql, "INSERT INTO cache (k, v) VALUES (?, ?)");
    }

    #[test]
    fn test_fallback_not_run_on_hit() {
        let conn = RecordingConnection::with_affected([2]);
        let db = Database::new(conn.clone());
        let insert = db.insert("cache").field("k", 's', "a");
        let mut query = db.update("cache").field("v", 's', "1").resolve(insert);

        assert_eq!(query.execute().unwrap(), 2);
        assert_eq!(conn.calls().len(), 1);
    }

    #[test]
    fn test_ignore_invalidates() {
        let db = Database::new(RecordingConnection::new());
        let mut query = db.update("t").field("a", 'i', 1);
        query.compile();
        let mut query = query.ignore();
        assert!(!query.is_compiled());
        query.compile();
        assert_eq!(query.compiled_sql(), "UPDATE OR IGNORE t SET a = ?");
    }
}
