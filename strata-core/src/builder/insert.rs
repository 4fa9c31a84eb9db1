//! INSERT query builder implementation

use std::sync::Arc;

use tracing::debug;

use super::common::ChangeableFields;
use super::QueryBuilder;
use crate::connection::Connection;
use crate::executor::{execute_compiled, Executable};
use crate::segment::{Group, SegmentStore};
use crate::Result;

/// Builder for `INSERT` statements.
///
/// Column names are collected separately from the value segments so the
/// statement compiles to `(a, b) VALUES (?, ?)` rather than assignments.
#[derive(Debug)]
pub struct InsertQuery {
    store: SegmentStore,
    connection: Arc<dyn Connection>,
    columns: Vec<String>,
    ignore: bool,
    resolve: Option<Box<dyn Executable>>,
}

impl InsertQuery {
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
            columns: Vec::new(),
            ignore: false,
            resolve: None,
        }
    }

    /// `INSERT OR IGNORE`
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self.store.invalidate();
        self
    }

    /// Ignore conflicts and run `fallback` whenever the insert touches no row
    pub fn resolve<E>(mut self, fallback: E) -> Self
    where
        E: Executable + 'static,
    {
        self.resolve = Some(Box::new(fallback));
        self.ignore()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn fallback(&self) -> Option<&(dyn Executable + 'static)> {
        self.resolve.as_deref()
    }
}

impl QueryBuilder for InsertQuery {
    fn store(&self) -> &SegmentStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut SegmentStore {
        &mut self.store
    }

    fn compile(&mut self) {
        let store = &mut self.store;
        store.begin_compile(if self.ignore {
            "INSERT OR IGNORE INTO"
        } else {
            "INSERT INTO"
        });
        store.compile_group(Group::Table);
        if store.count(Group::Field) > 0 {
            store.push_sql(&format!(" ({}) VALUES (", self.columns.join(", ")));
            store.compile_group(Group::Field);
            store.push_sql(")");
        }
        if let Some(fallback) = self.resolve.as_mut() {
            fallback.compile();
        }
        store.finish_compile();
    }
}

impl ChangeableFields for InsertQuery {
    fn assignment_prefix(&mut self, column: &str) -> String {
        self.columns.push(column.to_string());
        String::new()
    }
}

impl Executable for InsertQuery {
    fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    fn execute(&mut self) -> Result<u64> {
        let affected = execute_compiled(self)?;
        match self.resolve.as_mut() {
            Some(fallback) if affected == 0 => {
                debug!("insert touched no row, running fallback");
                fallback.execute()
            }
            _ => Ok(affected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Conditional, SelectableFields};
    use crate::testing::RecordingConnection;
    use crate::{Database, Error, Value};

    #[test]
    fn test_insert_with_ignore() {
        let db = Database::new(RecordingConnection::new());
        let mut query = db
            .insert("t")
            .ignore()
            .field("a", 'i', 1)
            .field("b", 's', "x");
        query.compile();

        assert_eq!(
            query.compiled_sql(),
            "INSERT OR IGNORE INTO t (a, b) VALUES (?, ?)"
        );
        assert_eq!(query.compiled_types(), "is");
        assert_eq!(query.compiled_values(), &[Value::from(1), Value::from("x")]);
    }

    #[test]
    fn test_insert_expressions() {
        let db = Database::new(RecordingConnection::new());
        let latest = db.select("versions").field_expr("MAX(v) + ?", None, "i", [1]).unwrap();
        let mut query = db
            .insert("docs")
            .field("title", 's', "readme")
            .field_expr("created", "DATETIME(?)", "s", ["now"])
            .unwrap()
            .field_query("version", latest);
        query.compile();

        assert_eq!(
            query.compiled_sql(),
            "INSERT INTO docs (title, created, version) VALUES (?, DATETIME(?), (SELECT MAX(v) + ? FROM versions))"
        );
        assert_eq!(query.compiled_types(), "ssi");
        assert_eq!(query.columns(), &["title", "created", "version"]);
    }

    #[test]
    fn test_field_expr_arity() {
        let db = Database::new(RecordingConnection::new());
        let err = db
            .insert("docs")
            .field_expr("created", "DATETIME(?)", "ss", ["now"])
            .unwrap_err();
        assert!(matches!(err, Error::Argument { .. }));
    }

    #[test]
    fn test_resolve_sets_ignore() {
        let db = Database::new(RecordingConnection::new());
        let fallback = db.update("t").field("b", 's', "x").cond("a", 'i', 1);
        let mut query = db.insert("t").field("a", 'i', 1).resolve(fallback);
        query.compile();

        assert_eq!(query.compiled_sql(), "INSERT OR IGNORE INTO t (a) VALUES (?)");
        assert_eq!(
            query.fallback().map(|f| f.compiled_sql()),
            Some("UPDATE t SET b = ? WHERE a = ?")
        );
    }

    #[test]
    fn test_fallback_runs_when_nothing_inserted() {
        let conn = RecordingConnection::with_affected([0, 1]);
        let db = Database::new(conn.clone());
        let fallback = db.update("t").field("b", 's', "x").cond("a", 'i', 1);
        let mut query = db.insert("t").field("a", 'i', 1).resolve(fallback);

        assert_eq!(query.execute().unwrap(), 1);
        let calls = conn.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].sql.starts_with("INSERT OR IGNORE"));
        assert!(calls[1].sql.starts_with("UPDATE t"));
    }

    #[test]
    fn test_fallback_skipped_when_inserted() {
        let conn = RecordingConnection::with_affected([1]);
        let db = Database::new(conn.clone());
        let fallback = db.update("t").field("b", 's', "x");
        let mut query = db.insert("t").field("a", 'i', 1).resolve(fallback);

        assert_eq!(query.execute().unwrap(), 1);
        assert_eq!(conn.calls().len(), 1);
    }
}
