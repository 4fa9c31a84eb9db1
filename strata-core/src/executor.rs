//! Query execution against a [`Connection`]
//!
//! Builders that can run themselves implement one of two traits, matching
//! the kind of statement they produce: [`Enquirable`] for SELECT, which
//! hands back rows, and [`Executable`] for INSERT, UPDATE and DELETE, which
//! report an affected-row count. Both compile the builder first when it is
//! not compiled yet.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::builder::QueryBuilder;
use crate::connection::{Connection, QueryResult, Row};
use crate::{Error, Result};

fn ensure_compiled<B: QueryBuilder + ?Sized>(builder: &mut B) {
    if !builder.is_compiled() {
        builder.compile();
    }
}

fn log_soft_failure(connection: &dyn Connection) {
    let code = connection.query_errno();
    if code != 0 {
        warn!(
            code,
            error = %connection.query_error().unwrap_or_default(),
            "statement failed"
        );
    }
}

/// Run a builder's compiled statement and return the affected-row count.
///
/// Builders that override [`Executable::execute`] call this for the
/// statement itself before doing their own follow-up work.
pub fn execute_compiled<B: Executable + ?Sized>(builder: &mut B) -> Result<u64> {
    ensure_compiled(builder);
    let connection = Arc::clone(builder.connection());
    let compiled = builder.store().compiled();

    debug!(
        sql = %compiled.sql,
        types = %compiled.types,
        params = compiled.values.len(),
        "executing statement"
    );
    let affected = connection.execute(&compiled.sql, &compiled.types, &compiled.values)?;
    if affected == 0 {
        log_soft_failure(connection.as_ref());
    }
    debug!(affected, "statement executed");
    Ok(affected)
}

/// Builders producing INSERT, UPDATE or DELETE statements
pub trait Executable: QueryBuilder {
    fn connection(&self) -> &Arc<dyn Connection>;

    /// Run the statement, compiling it first if needed
    fn execute(&mut self) -> Result<u64> {
        execute_compiled(self)
    }
}

fn deserialize_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    let object = row
        .into_iter()
        .map(|(column, value)| (column, value.to_json()))
        .collect::<serde_json::Map<_, _>>();
    Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}

/// Builders producing SELECT statements
pub trait Enquirable: QueryBuilder {
    fn connection(&self) -> &Arc<dyn Connection>;

    /// Run the query, compiling it first if needed.
    ///
    /// `Ok(None)` means the driver rejected the statement; the reason is
    /// available through the connection's `query_error`.
    fn enquire(&mut self) -> Result<Option<Box<dyn QueryResult>>> {
        ensure_compiled(self);
        let connection = Arc::clone(Enquirable::connection(self));
        let compiled = self.store().compiled();

        debug!(
            sql = %compiled.sql,
            types = %compiled.types,
            params = compiled.values.len(),
            "running query"
        );
        let result = connection.enquire(&compiled.sql, &compiled.types, &compiled.values)?;
        match &result {
            Some(rows) => debug!(rows = rows.num_rows(), "query returned"),
            None => log_soft_failure(connection.as_ref()),
        }
        Ok(result)
    }

    /// Run the query and deserialize every row into `T`
    fn fetch_all<T>(&mut self) -> Result<Vec<T>>
    where
        Self: Sized,
        T: DeserializeOwned,
    {
        let mut result = self.enquire_required()?;
        let mut rows = Vec::with_capacity(result.num_rows());
        while let Some(row) = result.fetch_assoc(false) {
            rows.push(deserialize_row(row)?);
        }
        result.destroy();
        Ok(rows)
    }

    /// Run the query and deserialize the first row, if any, into `T`
    fn fetch_optional<T>(&mut self) -> Result<Option<T>>
    where
        Self: Sized,
        T: DeserializeOwned,
    {
        let mut result = self.enquire_required()?;
        result.fetch_assoc(true).map(deserialize_row).transpose()
    }

    /// Like `enquire`, but a rejected statement becomes [`Error::Query`]
    fn enquire_required(&mut self) -> Result<Box<dyn QueryResult>>
    where
        Self: Sized,
    {
        let connection = Arc::clone(Enquirable::connection(self));
        self.enquire()?.ok_or_else(|| {
            Error::query(
                connection.query_errno(),
                connection.query_error().unwrap_or_default(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ChangeableFields, Conditional, SelectableFields};
    use crate::testing::RecordingConnection;
    use crate::{Database, Value};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    #[test]
    fn test_execute_compiles_first() {
        let conn = RecordingConnection::new();
        let db = Database::new(conn.clone());

        let mut delete = db.delete("users").cond("id", 'i', 4);
        assert!(!delete.is_compiled());
        assert_eq!(delete.execute().unwrap(), 1);
        assert!(delete.is_compiled());

        let calls = conn.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].sql, "DELETE users FROM users WHERE id = ?");
        assert_eq!(calls[0].types, "i");
        assert_eq!(calls[0].values, vec![Value::from(4)]);
    }

    #[test]
    fn test_execute_reuses_compiled_plan() {
        let conn = RecordingConnection::new();
        let db = Database::new(conn.clone());

        let mut update = db
            .update("counters")
            .add_segment_ids(["hits", "name"])
            .field("hits", 'i', 0)
            .cond("name", 's', "home");
        update.compile();

        for (hits, name) in [(1, "a"), (2, "b")] {
            update.set_segment_input("hits", [hits]);
            update.set_segment_input("name", [name]);
            update.execute().unwrap();
        }

        let calls = conn.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].sql, calls[1].sql);
        assert_eq!(calls[0].values, vec![Value::from(1), Value::from("a")]);
        assert_eq!(calls[1].values, vec![Value::from(2), Value::from("b")]);
    }

    #[test]
    fn test_enquire_returns_rows() {
        let conn = RecordingConnection::with_rows(
            &["id", "name"],
            vec![vec![Value::I64(1), Value::from("ann")]],
        );
        let db = Database::new(conn.clone());

        let mut select = db.select("users").fields(("id", "name"));
        let mut result = select.enquire().unwrap().unwrap();
        assert_eq!(result.num_rows(), 1);
        assert_eq!(result.fetch(false).unwrap()[1], Value::from("ann"));
        assert_eq!(conn.calls()[0].sql, "SELECT id, name FROM users");
    }

    #[test]
    fn test_fetch_all_deserializes() {
        let conn = RecordingConnection::with_rows(
            &["id", "name"],
            vec![
                vec![Value::I64(1), Value::from("ann")],
                vec![Value::I64(2), Value::from("bob")],
            ],
        );
        let db = Database::new(conn);

        let users: Vec<User> = db.select("users").fetch_all().unwrap();
        assert_eq!(
            users,
            vec![
                User { id: 1, name: "ann".to_string() },
                User { id: 2, name: "bob".to_string() },
            ]
        );
    }

    #[test]
    fn test_fetch_optional() {
        let conn = RecordingConnection::with_rows(&["id", "name"], vec![]);
        let db = Database::new(conn);
        let user: Option<User> = db.select("users").fetch_optional().unwrap();
        assert_eq!(user, None);
    }

    #[test]
    fn test_rejected_query_becomes_error() {
        let conn = RecordingConnection::failing(1, "no such table: users");
        let db = Database::new(conn);

        let mut select = db.select("users");
        assert!(select.enquire().unwrap().is_none());

        let err = select.fetch_all::<User>().unwrap_err();
        assert!(matches!(err, Error::Query { code: 1, .. }));
    }

    #[test]
    fn test_unknown_tag_is_hard_failure() {
        let conn = RecordingConnection::new();
        let db = Database::new(conn);
        let mut delete = db.delete("users").cond("id", 'x', 1);
        assert!(matches!(
            delete.execute(),
            Err(Error::UnknownParam { tag: 'x' })
        ));
    }
}
