//! SQLite driver built on sqlx
//!
//! The connection contract is synchronous, so each connection owns a
//! single-threaded tokio runtime and blocks on the sqlx futures. Do not use
//! it from inside another tokio runtime.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::TryStreamExt;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection as _, Row, TypeInfo, ValueRef};
use strata_core::{
    escape_value, typed_params, BufferedResult, Connection, QueryResult, QuoteStyle, TypeTag,
    Value,
};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::Result;

/// Name the driver is registered under
pub const DRIVER_NAME: &str = "sqlite3";

const PLATFORM: &str = "SQLite3";
const BUSY_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Default)]
struct State {
    conn: Option<sqlx::SqliteConnection>,
    connect_error: Option<String>,
    connect_errno: i32,
    query_error: Option<String>,
    query_errno: i32,
}

impl State {
    fn record_query_error(&mut self, err: &sqlx::Error) {
        let (code, message) = error_pair(err);
        warn!(code, error = %message, "sqlite statement failed");
        self.query_errno = code;
        self.query_error = Some(message);
    }

    fn clear_query_error(&mut self) {
        self.query_errno = 0;
        self.query_error = None;
    }
}

/// A single SQLite database connection
pub struct SqliteConnection {
    runtime: Runtime,
    state: Mutex<State>,
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("SqliteConnection")
            .field("connected", &state.conn.is_some())
            .field("connect_errno", &state.connect_errno)
            .field("query_errno", &state.query_errno)
            .finish()
    }
}

fn error_pair(err: &sqlx::Error) -> (i32, String) {
    match err {
        sqlx::Error::Database(db) => (
            db.code().and_then(|code| code.parse().ok()).unwrap_or(1),
            db.message().to_string(),
        ),
        other => (1, other.to_string()),
    }
}

fn connect_options(target: &str) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    let options = match target {
        "" | ":memory:" => SqliteConnectOptions::from_str("sqlite::memory:")?,
        file => SqliteConnectOptions::new().filename(file),
    };
    Ok(options.create_if_missing(true).busy_timeout(BUSY_TIMEOUT))
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[(TypeTag, &Value)],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for (position, (tag, value)) in params.iter().enumerate() {
        query = match tag {
            TypeTag::Text => query.bind(value.as_text()),
            TypeTag::Integer => {
                let number = value.as_i64();
                warn_if_dropped(position, *tag, value, number.is_none());
                query.bind(number)
            }
            TypeTag::Float => {
                let number = value.as_f64();
                warn_if_dropped(position, *tag, value, number.is_none());
                query.bind(number)
            }
            TypeTag::Blob => query.bind(value.as_blob()),
        };
    }
    query
}

/// A non-null value with no numeric reading is bound as NULL
fn warn_if_dropped(position: usize, tag: TypeTag, value: &Value, dropped: bool) {
    if dropped && !value.is_null() {
        warn!(position, ?tag, ?value, "value is not numeric, binding NULL");
    }
}

fn decode_column(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(index).map(Value::I64),
        "REAL" | "NUMERIC" => row.try_get_unchecked::<f64, _>(index).map(Value::F64),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index).map(Value::Bytes),
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };
    decoded.unwrap_or(Value::Null)
}

fn buffer_rows(rows: Vec<SqliteRow>) -> BufferedResult {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect()
        })
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|index| decode_column(row, index)).collect())
        .collect();
    BufferedResult::new(columns, rows)
}

impl SqliteConnection {
    /// Open `target`, a file path or `:memory:`.
    ///
    /// Failing to open the database is not an error here: the connection
    /// reports `is_connected() == false` and exposes the reason through
    /// `connect_error`.
    pub fn open(target: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let mut state = State::default();
        let opened = connect_options(target);
        let opened = match opened {
            Ok(options) => runtime.block_on(options.connect()),
            Err(err) => Err(err),
        };
        match opened {
            Ok(conn) => {
                info!(path = target, "opened sqlite database");
                state.conn = Some(conn);
            }
            Err(err) => {
                let (code, message) = error_pair(&err);
                warn!(path = target, code, error = %message, "could not open sqlite database");
                state.connect_errno = code;
                state.connect_error = Some(message);
            }
        }

        Ok(Self {
            runtime,
            state: Mutex::new(state),
        })
    }

    /// Factory used by the driver registry
    pub fn open_shared(target: &str) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(Self::open(target)?))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connection for SqliteConnection {
    fn enquire(
        &self,
        sql: &str,
        types: &str,
        values: &[Value],
    ) -> strata_core::Result<Option<Box<dyn QueryResult>>> {
        let params = typed_params(types, values)?;
        let mut state = self.lock();
        let conn = state
            .conn
            .as_mut()
            .ok_or_else(|| strata_core::Error::dead_resource("query"))?;

        debug!(sql, params = params.len(), "sqlite enquire");
        let query = bind_params(sqlx::query(sql), &params);
        let fetched: std::result::Result<Vec<SqliteRow>, sqlx::Error> =
            self.runtime.block_on(query.fetch(&mut *conn).try_collect());

        match fetched {
            Ok(rows) => {
                state.clear_query_error();
                Ok(Some(Box::new(buffer_rows(rows))))
            }
            Err(err) => {
                state.record_query_error(&err);
                Ok(None)
            }
        }
    }

    fn execute(&self, sql: &str, types: &str, values: &[Value]) -> strata_core::Result<u64> {
        let params = typed_params(types, values)?;
        let mut state = self.lock();
        let conn = state
            .conn
            .as_mut()
            .ok_or_else(|| strata_core::Error::dead_resource("query"))?;

        debug!(sql, params = params.len(), "sqlite execute");
        let query = bind_params(sqlx::query(sql), &params);
        match self.runtime.block_on(query.execute(&mut *conn)) {
            Ok(done) => {
                state.clear_query_error();
                Ok(done.rows_affected())
            }
            Err(err) => {
                state.record_query_error(&err);
                Ok(0)
            }
        }
    }

    /// SQLite has no backslash escapes; quotes are doubled instead
    fn escape(&self, value: &Value) -> String {
        escape_value(value, QuoteStyle::Standard)
    }

    fn is_connected(&self) -> bool {
        self.lock().conn.is_some()
    }

    fn connect_error(&self) -> Option<String> {
        self.lock().connect_error.clone()
    }

    fn connect_errno(&self) -> i32 {
        self.lock().connect_errno
    }

    fn query_error(&self) -> Option<String> {
        self.lock().query_error.clone()
    }

    fn query_errno(&self) -> i32 {
        self.lock().query_errno
    }

    fn platform(&self) -> &str {
        PLATFORM
    }

    fn driver(&self) -> &str {
        DRIVER_NAME
    }

    fn close(&self) {
        let conn = self.lock().conn.take();
        if let Some(conn) = conn {
            match self.runtime.block_on(conn.close()) {
                Ok(()) => info!("closed sqlite database"),
                Err(err) => warn!(error = %err, "closing sqlite database failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::prelude::*;

    fn memory() -> SqliteConnection {
        SqliteConnection::open(":memory:").unwrap()
    }

    fn seeded() -> Database {
        let db = Database::new(Arc::new(memory()));
        db.execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL, avatar BLOB)",
            "",
            &[],
        )
        .unwrap();
        for (name, score) in [("ann", 1.5), ("bob", 2.5), ("cy", 3.5)] {
            db.insert("users")
                .field("name", 's', name)
                .field("score", 'f', score)
                .execute()
                .unwrap();
        }
        db
    }

    #[test]
    fn test_open_memory() {
        let conn = memory();
        assert!(conn.is_connected());
        assert_eq!(conn.connect_errno(), 0);
        assert_eq!(conn.connect_error(), None);
        assert_eq!(conn.driver(), "sqlite3");
        assert_eq!(conn.platform(), "SQLite3");
    }

    #[test]
    fn test_open_failure_is_captured() {
        let conn = SqliteConnection::open("/definitely/missing/dir/app.db").unwrap();
        assert!(!conn.is_connected());
        assert_ne!(conn.connect_errno(), 0);
        assert!(conn.connect_error().is_some());
        assert!(matches!(
            conn.execute("SELECT 1", "", &[]),
            Err(strata_core::Error::DeadResource { .. })
        ));
    }

    #[test]
    fn test_insert_and_select() {
        let db = seeded();
        let mut query = db
            .select("users")
            .fields(("id", "name", "score"))
            .cond_op("score", ">", 'f', 2.0)
            .sort_asc("id");
        let mut result = query.enquire().unwrap().unwrap();

        assert_eq!(result.num_rows(), 2);
        let row = result.fetch_assoc(false).unwrap();
        assert_eq!(row["name"], Value::from("bob"));
        assert_eq!(row["score"], Value::F64(2.5));
        assert_eq!(row["id"], Value::I64(2));
        result.destroy();
        assert_eq!(result.num_rows(), 0);
    }

    #[test]
    fn test_null_and_blob_binding() {
        let db = seeded();
        db.update("users")
            .field("avatar", 'b', vec![0u8, 1, 2])
            .field("score", 'f', Value::Null)
            .cond("name", 's', "ann")
            .execute()
            .unwrap();

        let mut result = db
            .select("users")
            .fields(("avatar", "score"))
            .cond("name", 's', "ann")
            .enquire()
            .unwrap()
            .unwrap();
        let row = result.fetch(true).unwrap();
        assert_eq!(row, vec![Value::Bytes(vec![0, 1, 2]), Value::Null]);
    }

    #[test]
    fn test_non_numeric_text_binds_null() {
        let db = seeded();
        db.update("users")
            .field("score", 'f', "lots")
            .field("id", 'i', " 7 ")
            .cond("name", 's', "bob")
            .execute()
            .unwrap();
        assert_eq!(db.query_errno(), 0);

        let mut result = db
            .select("users")
            .fields(("id", "score"))
            .cond("name", 's', "bob")
            .enquire()
            .unwrap()
            .unwrap();
        assert_eq!(result.fetch(true).unwrap(), vec![Value::I64(7), Value::Null]);

        let mut result = db
            .select("users")
            .field("name")
            .cond("id", 'i', "abc")
            .enquire()
            .unwrap()
            .unwrap();
        assert_eq!(result.num_rows(), 0);
    }

    #[test]
    fn test_failed_statement_is_soft() {
        let conn = memory();
        assert!(conn.enquire("SELECT * FROM nowhere", "", &[]).unwrap().is_none());
        assert_ne!(conn.query_errno(), 0);
        assert!(conn.query_error().unwrap().contains("nowhere"));

        assert_eq!(conn.execute("UPDATE nowhere SET a = 1", "", &[]).unwrap(), 0);

        conn.execute("CREATE TABLE t (a INTEGER)", "", &[]).unwrap();
        assert_eq!(conn.query_errno(), 0);
        assert_eq!(conn.query_error(), None);
    }

    #[test]
    fn test_unknown_tag_aborts() {
        let conn = memory();
        assert!(matches!(
            conn.execute("SELECT ?", "d", &[Value::from(1)]),
            Err(strata_core::Error::UnknownParam { tag: 'd' })
        ));
    }

    #[test]
    fn test_rebind_and_execute_again() {
        let db = seeded();
        let mut update = db
            .update("users")
            .add_segment_ids(["score", "name"])
            .field("score", 'f', 0.0)
            .cond("name", 's', "");
        update.compile();

        for (name, score) in [("ann", 10.0), ("bob", 20.0), ("nobody", 30.0)] {
            let affected = update
                .set_segment_input("score", [score])
                .set_segment_input("name", [name])
                .execute()
                .unwrap();
            assert_eq!(affected, if name == "nobody" { 0 } else { 1 });
        }

        let mut result = db
            .select("users")
            .field("SUM(score)")
            .enquire()
            .unwrap()
            .unwrap();
        assert_eq!(result.fetch(true).unwrap()[0], Value::F64(33.5));
    }

    #[test]
    fn test_count_query() {
        let db = seeded();
        let mut result = db.select("users").count().enquire().unwrap().unwrap();
        assert_eq!(result.fetch(true).unwrap()[0], Value::I64(3));
    }

    #[test]
    fn test_escape_doubles_quotes() {
        let conn = memory();
        assert_eq!(conn.escape(&Value::from("a\"b'c\\")), "'a\"b''c\\'");
        assert_eq!(conn.escape(&Value::Bytes(vec![0xde, 0xad])), "X'DEAD'");
    }

    #[test]
    fn test_escaped_literal_cannot_break_out() {
        let db = seeded();
        let sql = format!(
            "SELECT name FROM users WHERE name = {}",
            db.escape("' OR 1=1 --")
        );
        let result = db.enquire(&sql, "", &[]).unwrap().unwrap();
        assert_eq!(db.query_error(), None);
        assert_eq!(result.num_rows(), 0);

        let sql = format!("SELECT name FROM users WHERE name = {}", db.escape("bob"));
        let mut result = db.enquire(&sql, "", &[]).unwrap().unwrap();
        assert_eq!(result.fetch(true).unwrap(), vec![Value::from("bob")]);

        let sql = format!("SELECT {}", db.escape("it's a \\ test"));
        let mut result = db.enquire(&sql, "", &[]).unwrap().unwrap();
        assert_eq!(result.fetch(true).unwrap(), vec![Value::from("it's a \\ test")]);
    }

    #[test]
    fn test_close() {
        let conn = memory();
        conn.close();
        assert!(!conn.is_connected());
        conn.close();
        assert!(matches!(
            conn.enquire("SELECT 1", "", &[]),
            Err(strata_core::Error::DeadResource { .. })
        ));
    }
}
