//! Driver contract: connections that run statements and the results they hand back

use std::collections::HashMap;
use std::fmt;

use crate::{Result, Value};

/// A fetched row keyed by column name
pub type Row = HashMap<String, Value>;

/// A live database connection.
///
/// Implementations bind values positionally using the type string (`s`, `i`,
/// `f`, `b`), so `types` and `values` always have the same length. Failures
/// reported by the database are soft: the call returns `Ok(None)` or
/// `Ok(0)` and the error pair becomes available through `query_error` and
/// `query_errno`. `Err` is reserved for misuse, such as a dead connection or
/// an unknown type tag.
pub trait Connection: fmt::Debug + Send + Sync {
    /// Run a statement that produces rows
    fn enquire(&self, sql: &str, types: &str, values: &[Value]) -> Result<Option<Box<dyn QueryResult>>>;

    /// Run a statement and return the number of affected rows
    fn execute(&self, sql: &str, types: &str, values: &[Value]) -> Result<u64>;

    /// Quote a value for literal inclusion in SQL text
    fn escape(&self, value: &Value) -> String {
        escape_value(value, QuoteStyle::Backslash)
    }

    fn is_connected(&self) -> bool;

    fn connect_error(&self) -> Option<String>;

    fn connect_errno(&self) -> i32;

    fn query_error(&self) -> Option<String>;

    fn query_errno(&self) -> i32;

    /// Human readable database name, e.g. `SQLite3`
    fn platform(&self) -> &str;

    /// Name the driver is registered under, e.g. `sqlite3`
    fn driver(&self) -> &str;

    fn close(&self);
}

/// Rows returned by [`Connection::enquire`]
pub trait QueryResult: fmt::Debug + Send {
    fn num_rows(&self) -> usize;

    /// Next row as positional values; `close` destroys the result afterwards
    fn fetch(&mut self, close: bool) -> Option<Vec<Value>>;

    /// Next row keyed by column name; `close` destroys the result afterwards
    fn fetch_assoc(&mut self, close: bool) -> Option<Row>;

    /// Move the cursor. Negative positions count from the end and stop at
    /// the first row.
    fn seek(&mut self, position: i64) -> bool;

    /// Release the rows; the result reports zero rows afterwards
    fn destroy(&mut self);
}

/// How text literals are quoted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    /// Backslash escapes for backslash, NUL, newline, carriage return, both
    /// quote characters and `\x1a`
    #[default]
    Backslash,
    /// Standard SQL: a single quote is doubled, nothing else changes
    Standard,
}

/// Escape a value as an SQL literal.
///
/// Numbers are written bare, booleans as `1`/`0`, null as `NULL` and bytes
/// as a hex blob literal `X'..'`. Text is quoted according to `style`.
pub fn escape_value(value: &Value, style: QuoteStyle) -> String {
    let text = match value {
        Value::Null => return "NULL".to_string(),
        Value::Bool(b) => return if *b { "1" } else { "0" }.to_string(),
        Value::I32(i) => return i.to_string(),
        Value::I64(i) => return i.to_string(),
        Value::F32(f) => return f.to_string(),
        Value::F64(f) => return f.to_string(),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
            return format!("X'{}'", hex);
        }
        Value::String(s) => s,
    };

    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('\'');
    for c in text.chars() {
        match (style, c) {
            (QuoteStyle::Standard, '\'') => escaped.push_str("''"),
            (QuoteStyle::Standard, other) => escaped.push(other),
            (QuoteStyle::Backslash, '\\') => escaped.push_str("\\\\"),
            (QuoteStyle::Backslash, '\0') => escaped.push_str("\\0"),
            (QuoteStyle::Backslash, '\n') => escaped.push_str("\\n"),
            (QuoteStyle::Backslash, '\r') => escaped.push_str("\\r"),
            (QuoteStyle::Backslash, '\'') => escaped.push_str("\\'"),
            (QuoteStyle::Backslash, '"') => escaped.push_str("\\\""),
            (QuoteStyle::Backslash, '\x1a') => escaped.push_str("\\Z"),
            (QuoteStyle::Backslash, other) => escaped.push(other),
        }
    }
    escaped.push('\'');
    escaped
}

/// A result whose rows were read completely when the statement ran
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    cursor: usize,
}

impl BufferedResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            cursor: 0,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Option<Vec<Value>> {
        let row = self.rows.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(row)
    }
}

impl QueryResult for BufferedResult {
    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn fetch(&mut self, close: bool) -> Option<Vec<Value>> {
        let row = self.next_row();
        if close {
            self.destroy();
        }
        row
    }

    fn fetch_assoc(&mut self, close: bool) -> Option<Row> {
        let row = self.next_row().map(|values| {
            self.columns
                .iter()
                .cloned()
                .zip(values)
                .collect::<Row>()
        });
        if close {
            self.destroy();
        }
        row
    }

    fn seek(&mut self, position: i64) -> bool {
        let len = self.rows.len() as i64;
        let position = if position < 0 {
            (len + position).max(0)
        } else {
            position
        };
        if position > len {
            return false;
        }
        self.cursor = position as usize;
        true
    }

    fn destroy(&mut self) {
        self.rows.clear();
        self.columns.clear();
        self.cursor = 0;
    }
}
