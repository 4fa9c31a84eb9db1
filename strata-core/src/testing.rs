//! Recording connection used by the unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::connection::{BufferedResult, Connection, QueryResult};
use crate::value::typed_params;
use crate::{Result, Value};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub sql: String,
    pub types: String,
    pub values: Vec<Value>,
}

/// Captures every statement and answers with scripted results
#[derive(Debug)]
pub(crate) struct RecordingConnection {
    calls: Mutex<Vec<Call>>,
    affected: Mutex<VecDeque<u64>>,
    rows: BufferedResult,
    failure: Option<(i32, String)>,
    connected: AtomicBool,
}

impl RecordingConnection {
    fn build(affected: VecDeque<u64>, rows: BufferedResult, failure: Option<(i32, String)>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            affected: Mutex::new(affected),
            rows,
            failure,
            connected: AtomicBool::new(true),
        })
    }

    /// Every execute reports one affected row
    pub fn new() -> Arc<Self> {
        Self::build(VecDeque::new(), BufferedResult::default(), None)
    }

    /// Affected-row counts handed out in order, then one per call
    pub fn with_affected<I: IntoIterator<Item = u64>>(counts: I) -> Arc<Self> {
        Self::build(counts.into_iter().collect(), BufferedResult::default(), None)
    }

    /// Every enquire returns a copy of these rows
    pub fn with_rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Arc<Self> {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        Self::build(VecDeque::new(), BufferedResult::new(columns, rows), None)
    }

    /// Every statement is rejected with the given error pair
    pub fn failing(code: i32, message: &str) -> Arc<Self> {
        Self::build(
            VecDeque::new(),
            BufferedResult::default(),
            Some((code, message.to_string())),
        )
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, types: &str, values: &[Value]) -> Result<()> {
        typed_params(types, values)?;
        self.calls.lock().unwrap().push(Call {
            sql: sql.to_string(),
            types: types.to_string(),
            values: values.to_vec(),
        });
        Ok(())
    }
}

impl Connection for RecordingConnection {
    fn enquire(&self, sql: &str, types: &str, values: &[Value]) -> Result<Option<Box<dyn QueryResult>>> {
        self.record(sql, types, values)?;
        if self.failure.is_some() {
            return Ok(None);
        }
        Ok(Some(Box::new(self.rows.clone())))
    }

    fn execute(&self, sql: &str, types: &str, values: &[Value]) -> Result<u64> {
        self.record(sql, types, values)?;
        if self.failure.is_some() {
            return Ok(0);
        }
        Ok(self.affected.lock().unwrap().pop_front().unwrap_or(1))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect_error(&self) -> Option<String> {
        None
    }

    fn connect_errno(&self) -> i32 {
        0
    }

    fn query_error(&self) -> Option<String> {
        self.failure.as_ref().map(|(_, message)| message.clone())
    }

    fn query_errno(&self) -> i32 {
        self.failure.as_ref().map_or(0, |(code, _)| *code)
    }

    fn platform(&self) -> &str {
        "Recording"
    }

    fn driver(&self) -> &str {
        "recording"
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
