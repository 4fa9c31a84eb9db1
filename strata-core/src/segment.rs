//! Segment store shared by every query builder
//!
//! A builder keeps no clause-specific SQL fields. Every call that adds SQL
//! appends one segment to one of four groups, and compiling walks the groups
//! in the order the statement kind requires. Segments carry their own bound
//! values, so a compiled statement can have its parameters swapped without
//! rebuilding the SQL text.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::trace;

use crate::builder::{QueryBuilder, WhereConnector};
use crate::{Error, Result, Value};

/// Divider between consecutive field segments
pub const FIELD_DIVIDER: &str = ", ";
/// Divider between consecutive table segments
pub const TABLE_DIVIDER: &str = ", ";
/// Divider between consecutive join segments
pub const JOIN_DIVIDER: &str = " ";

/// The clause a segment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Group {
    Field,
    Table,
    Join,
    Conditional,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Field => "field",
            Group::Table => "table",
            Group::Join => "join",
            Group::Conditional => "conditional",
        }
    }
}

/// Identifier of a single segment, either generated or caller-reserved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SegmentId {
    fn from(id: &str) -> Self {
        SegmentId(id.to_string())
    }
}

impl From<String> for SegmentId {
    fn from(id: String) -> Self {
        SegmentId(id)
    }
}

impl Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for SegmentId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SegmentId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Hands out builder instance numbers used as the prefix of generated ids.
///
/// Instance numbers are only drawn when a builder generates its first id, so
/// builders that only ever use reserved ids do not consume one.
#[derive(Debug, Default)]
pub struct IdAllocator {
    counter: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide allocator used when none is injected
    pub fn shared() -> Arc<IdAllocator> {
        static SHARED: OnceLock<Arc<IdAllocator>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(IdAllocator::new())))
    }

    pub fn next_instance(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of instance numbers handed out so far
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
enum Input {
    Bound {
        types: String,
        values: Vec<Value>,
    },
    Query {
        builder: Box<dyn QueryBuilder>,
        before: String,
        after: String,
        // Copied out of the sub-builder on every compile
        types: Option<String>,
        values: Option<Vec<Value>>,
    },
}

impl Input {
    fn bound(&self) -> (&str, &[Value]) {
        match self {
            Input::Bound { types, values } => (types, values),
            Input::Query { types, values, .. } => {
                (types.as_deref().unwrap_or(""), values.as_deref().unwrap_or(&[]))
            }
        }
    }
}

/// One fragment of SQL together with the values it binds
#[derive(Debug)]
pub struct Segment {
    id: SegmentId,
    divider: &'static str,
    sql: String,
    input: Input,
    // Position of the first value inside the compiled value list
    offset: Option<usize>,
}

impl Segment {
    pub fn id(&self) -> &SegmentId {
        &self.id
    }

    /// SQL text of the segment.
    ///
    /// For a sub-query segment this is `before%safter` until the owning
    /// builder is compiled, and the resolved text afterwards.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn divider(&self) -> &str {
        self.divider
    }

    pub fn types(&self) -> &str {
        self.input.bound().0
    }

    pub fn values(&self) -> &[Value] {
        self.input.bound().1
    }

    pub fn is_query(&self) -> bool {
        matches!(self.input, Input::Query { .. })
    }
}

/// Output of a compile: statement text plus positional parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub types: String,
    pub values: Vec<Value>,
}

/// Strip whitespace from a type string and check it against the value count
pub(crate) fn normalize_types(types: &str, count: usize) -> Result<String> {
    let types: String = types.chars().filter(|c| !c.is_whitespace()).collect();
    let declared = types.chars().count();
    if declared != count {
        return Err(Error::argument(format!(
            "The type definitions do not match the input data ({} types, {} values)",
            declared, count
        )));
    }
    Ok(types)
}

/// Ordered segment groups plus the bookkeeping needed to compile them
#[derive(Debug)]
pub struct SegmentStore {
    allocator: Arc<IdAllocator>,
    instance: Option<u64>,
    field_counter: u64,
    reserved: VecDeque<SegmentId>,
    groups: BTreeMap<Group, Vec<Segment>>,
    record_ids: bool,
    issued: Vec<SegmentId>,
    last_id: Option<SegmentId>,
    compiled: Compiled,
    is_compiled: bool,
    connector: WhereConnector,
    master_table: Option<String>,
}

impl Default for SegmentStore {
    fn default() -> Self {
        Self::new(IdAllocator::shared())
    }
}

impl SegmentStore {
    pub fn new(allocator: Arc<IdAllocator>) -> Self {
        Self {
            allocator,
            instance: None,
            field_counter: 0,
            reserved: VecDeque::new(),
            groups: BTreeMap::new(),
            record_ids: false,
            issued: Vec::new(),
            last_id: None,
            compiled: Compiled::default(),
            is_compiled: false,
            connector: WhereConnector::And,
            master_table: None,
        }
    }

    fn next_id(&mut self) -> SegmentId {
        if let Some(id) = self.reserved.pop_front() {
            return id;
        }
        let allocator = &self.allocator;
        let instance = *self
            .instance
            .get_or_insert_with(|| allocator.next_instance());
        self.field_counter += 1;
        SegmentId(format!("{}_{}", instance, self.field_counter))
    }

    /// Queue ids to be used, in order, by the next segments added
    pub fn reserve_segment_ids<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<SegmentId>,
    {
        self.reserved.extend(ids.into_iter().map(Into::into));
    }

    /// Keep an ordered log of every id handed out from now on
    pub fn enable_segment_id(&mut self, enable: bool) {
        self.record_ids = enable;
    }

    pub fn segment_ids(&self) -> &[SegmentId] {
        &self.issued
    }

    pub fn last_segment_id(&self) -> Option<&SegmentId> {
        self.last_id.as_ref()
    }

    /// Append a segment whose values are bound directly.
    ///
    /// Whitespace in `types` is ignored; the remaining tag count must equal
    /// the number of values.
    pub fn add_segment(
        &mut self,
        group: Group,
        divider: &'static str,
        sql: impl Into<String>,
        types: &str,
        values: Vec<Value>,
    ) -> Result<SegmentId> {
        let types = normalize_types(types, values.len())?;
        Ok(self.push_bound(group, divider, sql.into(), types, values))
    }

    /// Append a segment that embeds another builder.
    ///
    /// `template` must contain `%s` exactly once; it marks where the compiled
    /// text of `builder` is placed.
    pub fn add_query_segment(
        &mut self,
        group: Group,
        divider: &'static str,
        template: &str,
        builder: Box<dyn QueryBuilder>,
    ) -> Result<SegmentId> {
        let (before, after) = template
            .split_once("%s")
            .ok_or_else(|| Error::argument("Sub-query template has no %s placeholder"))?;
        if after.contains("%s") {
            return Err(Error::argument(
                "Sub-query template has more than one %s placeholder",
            ));
        }
        Ok(self.push_query(group, divider, before.to_string(), after.to_string(), builder))
    }

    pub(crate) fn push_bound(
        &mut self,
        group: Group,
        divider: &'static str,
        sql: String,
        types: String,
        values: Vec<Value>,
    ) -> SegmentId {
        self.push(group, divider, sql, Input::Bound { types, values })
    }

    pub(crate) fn push_query(
        &mut self,
        group: Group,
        divider: &'static str,
        before: String,
        after: String,
        builder: Box<dyn QueryBuilder>,
    ) -> SegmentId {
        let sql = format!("{}%s{}", before, after);
        self.push(
            group,
            divider,
            sql,
            Input::Query {
                builder,
                before,
                after,
                types: None,
                values: None,
            },
        )
    }

    fn push(&mut self, group: Group, divider: &'static str, sql: String, input: Input) -> SegmentId {
        let id = self.next_id();
        trace!(group = group.as_str(), id = %id, sql = %sql, "adding segment");

        self.groups.entry(group).or_default().push(Segment {
            id: id.clone(),
            divider,
            sql,
            input,
            offset: None,
        });
        if self.record_ids {
            self.issued.push(id.clone());
        }
        self.last_id = Some(id.clone());
        self.is_compiled = false;
        id
    }

    /// Add a plain table, the first one added becomes the master table
    pub(crate) fn push_table(&mut self, table: &str, alias: Option<&str>) -> SegmentId {
        if self.master_table.is_none() {
            self.master_table = Some(alias.unwrap_or(table).to_string());
        }
        let sql = match alias {
            Some(alias) => format!("{} {}", table, alias),
            None => table.to_string(),
        };
        self.push_bound(Group::Table, TABLE_DIVIDER, sql, String::new(), Vec::new())
    }

    /// Add a derived table; only an alias can name the master table here
    pub(crate) fn push_table_query(
        &mut self,
        builder: Box<dyn QueryBuilder>,
        alias: Option<&str>,
    ) -> SegmentId {
        if let (None, Some(alias)) = (&self.master_table, alias) {
            self.master_table = Some(alias.to_string());
        }
        let after = match alias {
            Some(alias) => format!(") {}", alias),
            None => ")".to_string(),
        };
        self.push_query(Group::Table, TABLE_DIVIDER, "(".to_string(), after, builder)
    }

    pub fn master_table(&self) -> Option<&str> {
        self.master_table.as_deref()
    }

    pub fn set_connector(&mut self, connector: WhereConnector) {
        self.connector = connector;
    }

    pub fn connector(&self) -> &WhereConnector {
        &self.connector
    }

    /// Divider placed in front of the next conditional segment
    pub fn condition_divider(&self) -> &'static str {
        match self.connector {
            WhereConnector::And => " AND ",
            WhereConnector::Or => " OR ",
        }
    }

    pub fn count(&self, group: Group) -> usize {
        self.groups.get(&group).map_or(0, Vec::len)
    }

    pub fn segments(&self, group: Group) -> &[Segment] {
        self.groups.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the values of every bound segment with the given id.
    ///
    /// Values are assigned positionally; extra values are ignored and
    /// missing ones keep their current binding. Ids living in nested
    /// builders are forwarded to them. When the store is compiled the
    /// compiled values are patched in place. Returns whether any segment
    /// matched.
    pub fn set_segment_input(&mut self, id: &str, values: &[Value]) -> bool {
        let patch = self.is_compiled;
        let compiled_values = &mut self.compiled.values;
        let mut found = false;

        for segment in self.groups.values_mut().flatten() {
            match &mut segment.input {
                Input::Bound { values: bound, .. } if segment.id == id => {
                    let n = bound.len().min(values.len());
                    bound[..n].clone_from_slice(&values[..n]);
                    if let (true, Some(offset)) = (patch, segment.offset) {
                        if let Some(slot) = compiled_values.get_mut(offset..offset + n) {
                            slot.clone_from_slice(&values[..n]);
                        }
                    }
                    found = true;
                }
                Input::Query {
                    builder,
                    values: copied,
                    ..
                } => {
                    if !builder.store_mut().set_segment_input(id, values) {
                        continue;
                    }
                    found = true;
                    if !builder.is_compiled() {
                        continue;
                    }
                    let nested = builder.compiled_values();
                    if let Some(copied) = copied.as_mut() {
                        copied.clear();
                        copied.extend_from_slice(nested);
                    }
                    if let (true, Some(offset)) = (patch, segment.offset) {
                        if let Some(slot) = compiled_values.get_mut(offset..offset + nested.len()) {
                            slot.clone_from_slice(nested);
                        }
                    }
                }
                Input::Bound { .. } => {}
            }
        }

        if !found {
            trace!(id, "no segment matched the given id");
        }
        found
    }

    /// Set every bound value to null, including those of nested builders
    pub fn clear_segment_input(&mut self) {
        for segment in self.groups.values_mut().flatten() {
            match &mut segment.input {
                Input::Bound { values, .. } => values.fill(Value::Null),
                Input::Query {
                    builder, values, ..
                } => {
                    builder.store_mut().clear_segment_input();
                    if let Some(values) = values {
                        values.fill(Value::Null);
                    }
                }
            }
        }
        self.compiled.values.fill(Value::Null);
    }

    /// Reset the compiled triple and start the statement text with `head`
    pub fn begin_compile(&mut self, head: impl Into<String>) {
        self.compiled = Compiled {
            sql: head.into(),
            ..Compiled::default()
        };
    }

    pub fn push_sql(&mut self, sql: &str) {
        self.compiled.sql.push_str(sql);
    }

    /// Append one group to the statement being compiled.
    ///
    /// A single space is written first unless nothing has been written yet
    /// or the text ends with an opening parenthesis. Nested builders are
    /// recompiled and their text, types and values spliced in.
    pub fn compile_group(&mut self, group: Group) {
        let Self {
            groups, compiled, ..
        } = self;
        let Some(segments) = groups.get_mut(&group) else {
            return;
        };
        if segments.is_empty() {
            return;
        }
        if !compiled.sql.is_empty() && !compiled.sql.ends_with('(') {
            compiled.sql.push(' ');
        }

        for (index, segment) in segments.iter_mut().enumerate() {
            if index > 0 {
                compiled.sql.push_str(segment.divider);
            }
            if let Input::Query {
                builder,
                before,
                after,
                types,
                values,
            } = &mut segment.input
            {
                builder.compile();
                segment.sql = format!("{}{}{}", before, builder.compiled_sql(), after);
                *types = Some(builder.compiled_types().to_string());
                *values = Some(builder.compiled_values().to_vec());
            }

            compiled.sql.push_str(&segment.sql);
            let (types, values) = segment.input.bound();
            segment.offset = Some(compiled.values.len());
            compiled.types.push_str(types);
            compiled.values.extend_from_slice(values);
        }
    }

    pub fn finish_compile(&mut self) {
        self.is_compiled = true;
        trace!(
            sql = %self.compiled.sql,
            types = %self.compiled.types,
            "compiled statement"
        );
    }

    /// Mark the compiled output as stale
    pub fn invalidate(&mut self) {
        self.is_compiled = false;
    }

    pub fn is_compiled(&self) -> bool {
        self.is_compiled
    }

    pub fn compiled(&self) -> &Compiled {
        &self.compiled
    }
}
