//! Bare condition groups used for nesting

use super::common::Conditional;
use super::{QueryBuilder, WhereConnector};
use crate::segment::{Group, SegmentStore};

/// A standalone list of conditions with no statement keyword.
///
/// Embedded with [`Conditional::cond_group`] to mix AND and OR, or
/// compiled on its own as a reusable WHERE fragment.
#[derive(Debug)]
pub struct ConditionQuery {
    store: SegmentStore,
}

impl ConditionQuery {
    /// `"or"` joins the conditions with OR, anything else with AND
    pub fn new(connector: impl Into<WhereConnector>) -> Self {
        Self::with_store(SegmentStore::default(), connector.into())
    }

    pub(crate) fn with_store(mut store: SegmentStore, connector: WhereConnector) -> Self {
        store.set_connector(connector);
        Self { store }
    }
}

impl Default for ConditionQuery {
    fn default() -> Self {
        Self::new(WhereConnector::And)
    }
}

impl QueryBuilder for ConditionQuery {
    fn store(&self) -> &SegmentStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut SegmentStore {
        &mut self.store
    }

    fn compile(&mut self) {
        self.store.begin_compile("");
        self.store.compile_group(Group::Conditional);
        self.store.finish_compile();
    }
}

impl Conditional for ConditionQuery {}
