//! The `Index` surface
//!
//! An `Index` wraps its state in one reader/writer lock: queries,
//! materialization and view construction share read access; registration,
//! removal and dispatched mutations take the write side. That makes every
//! `(remove old, insert new)` posting update atomic with respect to
//! concurrent queries.
//!
//! Views and record observers share the index state through `Arc`; records
//! hold only weak links back, so dropping the last `Index` clone (and its
//! views) unhooks every observer.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use crate::atom::Atom;
use crate::query::eval::{evaluate, group};
use crate::query::{QueryExpr, QueryResult};
use crate::record::{Handle, Record};
use crate::view::FilteredView;

use super::registry::IndexState;

/// State cell shared between an `Index`, its views and its record
/// observers.
pub(crate) struct IndexShared {
    pub(crate) state: RwLock<IndexState>,
}

impl IndexShared {
    /// Observer callback: attribute written on a registered record.
    pub(crate) fn on_set(&self, handle: Handle, name: &str, new: Atom) {
        trace!(handle, attr = name, "dispatch set");
        self.state.write().unwrap().apply_set(handle, name, Some(new));
    }

    /// Observer callback: attribute removed from a registered record.
    pub(crate) fn on_delete(&self, handle: Handle, name: &str) {
        trace!(handle, attr = name, "dispatch delete");
        self.state.write().unwrap().apply_set(handle, name, None);
    }

    /// Observer callback: record withdrawn entirely.
    pub(crate) fn on_destroy(&self, handle: Handle) {
        trace!(handle, "dispatch destroy");
        self.state.write().unwrap().unregister(handle);
    }
}

/// Posting-structure counters, exposed for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Registered records.
    pub records: usize,
    /// Attribute names with at least one posting.
    pub attributes: usize,
    /// Distinct `(attribute, value)` keys.
    pub eq_keys: usize,
    /// Posting entries across all equality buckets.
    pub eq_entries: usize,
    /// Posting entries across all numeric range buckets.
    pub range_entries: usize,
}

/// An in-memory index over a set of records.
///
/// Cheap to clone; clones share the same underlying state.
#[derive(Clone)]
pub struct Index {
    shared: Arc<IndexShared>,
}

impl Index {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(IndexShared {
                state: RwLock::new(IndexState::default()),
            }),
        }
    }

    /// Registers a record and installs the mutation observer.
    ///
    /// Re-adding a registered record is a no-op.
    pub fn add(&self, record: &Record) {
        // hook first: a write landing between hook and registration is
        // ignored by the dispatcher and picked up by the snapshot
        record.attach(Arc::downgrade(&self.shared));
        let added = self.shared.state.write().unwrap().register(record);
        if added {
            debug!(handle = record.handle(), "record registered");
        }
    }

    /// Registers a batch of records under one write lock.
    pub fn add_many<'a>(&self, records: impl IntoIterator<Item = &'a Record>) {
        let records: Vec<&Record> = records.into_iter().collect();
        for record in &records {
            record.attach(Arc::downgrade(&self.shared));
        }
        let mut state = self.shared.state.write().unwrap();
        for record in records {
            state.register(record);
        }
    }

    /// Removes a record from this index and severs its observer hook.
    /// Unregistered records are a no-op.
    pub fn remove(&self, record: &Record) {
        let removed = self
            .shared
            .state
            .write()
            .unwrap()
            .unregister(record.handle())
            .is_some();
        if removed {
            record.detach(&self.shared);
            debug!(handle = record.handle(), "record removed");
        }
    }

    /// Number of registered records.
    pub fn len(&self) -> usize {
        self.shared.state.read().unwrap().registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, record: &Record) -> bool {
        self.shared.state.read().unwrap().contains(record.handle())
    }

    /// Every registered record, in ascending handle order.
    pub fn collect(&self) -> Vec<Record> {
        self.shared
            .state
            .read()
            .unwrap()
            .registrations
            .values()
            .map(|registration| registration.record.clone())
            .collect()
    }

    /// Equality-only filter: sugar over `reduced_query` with an `and` of
    /// `eq` leaves.
    pub fn reduced<I, S, A>(&self, attrs: I) -> QueryResult<FilteredView>
    where
        I: IntoIterator<Item = (S, A)>,
        S: Into<String>,
        A: Into<Atom>,
    {
        self.reduced_query(eq_conjunction(attrs))
    }

    /// Evaluates a query and returns the matching handles as an immutable
    /// view over this index.
    pub fn reduced_query(&self, expr: QueryExpr) -> QueryResult<FilteredView> {
        expr.validate()?;
        let state = self.shared.state.read().unwrap();
        let allow: BTreeSet<Handle> = evaluate(&state, None, &expr).into_iter().collect();
        Ok(FilteredView::new(Arc::clone(&self.shared), allow))
    }

    /// Equality lookup materialized directly, without holding a view.
    pub fn get_by_attribute<I, S, A>(&self, attrs: I) -> QueryResult<Vec<Record>>
    where
        I: IntoIterator<Item = (S, A)>,
        S: Into<String>,
        A: Into<Atom>,
    {
        let expr = eq_conjunction(attrs);
        expr.validate()?;
        let state = self.shared.state.read().unwrap();
        let mut handles: Vec<Handle> = evaluate(&state, None, &expr).into_iter().collect();
        handles.sort_unstable();
        Ok(handles
            .into_iter()
            .filter_map(|h| state.registrations.get(&h).map(|r| r.record.clone()))
            .collect())
    }

    /// Drops every record that does not match the equality map, in place.
    ///
    /// This unregisters the non-matching records one by one and is costlier
    /// than building a [`FilteredView`] with [`Index::reduced`]; prefer a
    /// view unless the index itself must shrink.
    pub fn reduce<I, S, A>(&self, attrs: I) -> QueryResult<()>
    where
        I: IntoIterator<Item = (S, A)>,
        S: Into<String>,
        A: Into<Atom>,
    {
        let expr = eq_conjunction(attrs);
        expr.validate()?;

        let evicted = {
            let mut state = self.shared.state.write().unwrap();
            let survivors = evaluate(&state, None, &expr);
            let victims: Vec<Handle> = state
                .registrations
                .keys()
                .copied()
                .filter(|h| !survivors.contains(h))
                .collect();
            victims
                .into_iter()
                .filter_map(|h| state.unregister(h))
                .collect::<Vec<Record>>()
        };
        debug!(evicted = evicted.len(), "index reduced in place");
        for record in evicted {
            record.detach(&self.shared);
        }
        Ok(())
    }

    /// Builds a new index holding the union of both inputs' records,
    /// re-registering each in arrival order. Neither input is mutated.
    pub fn union_with(&self, other: &Index) -> Index {
        let result = Index::new();
        for record in self.collect() {
            result.add(&record);
        }
        for record in other.collect() {
            result.add(&record);
        }
        debug!(records = result.len(), "union index built");
        result
    }

    /// Partitions the index by the value of `path` (dotted paths traverse
    /// references), returning each distinct value with a view of the
    /// records carrying it.
    ///
    /// Numeric keys are reported canonically: an integral float groups with,
    /// and is reported as, the equal integer.
    pub fn group_by(&self, path: &str) -> QueryResult<Vec<(Atom, FilteredView)>> {
        // reuse leaf validation for the path shape
        QueryExpr::eq(path, Atom::Null).validate()?;
        let state = self.shared.state.read().unwrap();
        Ok(group(&state, path)
            .into_iter()
            .map(|(value, handles)| {
                (value, FilteredView::new(Arc::clone(&self.shared), handles))
            })
            .collect())
    }

    /// Current posting-structure counters.
    pub fn stats(&self) -> IndexStats {
        let state = self.shared.state.read().unwrap();
        IndexStats {
            records: state.registrations.len(),
            attributes: state.attrs.len(),
            eq_keys: state.attrs.values().map(|a| a.key_count()).sum(),
            eq_entries: state.attrs.values().map(|a| a.entry_count()).sum(),
            range_entries: state.attrs.values().map(|a| a.range_entry_count()).sum(),
        }
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

/// `and(eq, eq, ...)` over an attribute map.
fn eq_conjunction<I, S, A>(attrs: I) -> QueryExpr
where
    I: IntoIterator<Item = (S, A)>,
    S: Into<String>,
    A: Into<Atom>,
{
    QueryExpr::and(
        attrs
            .into_iter()
            .map(|(name, value)| QueryExpr::eq(name, value)),
    )
}
