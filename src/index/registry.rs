//! Record registry and mutation bookkeeping
//!
//! `IndexState` is the single-writer state of one index: the handle-ordered
//! registration table (record + attribute snapshot), the per-attribute
//! posting structures, and the reference edge table. The snapshot - not the
//! record's live bag - is the authority for what is currently indexed, so
//! every mutation is applied as a `(remove old, insert new)` pair computed
//! against it.
//!
//! A disagreement between snapshot and posting lists is a fatal invariant
//! violation: the engine aborts rather than keep answering queries from a
//! corrupt index.

use std::collections::{BTreeMap, HashMap};

use crate::atom::Atom;
use crate::record::{Handle, Record};

use super::edges::EdgeTable;
use super::posting::AttrIndex;

/// One registered record: the strong reference keeping it alive plus the
/// attribute snapshot used for removal and mutation deltas.
pub(crate) struct Registration {
    pub(crate) record: Record,
    pub(crate) snapshot: HashMap<String, Atom>,
}

/// The owned state of one index.
#[derive(Default)]
pub(crate) struct IndexState {
    pub(crate) registrations: BTreeMap<Handle, Registration>,
    pub(crate) attrs: HashMap<String, AttrIndex>,
    pub(crate) edges: EdgeTable,
}

/// Names beginning with `_` are excluded from indexing.
pub(crate) fn indexable(name: &str) -> bool {
    !name.starts_with('_')
}

impl IndexState {
    /// Registers a record, fanning its attributes out to the posting and
    /// edge structures. Returns false (and changes nothing) if the handle is
    /// already registered.
    pub(crate) fn register(&mut self, record: &Record) -> bool {
        let handle = record.handle();
        if self.registrations.contains_key(&handle) {
            return false;
        }

        let mut snapshot = HashMap::new();
        for (name, value) in record.attributes() {
            self.insert_value(handle, &name, &value);
            snapshot.insert(name, value);
        }
        self.registrations.insert(
            handle,
            Registration {
                record: record.clone(),
                snapshot,
            },
        );
        true
    }

    /// Removes a record: every snapshot value leaves the posting structures,
    /// outbound edges go with them, and inbound edges are severed so path
    /// traversal can no longer reach the handle. Referrers keep their
    /// now-dangling `Ref` atoms.
    pub(crate) fn unregister(&mut self, handle: Handle) -> Option<Record> {
        let registration = self.registrations.remove(&handle)?;
        for (name, value) in &registration.snapshot {
            self.remove_value(handle, name, value);
        }
        self.edges.sever_inbound(handle);
        Some(registration.record)
    }

    /// Applies one attribute write. `new = None` is a delete.
    ///
    /// Writing the current value is a no-op: posting lists are untouched.
    pub(crate) fn apply_set(&mut self, handle: Handle, name: &str, new: Option<Atom>) {
        if !indexable(name) {
            return;
        }
        let Some(registration) = self.registrations.get(&handle) else {
            // not registered here (stale observer); nothing to reflect
            return;
        };
        let old = registration.snapshot.get(name).cloned();
        if old == new {
            return;
        }

        if let Some(old) = &old {
            self.remove_value(handle, name, old);
        }
        match new {
            Some(value) => {
                self.insert_value(handle, name, &value);
                self.registrations
                    .get_mut(&handle)
                    .unwrap()
                    .snapshot
                    .insert(name.to_string(), value);
            }
            None => {
                self.registrations
                    .get_mut(&handle)
                    .unwrap()
                    .snapshot
                    .remove(name);
            }
        }
    }

    pub(crate) fn contains(&self, handle: Handle) -> bool {
        self.registrations.contains_key(&handle)
    }

    fn insert_value(&mut self, handle: Handle, name: &str, value: &Atom) {
        self.attrs
            .entry(name.to_string())
            .or_default()
            .insert(value, handle);
        if let Atom::Ref(child) = value {
            self.edges.link(handle, name, *child);
        }
    }

    fn remove_value(&mut self, handle: Handle, name: &str, value: &Atom) {
        let removed = self
            .attrs
            .get_mut(name)
            .map(|attr| attr.remove(value, handle))
            .unwrap_or(false);
        if !removed {
            // snapshot said the posting exists; the index is corrupt
            panic!(
                "posting lists out of sync with snapshot: handle {handle}, attribute {name:?}"
            );
        }
        if self.attrs.get(name).is_some_and(AttrIndex::is_empty) {
            self.attrs.remove(name);
        }
        if let Atom::Ref(child) = value {
            self.edges.unlink(handle, name, *child);
        }
    }
}
