//! Records: the entities an [`crate::Index`] indexes
//!
//! A record is a shared handle around a dynamic attribute bag. Every record
//! receives a process-unique, monotonically increasing 64-bit handle at
//! construction; the handle is the record's identity everywhere in the
//! engine (equality, hashing, posting lists, reference edges).
//!
//! Mutation trap: each index a record is registered in installs itself as an
//! observer. `set`, `unset` and `destroy` update the bag first, then notify
//! every live observer. Observers are held weakly, so dropping an index
//! silently severs its hook; the record side prunes dead links on the next
//! notification.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::atom::Atom;
use crate::index::IndexShared;

/// Engine-assigned record identity.
pub type Handle = u64;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn allocate_handle() -> Handle {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

struct RecordInner {
    handle: Handle,
    attrs: Mutex<HashMap<String, Atom>>,
    observers: Mutex<Vec<Weak<IndexShared>>>,
}

/// A record with a dynamic set of named attribute values.
///
/// Cheap to clone; all clones share the same attribute bag and identity.
/// Attribute names beginning with `_` are stored but never indexed.
#[derive(Clone)]
pub struct Record {
    inner: Arc<RecordInner>,
}

impl Record {
    /// Creates an empty record with a fresh handle.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RecordInner {
                handle: allocate_handle(),
                attrs: Mutex::new(HashMap::new()),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates a record pre-populated with attributes.
    pub fn with_attrs<I, S>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (S, Atom)>,
        S: Into<String>,
    {
        let record = Self::new();
        {
            let mut bag = record.inner.attrs.lock().unwrap();
            for (name, value) in attrs {
                bag.insert(name.into(), value);
            }
        }
        record
    }

    /// Builds a record from a JSON object.
    ///
    /// Returns `None` if `value` is not an object. Members whose values are
    /// not atoms (arrays, nested objects) are skipped.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self::with_attrs(object.iter().filter_map(|(name, v)| {
            Atom::from_json(v).map(|atom| (name.clone(), atom))
        })))
    }

    /// Returns the engine-assigned handle.
    pub fn handle(&self) -> Handle {
        self.inner.handle
    }

    /// Returns the current value of an attribute.
    pub fn get(&self, name: &str) -> Option<Atom> {
        self.inner.attrs.lock().unwrap().get(name).cloned()
    }

    /// Sets an attribute and notifies every index this record is registered
    /// in. Setting an attribute to its current value leaves indexes
    /// untouched.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Atom>) {
        let name = name.into();
        let value = value.into();
        self.inner
            .attrs
            .lock()
            .unwrap()
            .insert(name.clone(), value.clone());
        for observer in self.live_observers() {
            observer.on_set(self.handle(), &name, value.clone());
        }
    }

    /// Removes an attribute and notifies observers. Unknown names are a
    /// no-op.
    pub fn unset(&self, name: &str) {
        let removed = self.inner.attrs.lock().unwrap().remove(name).is_some();
        if removed {
            for observer in self.live_observers() {
                observer.on_delete(self.handle(), name);
            }
        }
    }

    /// Withdraws this record from every index it is registered in.
    ///
    /// The attribute bag itself is untouched; the record can be re-added
    /// later.
    pub fn destroy(&self) {
        let observers = {
            let mut guard = self.inner.observers.lock().unwrap();
            let live: Vec<Arc<IndexShared>> =
                guard.iter().filter_map(Weak::upgrade).collect();
            guard.clear();
            live
        };
        for observer in observers {
            observer.on_destroy(self.handle());
        }
    }

    /// Current indexable attributes (names not starting with `_`).
    pub fn attributes(&self) -> Vec<(String, Atom)> {
        self.inner
            .attrs
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Installs an index observer. Idempotent per index.
    pub(crate) fn attach(&self, index: Weak<IndexShared>) {
        let mut observers = self.inner.observers.lock().unwrap();
        observers.retain(|o| o.upgrade().is_some());
        if !observers.iter().any(|o| Weak::ptr_eq(o, &index)) {
            observers.push(index);
        }
    }

    /// Removes the observer hook for one index.
    pub(crate) fn detach(&self, index: &Arc<IndexShared>) {
        self.inner
            .observers
            .lock()
            .unwrap()
            .retain(|o| match o.upgrade() {
                Some(live) => !Arc::ptr_eq(&live, index),
                None => false,
            });
    }

    /// Upgraded observers, pruning any whose index has been dropped.
    ///
    /// The lock is released before notification so observer callbacks never
    /// run with record locks held.
    fn live_observers(&self) -> Vec<Arc<IndexShared>> {
        let mut observers = self.inner.observers.lock().unwrap();
        observers.retain(|o| o.upgrade().is_some());
        observers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.handle() == other.handle()
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle().hash(state);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("handle", &self.handle())
            .field("attrs", &self.inner.attrs.lock().unwrap().len())
            .finish()
    }
}
