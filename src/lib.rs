//! lodestone - an in-memory object indexer and graph datastore
//!
//! Records carry a dynamic set of named attributes whose values are atoms
//! (integers, floats, strings, booleans, null) or references to other
//! records. An [`Index`] answers predicate queries over those attributes -
//! including dotted paths that traverse references - with hash-map equality
//! lookup and ordered-map range lookup, and stays consistent as attribute
//! values mutate.
//!
//! ```
//! use lodestone::{Index, Record, Q};
//!
//! let index = Index::new();
//! let alice = Record::with_attrs([("name", "Alice".into()), ("age", 30.into())]);
//! index.add(&alice);
//!
//! let adults = index.reduced_query(Q::ge("age", 18)).unwrap();
//! assert_eq!(adults.collect(), vec![alice.clone()]);
//!
//! alice.set("age", 17);
//! assert!(index.reduced_query(Q::ge("age", 18)).unwrap().collect().is_empty());
//! ```

pub mod atom;
pub mod index;
pub mod query;
pub mod record;
pub mod view;

pub use atom::Atom;
pub use index::{Index, IndexStats};
pub use query::QueryExpr as Q;
pub use query::{QueryError, QueryExpr};
pub use record::{Handle, Record};
pub use view::FilteredView;
