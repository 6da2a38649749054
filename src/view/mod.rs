//! Filtered views
//!
//! A [`FilteredView`] is the result of a query held lazily: a strong
//! reference to the base index plus the set of handles the query admitted.
//! Views are immutable and compose - further queries intersect with the
//! allow-set without touching the base index beyond read access. `rebase`
//! pays the copy to turn a view into an independent index.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::atom::Atom;
use crate::index::{Index, IndexShared};
use crate::query::eval::evaluate;
use crate::query::{QueryExpr, QueryResult};
use crate::record::{Handle, Record};

/// An immutable, query-refinable projection of an [`Index`].
///
/// The allow-set is fixed at creation; records removed from the base
/// afterwards simply stop appearing in results. Dropping a view never
/// affects the base index.
#[derive(Clone)]
pub struct FilteredView {
    shared: Arc<IndexShared>,
    allow: BTreeSet<Handle>,
}

impl FilteredView {
    pub(crate) fn new(shared: Arc<IndexShared>, allow: BTreeSet<Handle>) -> Self {
        Self { shared, allow }
    }

    /// Number of handles admitted by this view.
    pub fn len(&self) -> usize {
        self.allow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty()
    }

    pub fn contains(&self, record: &Record) -> bool {
        self.allow.contains(&record.handle())
    }

    /// The admitted records still registered in the base index, in
    /// ascending handle order.
    pub fn collect(&self) -> Vec<Record> {
        let state = self.shared.state.read().unwrap();
        self.allow
            .iter()
            .filter_map(|h| state.registrations.get(h).map(|r| r.record.clone()))
            .collect()
    }

    /// Equality-only refinement; see [`Index::reduced`].
    pub fn reduced<I, S, A>(&self, attrs: I) -> QueryResult<FilteredView>
    where
        I: IntoIterator<Item = (S, A)>,
        S: Into<String>,
        A: Into<Atom>,
    {
        self.reduced_query(QueryExpr::and(
            attrs
                .into_iter()
                .map(|(name, value)| QueryExpr::eq(name, value)),
        ))
    }

    /// Refines the view with a further query, evaluated inside this view's
    /// allow-set.
    pub fn reduced_query(&self, expr: QueryExpr) -> QueryResult<FilteredView> {
        expr.validate()?;
        let state = self.shared.state.read().unwrap();
        let allow: BTreeSet<Handle> = evaluate(&state, Some(&self.allow), &expr)
            .into_iter()
            .collect();
        Ok(FilteredView::new(Arc::clone(&self.shared), allow))
    }

    /// Materializes an independent [`Index`] by re-registering every record
    /// this view admits. The new index observes its records separately;
    /// the base index is untouched.
    pub fn rebase(&self) -> Index {
        let records = self.collect();
        let result = Index::new();
        result.add_many(records.iter());
        debug!(records = result.len(), "view rebased into index");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;

    fn people() -> (Index, Record, Record) {
        let index = Index::new();
        let p1 = Record::with_attrs([
            ("name".to_string(), Atom::from("A")),
            ("age".to_string(), Atom::Int(30)),
            ("wage".to_string(), Atom::Int(70_000)),
        ]);
        let p2 = Record::with_attrs([
            ("name".to_string(), Atom::from("B")),
            ("age".to_string(), Atom::Int(25)),
            ("wage".to_string(), Atom::Int(50_000)),
        ]);
        index.add(&p1);
        index.add(&p2);
        (index, p1, p2)
    }

    #[test]
    fn test_view_composition() {
        let (index, p1, p2) = people();

        let view = index.reduced_query(QueryExpr::gt("wage", 40_000)).unwrap();
        assert_eq!(view.len(), 2);

        let narrowed = view.reduced_query(QueryExpr::eq("age", 25)).unwrap();
        assert_eq!(narrowed.collect(), vec![p2]);
        // the intermediate view is untouched
        assert!(view.contains(&p1));
    }

    #[test]
    fn test_view_sees_base_removals() {
        let (index, p1, p2) = people();
        let view = index.reduced_query(QueryExpr::always()).unwrap();

        index.remove(&p1);

        assert_eq!(view.collect(), vec![p2]);
    }

    #[test]
    fn test_rebase_is_independent() {
        let (index, p1, _p2) = people();
        let alice = index.reduced([("name", "A")]).unwrap().rebase();

        assert_eq!(alice.collect(), vec![p1.clone()]);

        // mutations reach both indexes through their own observers
        p1.set("age", 31);
        assert_eq!(alice.get_by_attribute([("age", 31)]).unwrap(), vec![p1.clone()]);
        assert_eq!(index.get_by_attribute([("age", 31)]).unwrap(), vec![p1.clone()]);

        // but membership is separate
        index.remove(&p1);
        assert_eq!(alice.len(), 1);
        assert!(index.get_by_attribute([("age", 31)]).unwrap().is_empty());
    }
}
