//! Query evaluation
//!
//! Evaluation turns an expression into a set of handles relative to a scope:
//! the whole index, or a view's allow-set. Leaves stream posting sets and
//! filter against the scope as they go; `ne` and `not` are scope
//! complements; `and` intersects children cheapest-first and stops as soon
//! as the running intersection is empty.
//!
//! Dotted paths are resolved depth-first on the path: the tail predicate is
//! evaluated against the full index, then inverted one step through the
//! reverse edge table. Each step consults an already-computed set, so cycles
//! in the record graph cannot recurse.

use std::collections::{BTreeSet, HashSet};

use crate::atom::Atom;
use crate::index::posting::AttrIndex;
use crate::index::registry::IndexState;
use crate::record::Handle;

use super::ast::{split_path, QueryExpr};

/// A leaf predicate against a single (resolved) attribute.
enum LeafOp<'a> {
    Eq(&'a Atom),
    In(&'a [Atom]),
    Range {
        lo: Option<f64>,
        hi: Option<f64>,
        lo_incl: bool,
        hi_incl: bool,
    },
}

/// Evaluates `expr` against `state`, restricted to `allow` when given.
///
/// The result is always a subset of the scope. Expressions are assumed
/// structurally valid (see `QueryExpr::validate`); value-level mismatches
/// contribute empty sets.
pub(crate) fn evaluate(
    state: &IndexState,
    allow: Option<&BTreeSet<Handle>>,
    expr: &QueryExpr,
) -> HashSet<Handle> {
    match expr {
        QueryExpr::Eq(path, value) => eval_leaf(state, allow, path, &LeafOp::Eq(value)),
        QueryExpr::Ne(path, value) => {
            let matched = eval_leaf(state, allow, path, &LeafOp::Eq(value));
            let mut scope = scope_set(state, allow);
            scope.retain(|h| !matched.contains(h));
            scope
        }
        QueryExpr::In(path, values) => eval_leaf(state, allow, path, &LeafOp::In(values)),
        QueryExpr::Gt(path, bound) => eval_range(state, allow, path, Some(bound), None, false, false),
        QueryExpr::Ge(path, bound) => eval_range(state, allow, path, Some(bound), None, true, false),
        QueryExpr::Lt(path, bound) => eval_range(state, allow, path, None, Some(bound), false, false),
        QueryExpr::Le(path, bound) => eval_range(state, allow, path, None, Some(bound), false, true),
        QueryExpr::Between(path, lo, hi) => {
            eval_range(state, allow, path, Some(lo), Some(hi), true, true)
        }
        QueryExpr::And(children) => {
            // cheapest candidate set first; an empty intersection ends it
            let mut ordered: Vec<&QueryExpr> = children.iter().collect();
            ordered.sort_by_key(|child| estimate(state, child));

            let mut ordered = ordered.into_iter();
            let Some(first) = ordered.next() else {
                return HashSet::new();
            };
            let mut running = evaluate(state, allow, first);
            for child in ordered {
                if running.is_empty() {
                    break;
                }
                let next = evaluate(state, allow, child);
                running.retain(|h| next.contains(h));
            }
            running
        }
        QueryExpr::Or(children) => {
            let mut union = HashSet::new();
            for child in children {
                union.extend(evaluate(state, allow, child));
            }
            union
        }
        QueryExpr::Not(child) => {
            let matched = evaluate(state, allow, child);
            let mut scope = scope_set(state, allow);
            scope.retain(|h| !matched.contains(h));
            scope
        }
        QueryExpr::All => scope_set(state, allow),
        QueryExpr::Nothing => HashSet::new(),
    }
}

/// Partitions the scope by the value of `path`, nested paths included.
///
/// Used by `Index::group_by`. Keys are canonical posting keys, so an
/// integral float groups with its equal integer.
pub(crate) fn group(state: &IndexState, path: &str) -> Vec<(Atom, BTreeSet<Handle>)> {
    let (head, rest) = split_path(path);
    match rest {
        None => {
            let Some(attr) = state.attrs.get(head) else {
                return Vec::new();
            };
            attr.eq_buckets()
                .map(|(key, set)| (key.to_atom(), set.iter().copied().collect()))
                .collect()
        }
        Some(tail) => group(state, tail)
            .into_iter()
            .filter_map(|(value, children)| {
                let parents = invert_step(state, None, head, children.iter().copied());
                if parents.is_empty() {
                    None
                } else {
                    Some((value, parents.into_iter().collect()))
                }
            })
            .collect(),
    }
}

/// Maps a set of children back to the in-scope parents referencing them
/// through `attr`.
fn invert_step(
    state: &IndexState,
    allow: Option<&BTreeSet<Handle>>,
    attr: &str,
    children: impl IntoIterator<Item = Handle>,
) -> HashSet<Handle> {
    let mut parents = HashSet::new();
    for child in children {
        if let Some(referrers) = state.edges.referrers(child) {
            for (parent, edge_attr) in referrers {
                if edge_attr == attr && allow.map_or(true, |a| a.contains(parent)) {
                    parents.insert(*parent);
                }
            }
        }
    }
    parents
}

fn eval_leaf(
    state: &IndexState,
    allow: Option<&BTreeSet<Handle>>,
    path: &str,
    op: &LeafOp<'_>,
) -> HashSet<Handle> {
    let (head, rest) = split_path(path);
    if let Some(tail) = rest {
        // tail runs against the whole index; the scope applies to the
        // parents that come back out
        let children = eval_leaf(state, None, tail, op);
        return invert_step(state, allow, head, children);
    }

    let Some(attr) = state.attrs.get(head) else {
        return HashSet::new();
    };
    let in_scope = |h: &Handle| allow.map_or(true, |a| a.contains(h));
    match op {
        LeafOp::Eq(value) => attr
            .eq(value)
            .map(|set| set.iter().copied().filter(|h| in_scope(h)).collect())
            .unwrap_or_default(),
        LeafOp::In(values) => {
            let mut union = HashSet::new();
            for value in *values {
                if let Some(set) = attr.eq(value) {
                    union.extend(set.iter().copied().filter(|h| in_scope(h)));
                }
            }
            union
        }
        LeafOp::Range {
            lo,
            hi,
            lo_incl,
            hi_incl,
        } => attr
            .range(*lo, *hi, *lo_incl, *hi_incl)
            .flatten()
            .copied()
            .filter(|h| in_scope(h))
            .collect(),
    }
}

fn eval_range(
    state: &IndexState,
    allow: Option<&BTreeSet<Handle>>,
    path: &str,
    lo: Option<&Atom>,
    hi: Option<&Atom>,
    lo_incl: bool,
    hi_incl: bool,
) -> HashSet<Handle> {
    // bounds are validated numeric; a non-numeric one matches nothing
    let lo = match lo {
        Some(bound) => match bound.as_f64() {
            Some(v) => Some(v),
            None => return HashSet::new(),
        },
        None => None,
    };
    let hi = match hi {
        Some(bound) => match bound.as_f64() {
            Some(v) => Some(v),
            None => return HashSet::new(),
        },
        None => None,
    };
    eval_leaf(
        state,
        allow,
        path,
        &LeafOp::Range {
            lo,
            hi,
            lo_incl,
            hi_incl,
        },
    )
}

fn scope_set(state: &IndexState, allow: Option<&BTreeSet<Handle>>) -> HashSet<Handle> {
    match allow {
        // an allow-set can hold handles removed from the base since
        Some(allow) => allow
            .iter()
            .copied()
            .filter(|h| state.contains(*h))
            .collect(),
        None => state.registrations.keys().copied().collect(),
    }
}

/// Cheap upper-bound guess at a child's candidate set size, used to order
/// `and` operands. Complements are pessimistic; dotted paths are estimated
/// by their final segment's postings.
fn estimate(state: &IndexState, expr: &QueryExpr) -> usize {
    match expr {
        QueryExpr::Eq(path, value) => leaf_attr(state, path).map_or(0, |a| a.eq_len(value)),
        QueryExpr::In(path, values) => leaf_attr(state, path).map_or(0, |attr| {
            values.iter().map(|v| attr.eq_len(v)).sum()
        }),
        QueryExpr::Gt(path, b) | QueryExpr::Ge(path, b) => {
            let incl = matches!(expr, QueryExpr::Ge(..));
            leaf_attr(state, path).map_or(0, |a| a.range_len(b.as_f64(), None, incl, false))
        }
        QueryExpr::Lt(path, b) | QueryExpr::Le(path, b) => {
            let incl = matches!(expr, QueryExpr::Le(..));
            leaf_attr(state, path).map_or(0, |a| a.range_len(None, b.as_f64(), false, incl))
        }
        QueryExpr::Between(path, lo, hi) => leaf_attr(state, path)
            .map_or(0, |a| a.range_len(lo.as_f64(), hi.as_f64(), true, true)),
        QueryExpr::Ne(_, _) | QueryExpr::Not(_) | QueryExpr::All => state.registrations.len(),
        QueryExpr::And(children) => children
            .iter()
            .map(|c| estimate(state, c))
            .min()
            .unwrap_or(0),
        QueryExpr::Or(children) => children
            .iter()
            .fold(0usize, |acc, c| acc.saturating_add(estimate(state, c))),
        QueryExpr::Nothing => 0,
    }
}

fn leaf_attr<'a>(state: &'a IndexState, path: &str) -> Option<&'a AttrIndex> {
    let last = path.rsplit('.').next().unwrap_or(path);
    state.attrs.get(last)
}
