//! End-to-end query scenarios
//!
//! Exercises the public surface the way an application would: register
//! records, mutate them, query flat and dotted attribute paths, compose
//! views, group, rebase and union.

use lodestone::{Atom, Index, Q, QueryError, Record};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn person(name: &str, age: i64, wage: i64) -> Record {
    Record::from_json(&json!({ "name": name, "age": age, "wage": wage })).unwrap()
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| match r.get("name") {
            Some(Atom::Str(s)) => s,
            other => panic!("record without name: {other:?}"),
        })
        .collect()
}

// =============================================================================
// Equality and Mutation
// =============================================================================

/// Equality lookup, then a mutation that moves a record into the result.
#[test]
fn test_equality_then_mutation() {
    let index = Index::new();
    let p1 = person("A", 30, 70_000);
    let p2 = person("B", 25, 50_000);
    index.add(&p1);
    index.add(&p2);

    let result = index.reduced_query(Q::eq("age", 30)).unwrap().collect();
    assert_eq!(result, vec![p1.clone()]);

    p2.set("age", 30);

    let result = index.reduced_query(Q::eq("age", 30)).unwrap().collect();
    // handle order: p1 was created first
    assert_eq!(result, vec![p1, p2]);
}

/// The old value stops matching as soon as the new one lands.
#[test]
fn test_mutation_retires_old_value() {
    let index = Index::new();
    let p = person("A", 30, 70_000);
    index.add(&p);

    p.set("age", 31);

    assert!(index.reduced_query(Q::eq("age", 30)).unwrap().is_empty());
    assert_eq!(
        index.reduced_query(Q::eq("age", 31)).unwrap().collect(),
        vec![p]
    );
}

// =============================================================================
// Range Queries
// =============================================================================

#[test]
fn test_range_queries() {
    let index = Index::new();
    let p1 = person("A", 30, 70_000);
    let p2 = person("B", 25, 50_000);
    index.add_many([&p1, &p2]);

    let result = index.reduced_query(Q::gt("wage", 60_000)).unwrap().collect();
    assert_eq!(result, vec![p1.clone()]);

    let result = index.reduced_query(Q::lt("wage", 55_000)).unwrap().collect();
    assert_eq!(result, vec![p2.clone()]);

    let result = index
        .reduced_query(Q::between("wage", 50_000, 70_000))
        .unwrap()
        .collect();
    assert_eq!(result, vec![p1, p2]);
}

#[test]
fn test_mixed_int_float_ranges() {
    let index = Index::new();
    let a = Record::with_attrs([("score".to_string(), Atom::Int(10))]);
    let b = Record::with_attrs([("score".to_string(), Atom::Float(10.5))]);
    index.add_many([&a, &b]);

    let result = index.reduced_query(Q::gt("score", 10)).unwrap().collect();
    assert_eq!(result, vec![b]);

    let result = index.reduced_query(Q::ge("score", 10.0)).unwrap().collect();
    assert_eq!(result.len(), 2);
}

// =============================================================================
// Nested Paths
// =============================================================================

#[test]
fn test_nested_path_equality() {
    let index = Index::new();
    let store = Record::from_json(&json!({ "name": "Big", "address": "123" })).unwrap();
    let p1 = Record::with_attrs([
        ("name".to_string(), Atom::from("A")),
        ("employer".to_string(), Atom::from(&store)),
    ]);
    let p2 = Record::with_attrs([
        ("name".to_string(), Atom::from("B")),
        ("employer".to_string(), Atom::from(&store)),
    ]);
    index.add_many([&store, &p1, &p2]);

    let result = index
        .reduced_query(Q::eq("employer.name", "Big"))
        .unwrap()
        .collect();
    assert_eq!(names(&result), vec!["A", "B"]);
}

#[test]
fn test_nested_path_membership_and_ranges() {
    let index = Index::new();
    let mut parents = Vec::new();
    for i in 0..11 {
        let nested = Record::with_attrs([("num".to_string(), Atom::Int(i * 10))]);
        let parent = Record::with_attrs([
            ("num".to_string(), Atom::Int(i)),
            ("nested".to_string(), Atom::from(&nested)),
        ]);
        index.add_many([&nested, &parent]);
        parents.push(parent);
    }

    let result = index
        .reduced_query(Q::is_in("nested.num", [20, 30, 40]))
        .unwrap()
        .collect();
    assert_eq!(result.len(), 3);

    let result = index.reduced_query(Q::gt("nested.num", 50)).unwrap().collect();
    assert_eq!(result.len(), 5);

    let result = index.reduced_query(Q::ge("nested.num", 50)).unwrap().collect();
    assert_eq!(result.len(), 6);

    let result = index.reduced_query(Q::le("nested.num", 50)).unwrap().collect();
    assert_eq!(result.len(), 6);
}

/// Re-pointing a reference re-routes path queries.
#[test]
fn test_nested_path_follows_reference_mutation() {
    let index = Index::new();
    let big = Record::from_json(&json!({ "name": "Big" })).unwrap();
    let small = Record::from_json(&json!({ "name": "Small" })).unwrap();
    let p = Record::with_attrs([("employer".to_string(), Atom::from(&big))]);
    index.add_many([&big, &small, &p]);

    assert_eq!(
        index.reduced_query(Q::eq("employer.name", "Big")).unwrap().len(),
        1
    );

    p.set("employer", Atom::from(&small));

    assert!(index.reduced_query(Q::eq("employer.name", "Big")).unwrap().is_empty());
    assert_eq!(
        index
            .reduced_query(Q::eq("employer.name", "Small"))
            .unwrap()
            .collect(),
        vec![p]
    );
}

/// Destroying the referenced record leaves the referrer's atom dangling and
/// the path unresolvable.
#[test]
fn test_destroy_severs_path_traversal() {
    let index = Index::new();
    let store = Record::from_json(&json!({ "name": "Big" })).unwrap();
    let p = Record::with_attrs([("employer".to_string(), Atom::from(&store))]);
    index.add_many([&store, &p]);

    store.destroy();

    assert!(index.reduced_query(Q::eq("employer.name", "Big")).unwrap().is_empty());
    // the dangling ref still answers direct equality
    assert_eq!(
        index
            .reduced_query(Q::eq("employer", Atom::Ref(store.handle())))
            .unwrap()
            .collect(),
        vec![p]
    );
}

// =============================================================================
// Composite Queries
// =============================================================================

#[test]
fn test_composite_over_path_and_range() {
    let index = Index::new();
    let store = Record::from_json(&json!({ "name": "Big", "address": "123" })).unwrap();
    let p1 = person("A", 30, 70_000);
    let p2 = person("B", 25, 50_000);
    p1.set("employer", Atom::from(&store));
    p2.set("employer", Atom::from(&store));
    index.add_many([&store, &p1, &p2]);

    let query = Q::and([Q::eq("employer.name", "Big"), Q::ge("wage", 60_000)]);
    let result = index.reduced_query(query).unwrap().collect();
    assert_eq!(result, vec![p1]);
}

#[test]
fn test_or_and_not_composition() {
    let index = Index::new();
    let records: Vec<Record> = (0..10)
        .map(|i| {
            Record::from_json(&json!({
                "num": i,
                "active": i % 2 == 0,
                "score": (i as f64) * 10.0,
            }))
            .unwrap()
        })
        .collect();
    index.add_many(records.iter());

    let query = Q::and([
        Q::eq("active", true),
        Q::or([Q::gt("score", 70.0), Q::lt("num", 3)]),
    ]);
    let result = index.reduced_query(query).unwrap().collect();
    assert_eq!(result.len(), 3); // num 0, 2, 8

    let query = Q::not(Q::eq("active", true));
    let result = index.reduced_query(query).unwrap().collect();
    assert_eq!(result.len(), 5);
}

// =============================================================================
// Views
// =============================================================================

#[test]
fn test_view_composition_chain() {
    let index = Index::new();
    let p1 = person("A", 30, 70_000);
    let p2 = person("B", 25, 50_000);
    index.add_many([&p1, &p2]);

    let view = index.reduced_query(Q::gt("wage", 40_000)).unwrap();
    assert_eq!(view.len(), 2);

    let result = view.reduced_query(Q::eq("age", 25)).unwrap().collect();
    assert_eq!(result, vec![p2]);
}

#[test]
fn test_get_by_attribute_matches_view_collect() {
    let index = Index::new();
    let p1 = person("A", 30, 70_000);
    let p2 = person("B", 30, 50_000);
    index.add_many([&p1, &p2]);

    let direct = index.get_by_attribute([("age", 30)]).unwrap();
    let through_view = index.reduced([("age", 30)]).unwrap().collect();
    assert_eq!(direct, through_view);
    assert_eq!(direct, vec![p1, p2]);
}

// =============================================================================
// Rebase and Union
// =============================================================================

#[test]
fn test_rebase_and_union() {
    let index = Index::new();
    let p1 = person("A", 30, 70_000);
    let p2 = person("B", 25, 50_000);
    index.add_many([&p1, &p2]);

    let alice = index.reduced_query(Q::eq("name", "A")).unwrap().rebase();
    assert_eq!(alice.collect(), vec![p1.clone()]);

    let bob = index.reduced_query(Q::eq("name", "B")).unwrap().rebase();
    let both = alice.union_with(&bob);
    assert_eq!(both.collect(), vec![p1, p2]);
}

// =============================================================================
// Group By
// =============================================================================

#[test]
fn test_group_by_flat() {
    let index = Index::new();
    for i in 0..10 {
        index.add(&Record::from_json(&json!({ "id": 1, "num": i / 2 })).unwrap());
    }

    let groups = index.group_by("num").unwrap();
    assert_eq!(groups.len(), 5);
    for (_, view) in groups {
        assert_eq!(view.collect().len(), 2);
    }
}

#[test]
fn test_group_by_nested() {
    let index = Index::new();
    for i in 0..10 {
        let nested = Record::from_json(&json!({ "nest": true, "num": i / 2 })).unwrap();
        let parent = Record::with_attrs([
            ("id".to_string(), Atom::Int(1)),
            ("nested".to_string(), Atom::from(&nested)),
        ]);
        index.add_many([&nested, &parent]);
    }

    let groups = index.group_by("nested.num").unwrap();
    assert_eq!(groups.len(), 5);
    let zeros = groups
        .iter()
        .find(|(value, _)| *value == Atom::Int(0))
        .map(|(_, view)| view.collect())
        .unwrap();
    assert_eq!(zeros.len(), 2);

    let groups = index.group_by("nested.nest").unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].0, Atom::Bool(true));
    assert_eq!(groups[0].1.collect().len(), 10);
}

// =============================================================================
// Construction Errors
// =============================================================================

#[test]
fn test_malformed_queries_rejected_before_evaluation() {
    let index = Index::new();
    index.add(&person("A", 30, 70_000));

    assert!(matches!(
        index.reduced_query(Q::eq("employer..name", "Big")),
        Err(QueryError::MalformedPath { .. })
    ));
    assert!(matches!(
        index.reduced_query(Q::and([])),
        Err(QueryError::EmptyComposite { op: "and" })
    ));
    assert!(matches!(
        index.reduced_query(Q::gt("age", "old")),
        Err(QueryError::NonNumericBound { .. })
    ));
}

/// Unknown attributes are empty results, not errors.
#[test]
fn test_unknown_attribute_is_empty_not_error() {
    let index = Index::new();
    index.add(&person("A", 30, 70_000));

    assert!(index.reduced_query(Q::eq("height", 180)).unwrap().is_empty());
    assert!(index.get_by_attribute([("height", 180)]).unwrap().is_empty());
}
