//! Query expression tree and builder
//!
//! Expressions are built with the associated constructors (`QueryExpr::eq`,
//! `QueryExpr::and`, ...; the crate re-exports the type as `Q`) and handed to
//! `Index::reduced_query` / `FilteredView::reduced_query`. Attribute paths
//! may be dotted (`"employer.name"`) to traverse reference edges.
//!
//! Structural validity (paths, arity, bound types) is checked by
//! [`QueryExpr::validate`] before any evaluation; value-level mismatches are
//! not errors and simply contribute nothing.

use crate::atom::Atom;

use super::errors::{QueryError, QueryResult};

/// A predicate over record attributes.
#[derive(Debug, Clone)]
pub enum QueryExpr {
    /// Attribute equals the value.
    Eq(String, Atom),
    /// Attribute differs from the value (scope complement of `Eq`).
    Ne(String, Atom),
    /// Attribute equals any of the values.
    In(String, Vec<Atom>),
    /// Numeric attribute strictly greater than the bound.
    Gt(String, Atom),
    /// Numeric attribute greater than or equal to the bound.
    Ge(String, Atom),
    /// Numeric attribute strictly less than the bound.
    Lt(String, Atom),
    /// Numeric attribute less than or equal to the bound.
    Le(String, Atom),
    /// Numeric attribute within the inclusive interval.
    Between(String, Atom, Atom),
    /// Every child matches.
    And(Vec<QueryExpr>),
    /// At least one child matches.
    Or(Vec<QueryExpr>),
    /// The child does not match (scope complement).
    Not(Box<QueryExpr>),
    /// Constant predicate matching the whole scope.
    All,
    /// Constant predicate matching nothing.
    Nothing,
}

impl QueryExpr {
    pub fn eq(path: impl Into<String>, value: impl Into<Atom>) -> Self {
        QueryExpr::Eq(path.into(), value.into())
    }

    pub fn ne(path: impl Into<String>, value: impl Into<Atom>) -> Self {
        QueryExpr::Ne(path.into(), value.into())
    }

    /// Membership test; the posting union of all listed values.
    pub fn is_in<I, A>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Atom>,
    {
        QueryExpr::In(path.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn gt(path: impl Into<String>, bound: impl Into<Atom>) -> Self {
        QueryExpr::Gt(path.into(), bound.into())
    }

    pub fn ge(path: impl Into<String>, bound: impl Into<Atom>) -> Self {
        QueryExpr::Ge(path.into(), bound.into())
    }

    pub fn lt(path: impl Into<String>, bound: impl Into<Atom>) -> Self {
        QueryExpr::Lt(path.into(), bound.into())
    }

    pub fn le(path: impl Into<String>, bound: impl Into<Atom>) -> Self {
        QueryExpr::Le(path.into(), bound.into())
    }

    /// Inclusive on both ends.
    pub fn between(
        path: impl Into<String>,
        lo: impl Into<Atom>,
        hi: impl Into<Atom>,
    ) -> Self {
        QueryExpr::Between(path.into(), lo.into(), hi.into())
    }

    pub fn and(children: impl IntoIterator<Item = QueryExpr>) -> Self {
        QueryExpr::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = QueryExpr>) -> Self {
        QueryExpr::Or(children.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: QueryExpr) -> Self {
        QueryExpr::Not(Box::new(child))
    }

    /// The constant true predicate: matches every handle in scope.
    pub fn always() -> Self {
        QueryExpr::All
    }

    /// The constant false predicate: matches nothing.
    pub fn never() -> Self {
        QueryExpr::Nothing
    }

    /// Checks paths, operand arity and range-bound types, recursively.
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            QueryExpr::Eq(path, _) | QueryExpr::Ne(path, _) | QueryExpr::In(path, _) => {
                validate_path(path)
            }
            QueryExpr::Gt(path, bound) => validate_range(path, "gt", bound),
            QueryExpr::Ge(path, bound) => validate_range(path, "ge", bound),
            QueryExpr::Lt(path, bound) => validate_range(path, "lt", bound),
            QueryExpr::Le(path, bound) => validate_range(path, "le", bound),
            QueryExpr::Between(path, lo, hi) => {
                validate_range(path, "between", lo)?;
                validate_range(path, "between", hi)
            }
            QueryExpr::And(children) => validate_composite("and", children),
            QueryExpr::Or(children) => validate_composite("or", children),
            QueryExpr::Not(child) => child.validate(),
            QueryExpr::All | QueryExpr::Nothing => Ok(()),
        }
    }
}

/// Splits `"a.b.c"` into `("a", Some("b.c"))`.
pub(crate) fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn validate_path(path: &str) -> QueryResult<()> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(QueryError::MalformedPath {
            path: path.to_string(),
        });
    }
    Ok(())
}

fn validate_range(path: &str, op: &'static str, bound: &Atom) -> QueryResult<()> {
    validate_path(path)?;
    if !bound.is_numeric() {
        return Err(QueryError::NonNumericBound {
            op,
            path: path.to_string(),
            value: bound.to_string(),
        });
    }
    Ok(())
}

fn validate_composite(op: &'static str, children: &[QueryExpr]) -> QueryResult<()> {
    if children.is_empty() {
        return Err(QueryError::EmptyComposite { op });
    }
    children.iter().try_for_each(QueryExpr::validate)
}
