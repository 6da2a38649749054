//! Query construction errors
//!
//! Construction problems are the only errors the query layer reports:
//! missing attributes, non-numeric record values and dangling references
//! all degrade to empty result contributions at evaluation time.

use thiserror::Error;

/// A structurally invalid query expression, reported before evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Attribute path is empty or has an empty segment.
    #[error("malformed attribute path {path:?}")]
    MalformedPath { path: String },

    /// `and`/`or` built with no operands.
    #[error("{op}() requires at least one operand")]
    EmptyComposite { op: &'static str },

    /// Range operator built with a bound that is not a number.
    #[error("{op}({path:?}) requires a numeric bound, got {value}")]
    NonNumericBound {
        op: &'static str,
        path: String,
        value: String,
    },
}

pub type QueryResult<T> = Result<T, QueryError>;
