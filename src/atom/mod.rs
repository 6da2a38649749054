//! Attribute value model
//!
//! Every record attribute holds an [`Atom`]: a tagged value that is either a
//! primitive (integer, float, string, boolean, null) or a reference to
//! another record by handle.
//!
//! Equality is structural, with one cross-variant rule: an integer equals a
//! float iff the float is exactly integral and has the same numeric value.
//! Ordering is defined only between numeric variants; everything else is
//! unordered and therefore invisible to range queries.

use std::fmt;

use crate::record::Handle;

/// A tagged attribute value.
///
/// `Ref` holds the engine-assigned handle of another record; it compares
/// equal only to a `Ref` with the same handle.
#[derive(Debug, Clone)]
pub enum Atom {
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Boolean
    Bool(bool),
    /// Explicit null
    Null,
    /// Reference to another record
    Ref(Handle),
}

impl Atom {
    /// Returns true for `Int` and `Float`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Atom::Int(_) | Atom::Float(_))
    }

    /// Numeric projection used by range lookups.
    ///
    /// Non-numeric atoms have no projection and fall out of range results.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Atom::Int(i) => Some(*i as f64),
            Atom::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert a JSON value into an atom.
    ///
    /// Arrays and objects are not atoms and return `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Atom::Null),
            serde_json::Value::Bool(b) => Some(Atom::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Atom::Int(i))
                } else {
                    n.as_f64().map(Atom::Float)
                }
            }
            serde_json::Value::String(s) => Some(Atom::Str(s.clone())),
            _ => None,
        }
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Atom::Int(a), Atom::Int(b)) => a == b,
            (Atom::Float(a), Atom::Float(b)) => a == b,
            (Atom::Int(a), Atom::Float(b)) | (Atom::Float(b), Atom::Int(a)) => {
                // equal iff the float is exactly this integer
                b.fract() == 0.0 && *b == *a as f64
            }
            (Atom::Str(a), Atom::Str(b)) => a == b,
            (Atom::Bool(a), Atom::Bool(b)) => a == b,
            (Atom::Null, Atom::Null) => true,
            (Atom::Ref(a), Atom::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(i) => write!(f, "{i}"),
            Atom::Float(v) => write!(f, "{v}"),
            Atom::Str(s) => write!(f, "{s:?}"),
            Atom::Bool(b) => write!(f, "{b}"),
            Atom::Null => write!(f, "null"),
            Atom::Ref(h) => write!(f, "ref({h})"),
        }
    }
}

impl From<i64> for Atom {
    fn from(v: i64) -> Self {
        Atom::Int(v)
    }
}

impl From<i32> for Atom {
    fn from(v: i32) -> Self {
        Atom::Int(v as i64)
    }
}

impl From<f64> for Atom {
    fn from(v: f64) -> Self {
        Atom::Float(v)
    }
}

impl From<&str> for Atom {
    fn from(v: &str) -> Self {
        Atom::Str(v.to_string())
    }
}

impl From<String> for Atom {
    fn from(v: String) -> Self {
        Atom::Str(v)
    }
}

impl From<bool> for Atom {
    fn from(v: bool) -> Self {
        Atom::Bool(v)
    }
}

impl From<&crate::record::Record> for Atom {
    fn from(record: &crate::record::Record) -> Self {
        Atom::Ref(record.handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_cross_variant_equality() {
        assert_eq!(Atom::Int(3), Atom::Float(3.0));
        assert_eq!(Atom::Float(3.0), Atom::Int(3));
        assert_ne!(Atom::Int(3), Atom::Float(3.5));
        assert_ne!(Atom::Int(3), Atom::Float(4.0));
    }

    #[test]
    fn test_bool_is_not_numeric() {
        // booleans never coerce to integers
        assert_ne!(Atom::Bool(true), Atom::Int(1));
        assert_ne!(Atom::Bool(false), Atom::Int(0));
        assert!(!Atom::Bool(true).is_numeric());
        assert!(Atom::Bool(true).as_f64().is_none());
    }

    #[test]
    fn test_ref_equality_by_handle() {
        assert_eq!(Atom::Ref(7), Atom::Ref(7));
        assert_ne!(Atom::Ref(7), Atom::Ref(8));
        assert_ne!(Atom::Ref(7), Atom::Int(7));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Atom::from_json(&json!(null)), Some(Atom::Null));
        assert_eq!(Atom::from_json(&json!(true)), Some(Atom::Bool(true)));
        assert_eq!(Atom::from_json(&json!(42)), Some(Atom::Int(42)));
        assert_eq!(Atom::from_json(&json!(1.5)), Some(Atom::Float(1.5)));
        assert_eq!(
            Atom::from_json(&json!("hello")),
            Some(Atom::Str("hello".to_string()))
        );
        assert_eq!(Atom::from_json(&json!([1, 2])), None);
        assert_eq!(Atom::from_json(&json!({"a": 1})), None);
    }
}
