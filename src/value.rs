//! Scalar values: bind parameters and decoded path elements.
//!
//! The same tagged integer-or-text representation serves both purposes.
//! Sibling order keys and primary keys may be integers or text (UUIDs,
//! names); the decoder's best-effort integer conversion is expressed as the
//! [`SqlValue::Int`] / [`SqlValue::Text`] split instead of exception-driven
//! coercion.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar SQL value: a bind parameter, or one element of a decoded
/// `tree_path` / `tree_ordering` / custom tree field list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

impl SqlValue {
    /// The integer value, if this is an [`SqlValue::Int`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Text(_) => None,
        }
    }

    /// The text value, if this is an [`SqlValue::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Int(_) => None,
            SqlValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}
