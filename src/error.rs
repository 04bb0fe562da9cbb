//! Error types for tree-cte.
//!
//! All errors that can occur while configuring or compiling a tree query are
//! represented by [`TreeQueryError`]. Errors are propagated via
//! `Result<T, TreeQueryError>` throughout the codebase.
//!
//! # Error Classification
//!
//! Errors are classified into two categories:
//! - **Config** — caller misuse detected before any SQL is produced: an
//!   invalid sibling order specification, a custom tree field referencing a
//!   missing column, a reserved output name. Never produces partial SQL.
//! - **Internal** — bugs. Should not happen.
//!
//! Execution-time failures (capacity overflow on string-encoding dialects,
//! predicates referencing unknown columns) belong to the database engine and
//! are deliberately not modelled here — the compiler only emits text.

use std::fmt;

/// Primary error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum TreeQueryError {
    // ── Config errors — fail fast, before compilation ────────────────────
    /// The sibling order specification is not usable.
    #[error("invalid sibling order: {0}")]
    InvalidSiblingOrder(String),

    /// A custom tree field references a column that does not exist on the
    /// base relation (surfaced when fast-path validation runs).
    #[error("unknown column for tree field {name}: {column}")]
    UnknownTreeFieldColumn { name: String, column: String },

    /// A custom tree field output name collides with a built-in tree column.
    #[error("reserved tree field name: {0}")]
    ReservedTreeFieldName(String),

    /// An identifier (table, column, field name) is empty or blank.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    // ── Internal errors — should not happen ──────────────────────────────
    /// An unexpected internal error. Indicates a bug.
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Classification of an error for tests and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeQueryErrorKind {
    Config,
    Internal,
}

impl fmt::Display for TreeQueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeQueryErrorKind::Config => write!(f, "CONFIG"),
            TreeQueryErrorKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl TreeQueryError {
    /// Classify the error.
    pub fn kind(&self) -> TreeQueryErrorKind {
        match self {
            TreeQueryError::InvalidSiblingOrder(_)
            | TreeQueryError::UnknownTreeFieldColumn { .. }
            | TreeQueryError::ReservedTreeFieldName(_)
            | TreeQueryError::InvalidIdentifier(_) => TreeQueryErrorKind::Config,

            TreeQueryError::InternalError(_) => TreeQueryErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            TreeQueryError::InvalidSiblingOrder("x".into()).kind(),
            TreeQueryErrorKind::Config
        );
        assert_eq!(
            TreeQueryError::UnknownTreeFieldColumn {
                name: "tree_names".into(),
                column: "nam".into(),
            }
            .kind(),
            TreeQueryErrorKind::Config
        );
        assert_eq!(
            TreeQueryError::ReservedTreeFieldName("tree_path".into()).kind(),
            TreeQueryErrorKind::Config
        );
        assert_eq!(
            TreeQueryError::InternalError("x".into()).kind(),
            TreeQueryErrorKind::Internal
        );
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = TreeQueryError::UnknownTreeFieldColumn {
            name: "tree_names".into(),
            column: "nam".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("tree_names"));
        assert!(msg.contains("nam"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(format!("{}", TreeQueryErrorKind::Config), "CONFIG");
        assert_eq!(format!("{}", TreeQueryErrorKind::Internal), "INTERNAL");
    }
}
