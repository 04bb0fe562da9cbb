//! Target database dialects and their capabilities.
//!
//! The compiler emits different CTE text per backend family. The main
//! capability split is native array support: PostgreSQL accumulates
//! `tree_path` / `tree_ordering` as real arrays, while MySQL/MariaDB and
//! SQLite emulate them as separator-delimited strings (see
//! [`crate::compiler::encode`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported backend family.
///
/// Being a closed enum, an "unsupported dialect" is unrepresentable — the
/// caller picks the variant matching their connection at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// PostgreSQL — native arrays, window functions.
    Postgres,
    /// MySQL / MariaDB — no arrays; string emulation, backtick quoting.
    Mysql,
    /// SQLite — no arrays; string emulation via `printf`.
    Sqlite,
}

impl Dialect {
    /// Whether this backend has a native ordered-array type.
    ///
    /// On array-capable backends the driver returns `tree_path` and
    /// `tree_ordering` as typed arrays and decoding is the identity.
    pub fn supports_arrays(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Quote an identifier for this dialect.
    ///
    /// PostgreSQL and SQLite use double quotes; MySQL uses backticks
    /// (double quotes are string literals there unless `ANSI_QUOTES` is on,
    /// which we cannot assume).
    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
        }
    }

    /// Quote a string literal for this dialect. Single quotes everywhere.
    pub fn quote_literal(self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgresql"),
            Dialect::Mysql => write!(f, "mysql"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}
