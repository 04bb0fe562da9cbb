//! tree-cte — recursive-CTE tree queries for SQL databases.
//!
//! Augments queries over a self-referencing hierarchical relation (rows
//! pointing to at most one parent row, forming a forest) with derived
//! per-row hierarchy columns — depth, root-to-node path, and a globally
//! comparable depth-first ordering key — computed entirely inside the
//! relational engine via a `WITH RECURSIVE` common-table-expression. No
//! client-side tree walking, no caching: every query recomputes the
//! closure fresh.
//!
//! The crate emits dialect-correct SQL text for PostgreSQL, MySQL/MariaDB
//! and SQLite, plus an ordered bind-parameter list; executing the query is
//! the caller's (driver's) job. On backends without native arrays, the
//! list-valued columns come back as separator-encoded strings — run them
//! through [`CompiledTreeQuery::decode`].
//!
//! # Usage
//! ```
//! use tree_cte::{Dialect, SelectQuery, TableMeta};
//!
//! let meta = TableMeta::new("category", "id", "parent_id")
//!     .column("position", true)
//!     .column("name", false);
//!
//! let compiled = SelectQuery::new(meta)
//!     .order_siblings_by("position")
//!     .compile(Dialect::Postgres)
//!     .unwrap();
//!
//! assert!(compiled.sql.starts_with("WITH RECURSIVE __tree("));
//! ```
//!
//! Not a general graph engine: the relation is assumed to be a forest.
//! Cycles are not detected here — on engines with a recursion cap the
//! query fails with an engine error; [`SelectQuery::tree_max_depth`] adds
//! an explicit guard for callers that want one.

pub mod compiler;
pub mod dialect;
pub mod error;
pub mod query;
pub mod resolver;
pub mod value;

pub use compiler::encode::{PAD_WIDTH, SEPARATOR, decode, decode_array_literal, decode_list};
pub use compiler::{CompiledTreeQuery, compile};
pub use dialect::Dialect;
pub use error::{TreeQueryError, TreeQueryErrorKind};
pub use query::{ColumnDef, Predicate, SelectQuery, SiblingOrder, TableMeta, TreeOptions};
pub use resolver::{
    AncestorsPlan, NodeRef, ancestors, ancestors_from_path, descendants, related_count,
};
pub use value::SqlValue;
