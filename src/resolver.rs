//! Ancestor and descendant queries built on the derived `tree_path` column.
//!
//! Neither operation repeats the recursive computation per node. Ancestors
//! are resolved through a node's own path — a membership filter over the
//! identifiers it already contains; descendants through a containment
//! predicate on `tree_path` ("does this node's identifier appear in your
//! path"). Both return ordinary [`SelectQuery`] values that compose
//! further (extra filters, aggregation) before compilation.

use crate::compiler::encode::SEPARATOR;
use crate::dialect::Dialect;
use crate::query::{Predicate, SelectQuery};
use crate::value::SqlValue;

/// A reference to one node of the base relation: its identifier, whether it
/// is a root, and — when the node was itself obtained from an augmented
/// query — its already-decoded `tree_path`.
#[derive(Debug, Clone)]
pub struct NodeRef {
    pub pk: SqlValue,
    pub parent_is_null: bool,
    pub tree_path: Option<Vec<SqlValue>>,
}

impl NodeRef {
    pub fn new(pk: impl Into<SqlValue>, parent_is_null: bool) -> Self {
        NodeRef {
            pk: pk.into(),
            parent_is_null,
            tree_path: None,
        }
    }

    /// Attach the node's known `tree_path`, sparing the resolver an extra
    /// lookup query.
    pub fn with_tree_path(mut self, path: Vec<SqlValue>) -> Self {
        self.tree_path = Some(path);
        self
    }
}

/// How to obtain a node's ancestors.
#[derive(Debug, Clone)]
pub enum AncestorsPlan {
    /// A root without `include_self` has no ancestors; zero queries.
    Empty,
    /// The node's path is unknown: run `lookup` (an augmented single-row
    /// query), decode its `tree_path`, then call [`ancestors_from_path`].
    NeedsPath { lookup: SelectQuery },
    /// The membership query, ready to compile.
    Ready(SelectQuery),
}

/// Plan the ancestors-of query for `node`, ordered root-first.
pub fn ancestors(base: &SelectQuery, node: &NodeRef, include_self: bool) -> AncestorsPlan {
    if !include_self && node.parent_is_null {
        return AncestorsPlan::Empty;
    }
    match &node.tree_path {
        Some(path) => AncestorsPlan::Ready(ancestors_from_path(base, path, include_self)),
        None => {
            let pk_column = base.meta().pk_column.clone();
            let lookup = base
                .clone()
                .with_tree_fields()
                .filter(Predicate::eq(&pk_column, node.pk.clone()));
            AncestorsPlan::NeedsPath { lookup }
        }
    }
}

/// The ancestors membership query for a known root-to-node path: all rows
/// whose identifier appears in the path (minus the last element unless
/// `include_self`), ordered by depth ascending so the root comes first.
pub fn ancestors_from_path(
    base: &SelectQuery,
    tree_path: &[SqlValue],
    include_self: bool,
) -> SelectQuery {
    let ids: Vec<SqlValue> = if include_self {
        tree_path.to_vec()
    } else {
        tree_path
            .iter()
            .take(tree_path.len().saturating_sub(1))
            .cloned()
            .collect()
    };
    let pk_column = base.meta().pk_column.clone();
    base.clone()
        .with_tree_fields()
        .filter(Predicate::in_list(&pk_column, ids))
        .extra_order_by("__tree.tree_depth")
}

/// The descendants-of query: one augmented query with a containment
/// predicate on `tree_path`, in depth-first order. Excludes the node
/// itself unless `include_self`.
pub fn descendants(
    base: &SelectQuery,
    dialect: Dialect,
    node_pk: &SqlValue,
    include_self: bool,
) -> SelectQuery {
    let sep = dialect.quote_literal(&SEPARATOR.to_string());
    let containment = match dialect {
        Dialect::Postgres => Predicate::raw("? = ANY(__tree.tree_path)", vec![node_pk.clone()]),
        // No arrays: substring search for the separator-wrapped identifier.
        Dialect::Mysql => Predicate::raw(
            format!("INSTR(__tree.tree_path, CONCAT({sep}, ?, {sep})) <> 0"),
            vec![node_pk.clone()],
        ),
        Dialect::Sqlite => Predicate::raw(
            format!("instr(__tree.tree_path, {sep} || ? || {sep}) <> 0"),
            vec![node_pk.clone()],
        ),
    };
    let mut query = base.clone().with_tree_fields().filter(containment);
    if !include_self {
        let pk_column = query.meta().pk_column.clone();
        query = query.filter(Predicate::ne(&pk_column, node_pk.clone()));
    }
    query
}

/// Annotate every row with a count of rows in a related relation whose
/// `related_fk_column` points at it, projected as `count_alias`.
///
/// With `cumulative`, related rows of the node's descendants (including the
/// node itself) are counted too: the correlated subquery re-scans `__tree`
/// with a path-containment predicate to collect the descendant identifiers.
/// The cumulative form implies tree fields; reverting the query with
/// `without_tree_fields` afterwards leaves a dangling `__tree` reference.
pub fn related_count(
    base: &SelectQuery,
    dialect: Dialect,
    related_table: &str,
    related_fk_column: &str,
    count_alias: &str,
    cumulative: bool,
) -> SelectQuery {
    let rel_t = dialect.quote_ident(related_table);
    let rel_fk = format!("{rel_t}.{}", dialect.quote_ident(related_fk_column));
    let base_pk = format!(
        "{}.{}",
        dialect.quote_ident(&base.meta().table),
        dialect.quote_ident(&base.meta().pk_column)
    );

    if !cumulative {
        let expr = format!("(SELECT COUNT(*) FROM {rel_t} WHERE {rel_fk} = {base_pk})");
        return base.clone().extra_select(count_alias, &expr);
    }

    // The outer identifier is a correlated column reference, not a bind.
    let sep = dialect.quote_literal(&SEPARATOR.to_string());
    let containment = match dialect {
        Dialect::Postgres => format!("{base_pk} = ANY(__rel.tree_path)"),
        Dialect::Mysql => {
            format!("INSTR(__rel.tree_path, CONCAT({sep}, {base_pk}, {sep})) <> 0")
        }
        Dialect::Sqlite => {
            format!("instr(__rel.tree_path, {sep} || {base_pk} || {sep}) <> 0")
        }
    };
    let expr = format!(
        "(SELECT COUNT(*) FROM {rel_t} WHERE {rel_fk} IN \
         (SELECT __rel.tree_pk FROM __tree __rel WHERE {containment}))"
    );
    base.clone().with_tree_fields().extra_select(count_alias, &expr)
}
