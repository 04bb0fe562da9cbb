//! The recursive closure: the `WITH RECURSIVE __tree(...)` computation of
//! depth, path, ordering key and custom accumulated fields for every
//! reachable node.
//!
//! Two equivalent strategies:
//! - **General path** — the closure reads [`__rank_table`](super::rank),
//!   which carries a window-function sibling rank and any pre-filtering.
//! - **Fast path** — the closure reads the base relation directly and
//!   orders by the raw value of a single ascending integer-like column,
//!   skipping the rank relation and its window-function materialization.
//!   Usable only when no pre-filters are configured and custom tree fields
//!   are plain base-relation columns; eligibility is decided by the
//!   rewriter. On string-encoding dialects the raw values are zero-padded
//!   into the ordering key, so the order column must hold non-negative
//!   values there (a `-` sign mis-sorts lexicographically).
//!
//! The base case selects parent-IS-NULL rows at depth 0 with one-element
//! accumulators; the recursive case joins candidates to `__tree` on
//! parent = `tree_pk`, incrementing the depth and appending one element to
//! each accumulator. MySQL keeps the comma-join form in the recursive term;
//! PostgreSQL and SQLite use an explicit JOIN.

use crate::compiler::encode::{append_expr, seed_expr};
use crate::compiler::rank::build_rank_table;
use crate::dialect::Dialect;
use crate::error::TreeQueryError;
use crate::query::{TableMeta, TreeOptions};
use crate::value::SqlValue;

/// The spliceable closure text: everything from `WITH RECURSIVE` up to (and
/// including) the space before the caller's own `SELECT`.
#[derive(Debug, Clone)]
pub(crate) struct ClosureCte {
    pub with_sql: String,
    pub params: Vec<SqlValue>,
    pub fast_path: bool,
}

/// Build the closure CTE text for the resolved dialect.
///
/// `fast_path` must only be set when the rewriter validated eligibility.
pub(crate) fn build_closure(
    meta: &TableMeta,
    opts: &TreeOptions,
    dialect: Dialect,
    fast_path: bool,
) -> Result<ClosureCte, TreeQueryError> {
    let pk_q = dialect.quote_ident(&meta.pk_column);
    let parent_q = dialect.quote_ident(&meta.parent_column);

    let mut tree_columns = vec![
        "tree_depth".to_string(),
        "tree_path".to_string(),
        "tree_ordering".to_string(),
        "tree_pk".to_string(),
    ];
    for name in opts.tree_fields.keys() {
        tree_columns.push(dialect.quote_ident(name));
    }

    let (source, rank_prefix, params, order_value) = if fast_path {
        // Single ascending integer-like order column, read off the base
        // relation; its raw value doubles as the sibling rank.
        let order_field = opts.sibling_order[0].clone();
        (
            dialect.quote_ident(&meta.table),
            String::new(),
            Vec::new(),
            format!("T.{}", dialect.quote_ident(&order_field)),
        )
    } else {
        let rank = build_rank_table(meta, opts, dialect)?;
        let columns = rank
            .cte_columns
            .iter()
            .map(|c| dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        (
            "__rank_table".to_string(),
            format!("__rank_table({columns}) AS (\n{}\n),\n", rank.body_sql),
            rank.params,
            "T.rank_order".to_string(),
        )
    };

    let mut base_items = vec![
        "0".to_string(),
        seed_expr(dialect, &format!("T.{pk_q}"), false),
        seed_expr(dialect, &order_value, true),
        format!("T.{pk_q}"),
    ];
    let mut rec_items = vec![
        "__tree.tree_depth + 1".to_string(),
        append_expr(dialect, "__tree.tree_path", &format!("T.{pk_q}"), false),
        append_expr(dialect, "__tree.tree_ordering", &order_value, true),
        format!("T.{pk_q}"),
    ];
    for (name, column) in &opts.tree_fields {
        // Fast path reads the base column; the general path reads the
        // aliased copy the rank table carries.
        let value = if fast_path {
            format!("T.{}", dialect.quote_ident(column))
        } else {
            format!("T.{}", dialect.quote_ident(&format!("tf_{name}")))
        };
        base_items.push(seed_expr(dialect, &value, false));
        rec_items.push(append_expr(
            dialect,
            &format!("__tree.{}", dialect.quote_ident(name)),
            &value,
            false,
        ));
    }

    let depth_guard = opts
        .max_depth
        .map(|n| format!(" AND __tree.tree_depth < {n}"))
        .unwrap_or_default();

    let recursive_from = match dialect {
        // MySQL historically preferred the comma-join form here.
        Dialect::Mysql => format!(
            "FROM __tree, {source} T\nWHERE __tree.tree_pk = T.{parent_q}{depth_guard}"
        ),
        Dialect::Postgres | Dialect::Sqlite => format!(
            "FROM {source} T\nJOIN __tree ON T.{parent_q} = __tree.tree_pk{depth_guard}"
        ),
    };

    let with_sql = format!(
        "WITH RECURSIVE {rank_prefix}__tree({tree_cols}) AS (\n\
         SELECT {base}\n\
         FROM {source} T\n\
         WHERE T.{parent_q} IS NULL\n\
         UNION ALL\n\
         SELECT {rec}\n\
         {recursive_from}\n\
         ) ",
        tree_cols = tree_columns.join(", "),
        base = base_items.join(", "),
        rec = rec_items.join(", "),
    );

    Ok(ClosureCte {
        with_sql,
        params,
        fast_path,
    })
}
